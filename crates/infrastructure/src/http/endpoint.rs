//! Base URL handling.

use url::Url;

/// Base URL that relative request paths are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// Parses the base URL.
    ///
    /// # Errors
    ///
    /// Returns the parse error for a malformed or relative base.
    pub fn parse(base_url: &str) -> Result<Self, url::ParseError> {
        Url::parse(base_url).map(|base| Self { base })
    }

    /// The base URL.
    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    /// Resolves `target` against the base.
    ///
    /// Absolute URLs are used as-is. Relative paths are appended to the base
    /// path, so `/users` under `http://host/api` becomes `http://host/api/users`.
    #[must_use]
    pub fn resolve(&self, target: &str) -> Url {
        if let Ok(absolute) = Url::parse(target) {
            return absolute;
        }

        let mut joined = self.base.clone();
        let (path, query) = target.split_once('?').map_or((target, None), |(p, q)| (p, Some(q)));
        let base_path = self.base.path().trim_end_matches('/');
        let relative = path.trim_start_matches('/');
        joined.set_path(&format!("{base_path}/{relative}"));
        joined.set_query(query);
        joined.set_fragment(None);
        joined
    }
}
