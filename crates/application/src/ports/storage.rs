//! Key-value storage port
//!
//! The token store persists every field as an opaque string under a fixed
//! key. Whatever backs this port (memory, a file, a browser-like store) only
//! has to offer string get/set/remove.

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend cannot be reached or is disabled.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted data could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Port for synchronous string key-value storage.
pub trait KeyValueStorage: Send + Sync {
    /// Reads a value; `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes a key. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Writes several values. Backends that can commit them in one write
    /// should override this.
    ///
    /// # Errors
    ///
    /// Returns the first write error.
    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Removes several keys.
    ///
    /// # Errors
    ///
    /// Returns the first write error.
    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}
