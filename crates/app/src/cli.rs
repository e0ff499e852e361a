//! Command-line arguments and command dispatch.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use thiserror::Error;
use tollgate_application::ClientConfig;
use tollgate_application::ports::TransportError;
use tollgate_domain::{
    ClassifiedError, ErrorCode, HttpMethod, RequestDescriptor, TokenState, token_preview,
};
use tollgate_infrastructure::{
    ConfigError, FileStorage, TracingNotifier, build_client, default_config_path, load_config,
};
use tracing::{debug, info};

/// Authenticated HTTP client.
#[derive(Debug, Parser)]
#[command(name = "tollgate", version, about)]
pub struct Cli {
    /// JSON config file (defaults to the platform config directory)
    #[arg(long, env = "TOLLGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// API base URL, e.g. http://localhost:3000/api
    #[arg(long, env = "TOLLGATE_BASE_URL")]
    pub base_url: Option<String>,

    /// File the credentials are kept in
    #[arg(long, env = "TOLLGATE_STORAGE")]
    pub storage: Option<PathBuf>,

    /// Log out after this many idle minutes
    #[arg(long, env = "TOLLGATE_SESSION_TIMEOUT_MINUTES")]
    pub session_timeout_minutes: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Exchange email and password for a token pair
    Login {
        /// Account email
        #[arg(long, env = "TOLLGATE_EMAIL")]
        email: String,
        /// Account password
        #[arg(long, env = "TOLLGATE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored credentials
    Logout,
    /// Show the state of the stored credentials
    Status,
    /// Send a request through the authenticated pipeline
    Request {
        /// Path relative to the base URL, or an absolute URL
        path: String,
        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: HttpMethod,
        /// JSON request body
        #[arg(short = 'd', long)]
        data: Option<String>,
        /// Send without credentials
        #[arg(long)]
        skip_auth: bool,
    },
}

/// Errors that end the process with a failure status.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("client setup failed: {0}")]
    Setup(#[from] TransportError),

    /// A request or credential exchange failed.
    #[error(transparent)]
    Request(#[from] ClassifiedError),

    /// `--data` is not JSON.
    #[error("request body is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),

    /// No storage path was given and no platform data directory exists.
    #[error("no credential storage location; pass --storage")]
    NoStorage,
}

/// Builds the effective configuration: file, then command-line and
/// environment overrides.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be loaded.
pub fn resolve_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = match cli.config.clone().or_else(default_config_path) {
        Some(path) => load_config(&path)?,
        None => ClientConfig::default(),
    };

    if let Some(base_url) = &cli.base_url {
        config.base_url.clone_from(base_url);
    }
    if let Some(storage) = &cli.storage {
        config.storage_path = Some(storage.clone());
    }
    if cli.session_timeout_minutes.is_some() {
        config.session_timeout_minutes = cli.session_timeout_minutes;
    }
    Ok(config)
}

/// Runs the parsed command.
///
/// # Errors
///
/// Returns the first failure; the caller maps it to the exit status.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = resolve_config(&cli)?;
    let storage_path = config
        .storage_path
        .clone()
        .or_else(FileStorage::default_path)
        .ok_or(CliError::NoStorage)?;
    debug!(base_url = %config.base_url, storage = %storage_path.display(), "configuration resolved");

    let client = build_client(
        &config,
        Arc::new(FileStorage::new(storage_path)),
        Arc::new(TracingNotifier::new()),
    )?;

    match cli.command {
        Command::Login { email, password } => {
            let pair = client.login(&email, &password).await?;
            info!(token = %token_preview(&pair.access_token), "login succeeded");
        }
        Command::Logout => client.logout(),
        Command::Status => {
            let lifecycle = client.lifecycle();
            let state = lifecycle.state();
            let report = match lifecycle.current() {
                Some(pair) if state != TokenState::NoCredentials => json!({
                    "state": state,
                    "message": state.message(),
                    "accessToken": token_preview(&pair.access_token),
                    "expiresAtMs": pair.expires_at_ms,
                }),
                _ => json!({ "state": state, "message": state.message() }),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Request {
            path,
            method,
            data,
            skip_auth,
        } => {
            let request = build_request(method, path, data.as_deref(), skip_auth)?;
            let response = client.execute(request).await?;
            println!("{}", response.text());
        }
    }
    Ok(())
}

fn build_request(
    method: HttpMethod,
    path: String,
    data: Option<&str>,
    skip_auth: bool,
) -> Result<RequestDescriptor, CliError> {
    let mut request = RequestDescriptor::new(method, path);
    if let Some(data) = data {
        let body: serde_json::Value = serde_json::from_str(data)?;
        request = request
            .with_json(&body)
            .map_err(|e| ClassifiedError::new(ErrorCode::ValidationError, 0, e.to_string()))?;
    }
    if skip_auth {
        request = request.skip_auth();
    }
    Ok(request)
}
