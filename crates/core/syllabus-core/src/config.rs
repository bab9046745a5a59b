//! Configuration management and environment variable loading

use crate::session::ConnectOptions;
use crate::{Result, SyllabusError};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Endpoint used when `SYLLABUS_DATABASE_URL` is not set
pub const DEFAULT_DATABASE_URL: &str = "mongodb://localhost/demo";

/// Load environment variables from a .env file
///
/// Looks in the current directory and its parents. A missing file is not an
/// error; a malformed one is.
///
/// # Example
///
/// ```no_run
/// use syllabus_core::load_env;
///
/// load_env().ok();
/// let url = std::env::var("SYLLABUS_DATABASE_URL").unwrap_or_default();
/// ```
pub fn load_env() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::info!("Loaded environment from: {}", path.display());
            Ok(())
        }
        Err(dotenvy::Error::LineParse(line, pos)) => Err(SyllabusError::config(format!(
            "Failed to parse .env file at line {}, position {}",
            line, pos
        ))),
        Err(dotenvy::Error::Io(_)) => {
            tracing::debug!("No .env file found - using system environment variables only");
            Ok(())
        }
        Err(e) => Err(SyllabusError::config(format!(
            "Failed to load .env file: {}",
            e
        ))),
    }
}

/// Load environment variables from a specific file
pub fn load_env_from_path<P: AsRef<Path>>(path: P) -> Result<()> {
    match dotenvy::from_path(path.as_ref()) {
        Ok(_) => {
            tracing::info!("Loaded environment from: {}", path.as_ref().display());
            Ok(())
        }
        Err(e) => Err(SyllabusError::config(format!(
            "Failed to load {} environment file: {}",
            path.as_ref().display(),
            e
        ))),
    }
}

/// Get optional environment variable with default
pub fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get environment variable as boolean
pub fn get_env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| match v.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

/// Database settings read from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// Endpoint URI (`mongodb://host/db`, `memory://name/db`, ...)
    pub url: String,
    /// Accepted for driver compatibility, has no effect
    pub use_new_url_parser: bool,
    /// Accepted for driver compatibility, has no effect
    pub use_unified_topology: bool,
    /// Application name reported to the server
    pub app_name: Option<String>,
    /// How long the driver may wait for a suitable server
    pub server_selection_timeout: Option<Duration>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            use_new_url_parser: true,
            use_unified_topology: true,
            app_name: None,
            server_selection_timeout: None,
        }
    }
}

impl DatabaseConfig {
    /// Read `SYLLABUS_*` variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let url = get_env_or("SYLLABUS_DATABASE_URL", DEFAULT_DATABASE_URL);
        if url.trim().is_empty() {
            return Err(SyllabusError::config(
                "SYLLABUS_DATABASE_URL is set but empty",
            ));
        }

        let server_selection_timeout = match env::var("SYLLABUS_SERVER_SELECTION_TIMEOUT_MS") {
            Ok(raw) => {
                let ms = raw.trim().parse::<u64>().map_err(|_| {
                    SyllabusError::config(format!(
                        "SYLLABUS_SERVER_SELECTION_TIMEOUT_MS must be a number of milliseconds, got '{}'",
                        raw
                    ))
                })?;
                Some(Duration::from_millis(ms))
            }
            Err(_) => None,
        };

        Ok(Self {
            url,
            use_new_url_parser: get_env_bool("SYLLABUS_USE_NEW_URL_PARSER", true),
            use_unified_topology: get_env_bool("SYLLABUS_USE_UNIFIED_TOPOLOGY", true),
            app_name: env::var("SYLLABUS_APP_NAME").ok().filter(|s| !s.is_empty()),
            server_selection_timeout,
        })
    }

    /// Options to hand to the connection manager
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            use_new_url_parser: self.use_new_url_parser,
            use_unified_topology: self.use_unified_topology,
            app_name: self.app_name.clone(),
            server_selection_timeout: self.server_selection_timeout,
        }
    }
}
