//! Server configuration for the remote collaborators and paging.
//!
//! ```bash
//! GATHER_USER_SERVICE_URL=http://users:8080      # required
//! GATHER_GROUP_SERVICE_URL=http://groups:8080    # required
//! GATHER_PAGE_SIZE=20                            # proposals per page
//! GATHER_REMOTE_TIMEOUT_SECS=10                  # per remote call
//! ```

use std::env;
use std::time::Duration;

use gather_remote::Url;
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL of the user service (authentication)
    pub user_service_url: Url,
    /// Base URL of the group service (leadership checks)
    pub group_service_url: Url,
    /// Proposals returned per page
    pub page_size: u32,
    /// Timeout enforced by the HTTP client on every remote call
    pub remote_timeout: Duration,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid URL in {var}: {value}")]
    InvalidUrl { var: String, value: String },

    #[error("Invalid page size: {0}. Expected a positive integer")]
    InvalidPageSize(String),

    #[error("Invalid remote timeout: {0}. Expected a positive number of seconds")]
    InvalidTimeout(String),
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let user_service_url = required_url("GATHER_USER_SERVICE_URL")?;
        let group_service_url = required_url("GATHER_GROUP_SERVICE_URL")?;

        let page_size = match env::var("GATHER_PAGE_SIZE") {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => return Err(ConfigError::InvalidPageSize(raw)),
            },
            Err(_) => DEFAULT_PAGE_SIZE,
        };

        let timeout_secs = match env::var("GATHER_REMOTE_TIMEOUT_SECS") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(n) if n >= 1 => n,
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
            Err(_) => DEFAULT_REMOTE_TIMEOUT_SECS,
        };

        Ok(Self {
            user_service_url,
            group_service_url,
            page_size,
            remote_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn required_url(var: &str) -> Result<Url, ConfigError> {
    let value = env::var(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))?;
    let url = Url::parse(&value).map_err(|_| ConfigError::InvalidUrl {
        var: var.to_string(),
        value: value.clone(),
    })?;
    // Path segments get appended to the base, so it has to be hierarchical.
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            var: var.to_string(),
            value,
        });
    }
    Ok(url)
}
