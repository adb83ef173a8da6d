//! Runtime configuration
//!
//! schain has no config file. Two environment variables adjust where it
//! looks for things:
//! - `SCHAIN_DIR` - storage directory for chain files
//! - `SCHAIN_KEY` - credential store account holding the master key

use std::ffi::OsString;

use thiserror::Error;
use tracing::debug;

use crate::paths::{Paths, DIR_ENV};

/// Credential store service name for the master key
pub const SERVICE: &str = "schain";

/// Credential store account used when `SCHAIN_KEY` is unset
pub const DEFAULT_ACCOUNT: &str = "schain";

/// Environment variable overriding the credential store account
pub const ACCOUNT_ENV: &str = "SCHAIN_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to determine home directory - set {DIR_ENV}")]
    NoHomeDir,
}

/// Resolved configuration for one invocation
#[derive(Debug, Clone)]
pub struct Config {
    pub paths: Paths,
    /// Credential store service
    pub service: String,
    /// Credential store account
    pub account: String,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::var_os(DIR_ENV), std::env::var(ACCOUNT_ENV).ok())
    }

    /// Build configuration from explicit override values
    pub fn from_vars(
        dir_override: Option<OsString>,
        account_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let paths = Paths::resolve(dir_override)?;
        let account = account_override
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| DEFAULT_ACCOUNT.to_string());

        debug!(storage = %paths.storage.display(), %account, "resolved configuration");

        Ok(Self {
            paths,
            service: SERVICE.to_string(),
            account,
        })
    }
}
