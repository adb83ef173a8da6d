//! Error types for chain operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while managing or using chains.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Credential store error: {0}")]
    CredentialStore(String),

    #[error("Stored master key is invalid: {0}")]
    InvalidKey(String),

    #[error("Input format must be NAME=VALUE (line {0})")]
    Format(usize),

    #[error("Unable to decrypt chain {0}: key changed or data corrupted")]
    Authentication(String),

    #[error("Chain {name} is corrupted: {reason}")]
    Corrupted { name: String, reason: String },

    #[error("Chain not found: {0}")]
    ChainNotFound(String),

    #[error("Invalid chain name: {0}")]
    InvalidName(String),

    #[error("Unable to find command: {0}")]
    CommandNotFound(String),

    #[error("Failed to execute {path}: {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;
