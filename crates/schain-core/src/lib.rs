//! schain core - Paths and configuration shared by the schain tool
//!
//! Everything schain persists lives in one storage directory, and the
//! master key lives in the OS credential store under a fixed service name.

pub mod config;
pub mod paths;

pub use config::{Config, ConfigError};
pub use paths::Paths;
