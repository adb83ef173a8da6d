//! Standard paths used by schain

use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::ConfigError;

/// Environment variable overriding the storage directory
pub const DIR_ENV: &str = "SCHAIN_DIR";

/// Storage directory name under the home directory
pub const DIR_NAME: &str = ".schain";

const KEY_LOCK: &str = ".key.lock";

/// Standard schain paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Storage directory (~/.schain unless $SCHAIN_DIR is set)
    pub storage: PathBuf,
}

impl Paths {
    /// Resolve paths from an optional storage directory override.
    ///
    /// An empty override counts as unset.
    pub fn resolve(dir_override: Option<OsString>) -> Result<Self, ConfigError> {
        let storage = match dir_override.filter(|dir| !dir.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .ok_or(ConfigError::NoHomeDir)?
                .join(DIR_NAME),
        };

        Ok(Self { storage })
    }

    /// Advisory lock file guarding master key creation
    pub fn key_lock(&self) -> PathBuf {
        self.storage.join(KEY_LOCK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        let paths = Paths::resolve(Some(OsString::from("/tmp/chains"))).unwrap();
        assert_eq!(paths.storage, PathBuf::from("/tmp/chains"));
        assert_eq!(paths.key_lock(), PathBuf::from("/tmp/chains/.key.lock"));
    }

    #[test]
    fn test_empty_override_falls_back_to_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let paths = Paths::resolve(Some(OsString::new())).unwrap();
        assert_eq!(paths.storage, home.join(DIR_NAME));
    }
}
