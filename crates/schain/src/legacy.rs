//! Unencrypted chain files
//!
//! Before chains were encrypted they were plain `NAME=VALUE` files. These
//! are still accepted by `schain run`, which merges and launches them the
//! same way `exec` does.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{ChainError, Result};

/// Read a plaintext chain file.
pub fn load_plaintext(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ChainError::ChainNotFound(path.display().to_string()),
        io::ErrorKind::InvalidData => ChainError::Corrupted {
            name: path.display().to_string(),
            reason: "contents are not UTF-8".to_string(),
        },
        _ => ChainError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use tempfile::tempdir;

    #[test]
    fn test_load_and_merge() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dev.env");
        fs::write(&path, "API_URL=http://localhost\nnot an entry\nDEBUG=1\n").unwrap();

        let text = load_plaintext(&path).unwrap();
        let mut env = Environment::new();
        assert_eq!(env.merge(&text), 2);
        assert_eq!(env.get("DEBUG"), Some(std::ffi::OsStr::new("1")));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_plaintext(&dir.path().join("nope")),
            Err(ChainError::ChainNotFound(_))
        ));
    }

    #[test]
    fn test_binary_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bin");
        fs::write(&path, [0xffu8, 0x00, 0xfe]).unwrap();
        assert!(matches!(load_plaintext(&path), Err(ChainError::Corrupted { .. })));
    }
}
