//! Encrypted chain files
//!
//! Each chain is one file, `<storage>/<name>`, holding
//! `nonce || ciphertext`. A missing file is an empty chain. Writes go to a
//! temporary file in the same directory and are renamed into place, so a
//! reader sees either the old chain or the new one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::cipher::{self, MasterKey, Nonce, NONCE_SIZE};
use crate::error::{ChainError, Result};

/// Reads and writes encrypted chains under one storage directory.
pub struct ChainStore {
    dir: PathBuf,
    key: MasterKey,
}

impl ChainStore {
    pub fn new(dir: impl Into<PathBuf>, key: MasterKey) -> Self {
        Self {
            dir: dir.into(),
            key,
        }
    }

    /// Get the file path for a chain, validating its name
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }

    /// Decrypt a chain, treating a missing file as an empty chain.
    pub fn load(&self, name: &str) -> Result<Vec<u8>> {
        Ok(self.read(name)?.unwrap_or_default())
    }

    /// Decrypt a chain that must already exist.
    pub fn open(&self, name: &str) -> Result<Vec<u8>> {
        self.read(name)?
            .ok_or_else(|| ChainError::ChainNotFound(name.to_string()))
    }

    /// Encrypt `plaintext` under a fresh nonce and replace the chain file.
    pub fn save(&self, name: &str, plaintext: &[u8]) -> Result<()> {
        let path = self.path(name)?;
        let dir = path.parent().unwrap_or(self.dir.as_path());
        create_private_dir(dir)?;

        let nonce = Nonce::generate();
        let mut contents = Vec::with_capacity(NONCE_SIZE + plaintext.len() + 16);
        contents.extend_from_slice(nonce.as_bytes());
        contents.extend(cipher::seal(&self.key, nonce, plaintext));

        write_atomic(&path, &contents)?;
        debug!(chain = name, bytes = contents.len(), "saved chain");

        Ok(())
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(name)?;

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(chain = name, path = %path.display(), "no chain file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if data.len() < NONCE_SIZE {
            return Err(ChainError::Corrupted {
                name: name.to_string(),
                reason: format!("file is {} bytes, shorter than its nonce", data.len()),
            });
        }

        let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
        let nonce = <&[u8; NONCE_SIZE]>::try_from(nonce).map_err(|_| ChainError::Corrupted {
            name: name.to_string(),
            reason: "malformed nonce".to_string(),
        })?;

        let plaintext = cipher::open(&self.key, nonce, ciphertext)
            .map_err(|_| ChainError::Authentication(name.to_string()))?;
        debug!(chain = name, bytes = plaintext.len(), "loaded chain");

        Ok(Some(plaintext))
    }
}

/// Validate a chain name.
///
/// Names are `/`-separated components of ASCII alphanumerics, `_`, `-` and
/// `.`; no component may be empty or start with `.`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ChainError::InvalidName("name cannot be empty".to_string()));
    }

    for component in name.split('/') {
        if component.is_empty() || component.starts_with('.') {
            return Err(ChainError::InvalidName(format!("invalid path in name: {name}")));
        }

        if let Some(c) = component
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(*c, '_' | '-' | '.'))
        {
            return Err(ChainError::InvalidName(format!(
                "invalid character '{c}' in {name}"
            )));
        }
    }

    Ok(())
}

/// Create a directory tree, new directories readable only by the owner.
pub(crate) fn create_private_dir(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
    }

    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)
    }
}

/// Replace `path` with `data` without exposing a partial file.
fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    // NamedTempFile is created with mode 0600 on Unix.
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    // The rename is only durable once the directory entry is flushed.
    #[cfg(unix)]
    {
        fs::File::open(dir)?.sync_all()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> ChainStore {
        ChainStore::new(dir, MasterKey::from_bytes([9u8; 32]))
    }

    #[test]
    fn test_missing_chain_loads_empty() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        assert!(store.load("new").unwrap().is_empty());
        assert!(!dir.path().join("new").exists());
    }

    #[test]
    fn test_open_missing_chain_fails() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        assert!(matches!(
            store.open("never-written"),
            Err(ChainError::ChainNotFound(name)) if name == "never-written"
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        store.save("aws", b"AWS_ACCESS_KEY_ID=abc\n").unwrap();
        assert_eq!(store.load("aws").unwrap(), b"AWS_ACCESS_KEY_ID=abc\n");
        assert_eq!(store.open("aws").unwrap(), b"AWS_ACCESS_KEY_ID=abc\n");
    }

    #[test]
    fn test_file_layout() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        store.save("x", b"A=1\n").unwrap();
        let first = fs::read(dir.path().join("x")).unwrap();
        assert_eq!(first.len(), NONCE_SIZE + 4 + 16);
        assert!(!first.windows(4).any(|w| w == b"A=1\n"));

        store.save("x", b"A=1\n").unwrap();
        let second = fs::read(dir.path().join("x")).unwrap();
        assert_ne!(first[..NONCE_SIZE], second[..NONCE_SIZE]);
    }

    #[test]
    fn test_nested_names_create_directories() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        store.save("prod/db", b"PGPASSWORD=x\n").unwrap();
        assert!(dir.path().join("prod").join("db").is_file());
        assert_eq!(store.load("prod/db").unwrap(), b"PGPASSWORD=x\n");
    }

    #[test]
    fn test_missing_storage_dir_is_created() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir.path().join("a").join("b"));

        store.save("x", b"").unwrap();
        assert!(dir.path().join("a/b/x").is_file());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        store.save("x", b"A=1\n").unwrap();
        store.save("x", b"A=1\nB=2\n").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("x")]);
    }

    #[test]
    fn test_overwrite_replaces_contents_in_place() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        store.save("prod/db", b"A=1\n").unwrap();
        store.save("prod/db", b"A=1\nB=2\n").unwrap();

        assert_eq!(store.open("prod/db").unwrap(), b"A=1\nB=2\n");
        let names: Vec<_> = fs::read_dir(dir.path().join("prod"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("db")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_chain_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        store_in(dir.path()).save("x", b"A=1\n").unwrap();

        let mode = fs::metadata(dir.path().join("x")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_wrong_key_is_authentication_error() {
        let dir = tempdir().unwrap();
        store_in(dir.path()).save("x", b"A=1\n").unwrap();

        let other = ChainStore::new(dir.path(), MasterKey::from_bytes([1u8; 32]));
        assert!(matches!(other.load("x"), Err(ChainError::Authentication(_))));
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        fs::write(dir.path().join("short"), [0u8; 5]).unwrap();
        assert!(matches!(store.load("short"), Err(ChainError::Corrupted { .. })));

        store.save("x", b"A=1\n").unwrap();
        let data = fs::read(dir.path().join("x")).unwrap();
        fs::write(dir.path().join("x"), &data[..data.len() - 3]).unwrap();
        assert!(matches!(store.load("x"), Err(ChainError::Authentication(_))));
    }

    #[test]
    fn test_invalid_names() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        for name in ["", "../escape", "/absolute", "trailing/", "a//b", ".key.lock", "sp ace"] {
            assert!(
                matches!(store.save(name, b""), Err(ChainError::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }

        assert!(validate_name("api.prod").is_ok());
        assert!(validate_name("team/aws-prod_2").is_ok());
    }
}
