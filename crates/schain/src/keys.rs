//! Master key management.
//!
//! The master key lives in an external credential store under
//! `(service, account)` as URL-safe base64 without padding. It is created on
//! first use and never written anywhere else.
//!
//! The store is a capability passed in by the caller: [`KeyringStore`] talks
//! to the OS store (Keychain, Secret Service, Credential Manager) and
//! [`MemoryStore`] keeps entries in process memory.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tracing::debug;
use zeroize::Zeroize;

use crate::cipher::{MasterKey, KEY_SIZE};
use crate::error::{ChainError, Result};

/// A key-value store external to this process, keyed by (service, account).
pub trait CredentialStore {
    /// Look up a secret. `Ok(None)` means no entry exists.
    fn get(&self, service: &str, account: &str) -> Result<Option<String>>;

    /// Store or replace a secret.
    fn set(&self, service: &str, account: &str, secret: &str) -> Result<()>;
}

impl<T: CredentialStore + ?Sized> CredentialStore for &T {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>> {
        (**self).get(service, account)
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        (**self).set(service, account, secret)
    }
}

/// OS credential store backend using the `keyring` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringStore;

impl KeyringStore {
    fn entry(service: &str, account: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(service, account)
            .map_err(|e| ChainError::CredentialStore(format!("failed to open entry: {e}")))
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>> {
        match Self::entry(service, account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(ChainError::CredentialStore(e.to_string())),
        }
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        Self::entry(service, account)?
            .set_password(secret)
            .map_err(|e| ChainError::CredentialStore(e.to_string()))
    }
}

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>> {
        Ok(self
            .entries()
            .get(&(service.to_string(), account.to_string()))
            .cloned())
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        self.entries()
            .insert((service.to_string(), account.to_string()), secret.to_string());
        Ok(())
    }
}

/// Encode a key the way it is stored in the credential store.
pub fn encode_key(key: &MasterKey) -> String {
    URL_SAFE_NO_PAD.encode(key.as_bytes())
}

/// Decode a stored key, requiring exactly [`KEY_SIZE`] bytes.
pub fn decode_key(encoded: &str) -> Result<MasterKey> {
    let mut bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim())
        .map_err(|e| ChainError::InvalidKey(format!("not valid base64: {e}")))?;

    let key = <[u8; KEY_SIZE]>::try_from(bytes.as_slice())
        .map(MasterKey::from_bytes)
        .map_err(|_| {
            ChainError::InvalidKey(format!(
                "expected {KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        });
    bytes.zeroize();
    key
}

/// Obtains or creates the master key for an account.
pub struct KeyManager<S> {
    store: S,
    service: String,
    lock_path: Option<PathBuf>,
}

impl<S: CredentialStore> KeyManager<S> {
    pub fn new(store: S, service: impl Into<String>) -> Self {
        Self {
            store,
            service: service.into(),
            lock_path: None,
        }
    }

    /// Serialize key creation through an advisory lock on `path`.
    pub fn with_lock(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = Some(path.into());
        self
    }

    /// Return the stored key for `account`, creating and storing one if absent.
    ///
    /// Any credential store failure other than "not found" is returned as is.
    pub fn get_or_create_key(&self, account: &str) -> Result<MasterKey> {
        if let Some(key) = self.lookup(account)? {
            return Ok(key);
        }

        let _lock = match &self.lock_path {
            Some(path) => Some(KeyLock::acquire(path)?),
            None => None,
        };

        // Another invocation may have created the key while we waited.
        if let Some(key) = self.lookup(account)? {
            debug!(account, "master key appeared while waiting for lock");
            return Ok(key);
        }

        debug!(service = %self.service, account, "generating new master key");
        let key = MasterKey::generate();
        let mut encoded = encode_key(&key);
        let stored = self.store.set(&self.service, account, &encoded);
        encoded.zeroize();
        stored?;

        Ok(key)
    }

    /// The base64 form of the account's key, as held in the store.
    pub fn export_key(&self, account: &str) -> Result<String> {
        let key = self.get_or_create_key(account)?;
        Ok(encode_key(&key))
    }

    fn lookup(&self, account: &str) -> Result<Option<MasterKey>> {
        match self.store.get(&self.service, account)? {
            Some(mut encoded) => {
                debug!(service = %self.service, account, "found master key");
                let key = decode_key(&encoded);
                encoded.zeroize();
                key.map(Some)
            }
            None => Ok(None),
        }
    }
}

/// Exclusive advisory lock, released when dropped.
struct KeyLock {
    _file: File,
}

impl KeyLock {
    fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::store::create_private_dir(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        lock_exclusive(&file)?;
        debug!(path = %path.display(), "acquired key lock");

        Ok(Self { _file: file })
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// TODO: use LockFileEx on Windows; creation is unserialized there for now.
#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}
