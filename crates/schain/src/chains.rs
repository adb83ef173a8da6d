//! The write, export and exec operations, composed from the key manager,
//! the chain store and the environment loader.

use std::io::BufRead;
use std::path::PathBuf;

use schain_core::Config;
use tracing::debug;

use crate::env::{self, Environment};
use crate::error::Result;
use crate::keys::{CredentialStore, KeyManager};
use crate::store::{self, ChainStore};

/// Chains for one storage directory and credential store account.
pub struct Chains<S> {
    keys: KeyManager<S>,
    account: String,
    storage: PathBuf,
}

impl<S: CredentialStore> Chains<S> {
    pub fn new(config: &Config, store: S) -> Self {
        Self {
            keys: KeyManager::new(store, config.service.clone())
                .with_lock(config.paths.key_lock()),
            account: config.account.clone(),
            storage: config.paths.storage.clone(),
        }
    }

    fn store(&self) -> Result<ChainStore> {
        let key = self.keys.get_or_create_key(&self.account)?;
        Ok(ChainStore::new(&self.storage, key))
    }

    /// Append `NAME=VALUE` lines from `input` to a chain, creating it if
    /// needed. Returns the number of entries added.
    ///
    /// The chain file is untouched if the input is malformed.
    pub fn write<R: BufRead>(&self, name: &str, input: R) -> Result<usize> {
        store::validate_name(name)?;

        let chains = self.store()?;
        let existing = chains.load(name)?;
        let entries = env::read_entries(input)?;

        let updated = env::append_entries(&existing, &entries);
        chains.save(name, &updated)?;
        debug!(chain = name, added = entries.len(), "wrote chain");

        Ok(entries.len())
    }

    /// The master key as stored in the credential store.
    pub fn export_key(&self) -> Result<String> {
        self.keys.export_key(&self.account)
    }

    /// The current process environment with a chain's entries appended.
    ///
    /// Fails if the chain has never been written.
    pub fn environment(&self, name: &str) -> Result<Environment> {
        let plaintext = self.store()?.open(name)?;
        let text = env::decode_plaintext(name, plaintext)?;

        let mut environment = Environment::from_current();
        let added = environment.merge(&text);
        debug!(chain = name, added, "merged chain into environment");

        Ok(environment)
    }
}
