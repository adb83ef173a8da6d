//! schain - Encrypted environment chains
//!
//! "Secrets belong in the environment of the process that needs them,
//! and nowhere else."
//!
//! A chain is a named list of NAME=VALUE entries, stored on disk encrypted
//! with ChaCha20-Poly1305 under a master key that lives in the OS
//! credential store. `schain exec` decrypts a chain, layers it over the
//! current environment and replaces itself with the target command.

pub mod chains;
pub mod cipher;
pub mod env;
pub mod error;
pub mod keys;
pub mod launch;
pub mod legacy;
pub mod store;

pub use chains::Chains;
pub use cipher::MasterKey;
pub use env::Environment;
pub use error::{ChainError, Result};
pub use keys::{CredentialStore, KeyManager, KeyringStore, MemoryStore};
pub use store::ChainStore;
