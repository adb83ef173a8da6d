//! ChaCha20-Poly1305 sealing for chain contents.
//!
//! A chain file is `nonce || ciphertext` with no associated data. The AEAD
//! tag is the only integrity check, so a failed [`open`] covers truncation,
//! tampering and a changed master key alike.
//!
//! Nonces are single-use values: [`Nonce::generate`] is the only way to make
//! one, and [`seal`] consumes it.

use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;

/// Raised when a ciphertext fails authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticationError;

/// The 256-bit master key. Zeroed on drop, never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; KEY_SIZE]);

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Draw a fresh key from the OS random source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// A freshly drawn nonce. Not `Clone`: each one seals exactly one message.
#[derive(Debug)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

fn cipher(key: &MasterKey) -> ChaCha20Poly1305 {
    ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()))
}

/// Seal `plaintext` under `key`, consuming the nonce.
pub fn seal(key: &MasterKey, nonce: Nonce, plaintext: &[u8]) -> Vec<u8> {
    // Encryption only fails for messages beyond the ChaCha20 block counter
    // (~256 GiB), which a chain read into memory cannot reach.
    cipher(key)
        .encrypt(chacha20poly1305::Nonce::from_slice(&nonce.0), plaintext)
        .expect("chain within ChaCha20-Poly1305 message limit")
}

/// Open a ciphertext produced by [`seal`] with the same key and nonce.
pub fn open(
    key: &MasterKey,
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, AuthenticationError> {
    cipher(key)
        .decrypt(chacha20poly1305::Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| AuthenticationError)
}
