//! Chain contents as environment entries
//!
//! A decrypted chain is plain text, one `NAME=VALUE` per line. Writing
//! appends validated lines to that text; reading turns it back into
//! variables layered on top of the current environment.

use std::ffi::{OsStr, OsString};
use std::io::BufRead;

use crate::error::{ChainError, Result};

/// Read `NAME=VALUE` lines until a blank line or end of input.
///
/// Lines are trimmed. Any non-blank line without `=` fails the whole read,
/// so nothing is written for malformed input.
pub fn read_entries<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut entries = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() {
            break;
        }

        if !line.contains('=') {
            return Err(ChainError::Format(index + 1));
        }

        entries.push(line.to_string());
    }

    Ok(entries)
}

/// Append entries to existing chain text, one per line. No dedup.
pub fn append_entries<S: AsRef<str>>(existing: &[u8], entries: &[S]) -> Vec<u8> {
    let mut updated = existing.to_vec();

    if !updated.is_empty() && !updated.ends_with(b"\n") {
        updated.push(b'\n');
    }

    for entry in entries {
        updated.extend_from_slice(entry.as_ref().as_bytes());
        updated.push(b'\n');
    }

    updated
}

/// Entries of chain text in file order, trimmed, skipping lines without `=`.
pub fn parse_entries(plaintext: &str) -> Vec<&str> {
    plaintext
        .lines()
        .map(str::trim)
        .filter(|line| line.contains('='))
        .collect()
}

/// Interpret decrypted chain bytes as text.
pub fn decode_plaintext(name: &str, plaintext: Vec<u8>) -> Result<String> {
    String::from_utf8(plaintext).map_err(|e| ChainError::Corrupted {
        name: name.to_string(),
        reason: format!("contents are not UTF-8: {e}"),
    })
}

/// An ordered list of environment variables. Names may repeat; the last
/// occurrence wins when the list is handed to a process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: Vec<(OsString, OsString)>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this process's environment
    pub fn from_current() -> Self {
        Self {
            vars: std::env::vars_os().collect(),
        }
    }

    pub fn push(&mut self, name: impl Into<OsString>, value: impl Into<OsString>) {
        self.vars.push((name.into(), value.into()));
    }

    /// Append chain entries after the existing variables. Returns how many
    /// entries were added.
    pub fn merge(&mut self, plaintext: &str) -> usize {
        let before = self.vars.len();

        for entry in parse_entries(plaintext) {
            if let Some((name, value)) = entry.split_once('=') {
                self.push(name, value);
            }
        }

        self.vars.len() - before
    }

    pub fn vars(&self) -> &[(OsString, OsString)] {
        &self.vars
    }

    /// The effective value of `name`
    pub fn get(&self, name: impl AsRef<OsStr>) -> Option<&OsStr> {
        let name = name.as_ref();
        self.vars
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_os_str())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
