//! services/client/src/adapters/token_file.rs
//!
//! File-backed implementation of the `CredentialStore` port: one durable
//! file at a well-known location holding the bearer token string.

use jobmail_core::ports::CredentialStore;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Persists the credential as a single file on disk.
#[derive(Debug, Clone)]
pub struct TokenFileStore {
    path: PathBuf,
}

impl TokenFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CredentialStore for TokenFileStore {
    fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(token.to_string()))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)
    }

    fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
