//! services/client/src/credential.rs
//!
//! The shared credential handle: the one piece of process-wide mutable state.
//!
//! The session manager owns the handle and is the only component that installs
//! tokens; the HTTP transport holds a clone and may clear it when it detects
//! an authorization failure. Both writers converge on "absent", so last writer
//! wins is acceptable.

use jobmail_core::ports::CredentialStore;
use std::sync::{Arc, RwLock};
use tracing::warn;

struct Inner {
    token: RwLock<Option<String>>,
    store: Arc<dyn CredentialStore>,
}

/// A cheaply clonable handle to the current bearer credential.
#[derive(Clone)]
pub struct CredentialHandle {
    inner: Arc<Inner>,
}

impl CredentialHandle {
    /// Creates a handle, seeding the in-memory token from durable storage.
    ///
    /// A storage read failure is logged and treated as "no credential"; the
    /// worst outcome is a fresh login.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let token = match store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!("Failed to read persisted credential: {}", e);
                None
            }
        };
        Self {
            inner: Arc::new(Inner {
                token: RwLock::new(token),
                store,
            }),
        }
    }

    /// Returns a copy of the current token, if one is present.
    pub fn get(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_present(&self) -> bool {
        self.get().is_some()
    }

    /// Installs a new token and persists it.
    pub fn install(&self, token: String) {
        if let Err(e) = self.inner.store.save(&token) {
            warn!("Failed to persist credential: {}", e);
        }
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token);
    }

    /// Clears the token in memory and in durable storage.
    ///
    /// Idempotent: returns `true` only for the call that actually removed a
    /// token, so the transport's invalidation path performs exactly one clear
    /// per detected invalidation.
    pub fn clear(&self) -> bool {
        let removed = self
            .inner
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .is_some();
        if removed {
            if let Err(e) = self.inner.store.clear() {
                warn!("Failed to remove persisted credential: {}", e);
            }
        }
        removed
    }
}

impl std::fmt::Debug for CredentialHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the token itself.
        f.debug_struct("CredentialHandle")
            .field("present", &self.is_present())
            .finish()
    }
}
