//! services/client/src/session.rs
//!
//! The session manager: owns the credential lifecycle, its verification
//! against the backend, and the linked-accounts cache. All authentication
//! intents (login, register, logout, OAuth completion) go through here.

use std::sync::{Arc, RwLock};

use jobmail_core::domain::{LinkedAccount, Registration, Session};
use jobmail_core::ports::{ApiError, ApiResult, AuthApi};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::credential::CredentialHandle;

/// Authentication lifecycle states.
///
/// `Verifying` is only entered when a persisted credential exists at startup
/// and is being checked against the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Verifying,
    Authenticated,
}

/// Owns the authenticated session and the credential handle.
///
/// The handle is shared with the HTTP transport, which may clear it
/// reactively on a 401; the manager re-checks the handle on every read so a
/// cleared credential always reads back as `Unauthenticated`, regardless of
/// which operation triggered the invalidation.
pub struct SessionManager {
    auth: Arc<dyn AuthApi>,
    credential: CredentialHandle,
    session: RwLock<Option<Session>>,
    state: RwLock<SessionState>,
    /// Shares one in-flight startup verification across concurrent callers.
    startup_check: OnceCell<Option<Session>>,
}

impl SessionManager {
    pub fn new(auth: Arc<dyn AuthApi>, credential: CredentialHandle) -> Self {
        Self {
            auth,
            credential,
            session: RwLock::new(None),
            state: RwLock::new(SessionState::Unauthenticated),
            startup_check: OnceCell::new(),
        }
    }

    /// A clone of the credential handle, for constructing the transport.
    pub fn credential(&self) -> CredentialHandle {
        self.credential.clone()
    }

    /// Drops any cached session whose backing credential is gone. The
    /// transport clears the credential on a 401 without going through this
    /// manager, so the cache is validated on every read.
    fn reconcile(&self) {
        if self.credential.is_present() {
            return;
        }
        let mut session = lock_write(&self.session);
        let mut state = lock_write(&self.state);
        if session.is_some() || *state == SessionState::Authenticated {
            *session = None;
            *state = SessionState::Unauthenticated;
        }
    }

    pub fn state(&self) -> SessionState {
        self.reconcile();
        *lock_read(&self.state)
    }

    /// The current session, if one exists and its credential is still present.
    pub fn session(&self) -> Option<Session> {
        self.reconcile();
        lock_read(&self.session).clone()
    }

    pub fn linked_accounts(&self) -> Vec<LinkedAccount> {
        self.session()
            .map(|s| s.linked_accounts)
            .unwrap_or_default()
    }

    /// Fetches the profile (fatal on failure) and linked accounts
    /// (best-effort) and caches the resulting session.
    async fn establish_session(&self) -> ApiResult<Session> {
        let user = self.auth.profile().await?;
        let linked_accounts = match self.auth.linked_accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!("Failed to fetch linked accounts: {}", e);
                Vec::new()
            }
        };
        let session = Session {
            user,
            linked_accounts,
        };
        *lock_write(&self.session) = Some(session.clone());
        *lock_write(&self.state) = SessionState::Authenticated;
        Ok(session)
    }

    /// Exchanges credentials for a token, persists it, and builds the
    /// session. A failure after the token exchange rolls the credential back
    /// so a failed login leaves the client exactly as it found it.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<Session> {
        let token = self.auth.login(email, password).await?;
        self.credential.install(token);
        match self.establish_session().await {
            Ok(session) => {
                info!("Logged in as {}", session.user.email);
                Ok(session)
            }
            Err(e) => {
                self.credential.clear();
                Err(e)
            }
        }
    }

    /// Creates an account. Does not authenticate; the caller logs in
    /// separately. The confirmation check is local and makes no network call.
    pub async fn register(&self, registration: &Registration) -> ApiResult<()> {
        if registration.password != registration.password_confirmation {
            return Err(ApiError::Validation(
                "passwords do not match".to_string(),
            ));
        }
        self.auth.register(registration).await
    }

    /// Completes the OAuth redirect callback.
    ///
    /// A provider error performs no state change; a token is persisted and
    /// then verified exactly like a successful login's post-steps.
    pub async fn complete_oauth_callback(
        &self,
        token: Option<String>,
        error: Option<String>,
    ) -> ApiResult<Session> {
        if let Some(error) = error {
            return Err(ApiError::OAuth(error));
        }
        let Some(token) = token else {
            return Err(ApiError::MissingToken);
        };
        self.credential.install(token);
        match self.establish_session().await {
            Ok(session) => Ok(session),
            Err(e) => {
                self.credential.clear();
                Err(e)
            }
        }
    }

    /// Logs out: best-effort remote notification, then an unconditional
    /// local clear. The client must never look authenticated after this,
    /// even if the network call failed.
    pub async fn logout(&self) {
        if let Err(e) = self.auth.logout().await {
            warn!("Remote logout failed: {}", e);
        }
        self.credential.clear();
        *lock_write(&self.session) = None;
        *lock_write(&self.state) = SessionState::Unauthenticated;
    }

    /// Startup verification of a persisted credential.
    ///
    /// Resolves immediately with no network call when no credential is
    /// stored. Otherwise verifies via a profile fetch; concurrent callers
    /// share the same pending verification rather than issuing duplicates.
    /// A verification failure clears the stale credential.
    pub async fn check_status(&self) -> Option<Session> {
        if let Some(session) = self.session() {
            return Some(session);
        }
        if !self.credential.is_present() {
            self.reconcile();
            return None;
        }
        self.startup_check
            .get_or_init(|| async {
                *lock_write(&self.state) = SessionState::Verifying;
                match self.establish_session().await {
                    Ok(session) => Some(session),
                    Err(e) => {
                        warn!("Stored credential failed verification: {}", e);
                        self.credential.clear();
                        *lock_write(&self.state) = SessionState::Unauthenticated;
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Removes a linked account server-side, then refreshes the local cache.
    /// The disconnect is authoritative: a cache refresh failure is logged
    /// and does not roll it back.
    pub async fn disconnect_account(&self, account_id: i64) -> ApiResult<()> {
        self.auth.disconnect_account(account_id).await?;
        if let Err(e) = self.refresh_linked_accounts().await {
            warn!("Failed to refresh linked accounts after disconnect: {}", e);
        }
        Ok(())
    }

    /// Re-fetches the linked-accounts cache from the backend.
    pub async fn refresh_linked_accounts(&self) -> ApiResult<()> {
        let accounts = self.auth.linked_accounts().await?;
        if let Some(session) = lock_write(&self.session).as_mut() {
            session.linked_accounts = accounts;
        }
        Ok(())
    }
}

fn lock_read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
