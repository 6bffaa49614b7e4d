//! Session lifecycle: startup resolution, login, and logout.
//!
//! `SessionManager` is the single writer of both the in-memory session state
//! and the persisted credential. State changes are published on a `watch`
//! channel; consumers re-read the state whenever it changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::AuthBackend;
use crate::models::Identity;

use super::credentials::CredentialStore;
use super::error::SessionError;

/// The three-valued session lifecycle state, without the identity payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Phase {
    Initializing,
    Authenticated,
    Unauthenticated,
}

/// Current session state. The identity only exists while authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Authenticated(Identity),
    Unauthenticated,
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        match self {
            SessionState::Initializing => Phase::Initializing,
            SessionState::Authenticated(_) => Phase::Authenticated,
            SessionState::Unauthenticated => Phase::Unauthenticated,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    /// True until startup resolution has settled.
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Initializing)
    }

    pub fn is_admin(&self) -> bool {
        self.identity().map(|i| i.is_admin).unwrap_or(false)
    }

    /// Flattened form handed to presentation layers.
    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase(),
            identity: self.identity().cloned(),
            is_loading: self.is_loading(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub phase: Phase,
    pub identity: Option<Identity>,
    pub is_loading: bool,
}

pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn CredentialStore>,
    state: watch::Sender<SessionState>,
    /// Advanced by every logout. Async work started under an older epoch
    /// must not commit.
    epoch: Mutex<u64>,
    initialized: AtomicBool,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn AuthBackend>, store: Arc<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(SessionState::Initializing);
        Self {
            backend,
            store,
            state,
            epoch: Mutex::new(0),
            initialized: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Resolve the persisted credential into a session.
    ///
    /// Runs once per manager; later calls return the current phase without
    /// touching the store or the backend. On any resolution failure the stored
    /// credential is erased and the error is returned for logging; the session
    /// still settles as `Unauthenticated`.
    pub async fn initialize(&self) -> Result<Phase, SessionError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("Session already initialized");
            return Ok(self.current_phase());
        }

        let epoch = self.epoch();

        let credential = match self.store.load() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential, starting logged out");
                None
            }
        };

        let Some(credential) = credential else {
            debug!("No stored credential");
            self.commit_startup(epoch, SessionState::Unauthenticated, false);
            return Ok(self.current_phase());
        };

        match self.backend.current_identity(&credential).await {
            Ok(identity) => {
                let username = identity.username.clone();
                if self.commit_startup(epoch, SessionState::Authenticated(identity), false) {
                    info!(%username, "Session restored");
                }
                Ok(self.current_phase())
            }
            Err(e) => {
                let err = SessionError::from_identity(e);
                warn!(error = %err, "Stored credential could not be resolved, discarding it");
                self.commit_startup(epoch, SessionState::Unauthenticated, true);
                Err(err)
            }
        }
    }

    /// Authenticate, resolve the identity, then persist the credential.
    ///
    /// Nothing is persisted and the state is left untouched unless every step
    /// succeeds. A login that finishes after a `logout` is discarded.
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, SessionError> {
        let epoch = self.epoch();
        debug!(%username, "Logging in");

        let credential = self
            .backend
            .authenticate(username, password)
            .await
            .map_err(|e| {
                let err = SessionError::from_login(e);
                warn!(%username, error = %err, "Authentication failed");
                err
            })?;

        let identity = self
            .backend
            .current_identity(&credential)
            .await
            .map_err(|e| {
                let err = SessionError::from_identity(e);
                warn!(%username, error = %err, "Identity resolution after login failed");
                err
            })?;

        {
            let guard = self.lock_epoch();
            if *guard != epoch {
                info!(%username, "Discarding login that finished after logout");
                return Err(SessionError::Cancelled);
            }
            self.store.save(&credential).map_err(SessionError::storage)?;
            self.state
                .send_replace(SessionState::Authenticated(identity.clone()));
        }

        info!(%username, "Login successful");
        Ok(identity)
    }

    /// Erase the credential and drop the identity. Never fails.
    pub fn logout(&self) {
        let mut guard = self.lock_epoch();
        *guard += 1;

        if let Err(e) = self.store.erase() {
            warn!(error = %e, "Failed to erase stored credential");
        }

        match self.state.send_replace(SessionState::Unauthenticated) {
            SessionState::Authenticated(identity) => {
                info!(username = %identity.username, "Logged out");
            }
            _ => debug!("Logout without an active session"),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn current_phase(&self) -> Phase {
        self.state.borrow().phase()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn view(&self) -> SessionView {
        self.state.borrow().view()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    /// Receiver that is marked changed on every state mutation.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Wait for startup resolution to settle and return the resulting phase.
    pub async fn wait_until_settled(&self) -> Phase {
        let mut rx = self.state.subscribe();
        rx.wait_for(|state| !state.is_loading())
            .await
            .map(|state| state.phase())
            .unwrap_or_else(|_| self.current_phase())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn epoch(&self) -> u64 {
        *self.lock_epoch()
    }

    /// Apply the outcome of startup resolution unless a logout or a login
    /// already settled the session in the meantime.
    fn commit_startup(&self, epoch: u64, next: SessionState, erase: bool) -> bool {
        let guard = self.lock_epoch();
        let still_loading = self.state.borrow().is_loading();
        if *guard != epoch || !still_loading {
            debug!("Discarding stale startup resolution");
            return false;
        }

        if erase {
            if let Err(e) = self.store.erase() {
                warn!(error = %e, "Failed to erase rejected credential");
            }
        }
        self.state.send_replace(next);
        true
    }
}
