//! Application state management for mailroom.
//!
//! This module contains the `App` struct that ties the terminal UI to the
//! core session manager and notification queue: login form state, the route
//! the user asked for, and background task coordination.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use mailroom_core::auth::{resolve, Phase, Route, SessionError, SessionManager, SessionState};
use mailroom_core::config::{Config, ENV_PASSWORD, ENV_USERNAME};
use mailroom_core::models::Identity;
use mailroom_core::notify::NotificationQueue;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
/// Only startup and login report back, so a handful of slots is plenty.
const CHANNEL_BUFFER_SIZE: usize = 8;

/// Maximum length for username input.
const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
}

impl LoginFocus {
    pub fn next(self) -> Self {
        match self {
            LoginFocus::Username => LoginFocus::Password,
            LoginFocus::Password => LoginFocus::Button,
            LoginFocus::Button => LoginFocus::Username,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            LoginFocus::Username => LoginFocus::Button,
            LoginFocus::Password => LoginFocus::Username,
            LoginFocus::Button => LoginFocus::Password,
        }
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent back from spawned session tasks.
#[derive(Debug)]
pub enum AppEvent {
    /// Startup resolution settled
    Initialized(Result<Phase, SessionError>),
    /// A login attempt finished
    LoginFinished {
        username: String,
        result: Result<Identity, SessionError>,
    },
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    pub session: Arc<SessionManager>,
    pub notifications: NotificationQueue,
    config_path: Option<PathBuf>,

    // UI State
    pub state: AppState,
    /// Route the user navigated to; gating decides what actually renders
    pub route: Route,

    // Login form state
    pub login_username: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,
    pub login_pending: bool,

    // Background task channel
    events_rx: mpsc::Receiver<AppEvent>,
    events_tx: mpsc::Sender<AppEvent>,
}

impl App {
    /// Create a new application instance.
    ///
    /// `config_path` is where the last username is remembered; `None` keeps
    /// the configuration in memory only.
    pub fn new(
        config: Config,
        session: Arc<SessionManager>,
        notifications: NotificationQueue,
        config_path: Option<PathBuf>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        // Get credentials from env vars or config
        let login_username = std::env::var(ENV_USERNAME)
            .ok()
            .or_else(|| config.last_username.clone())
            .unwrap_or_default();

        let login_password = std::env::var(ENV_PASSWORD).unwrap_or_default();

        let login_focus = if login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };

        Self {
            config,
            session,
            notifications,
            config_path,

            state: AppState::Normal,
            route: Route::DEFAULT,

            login_username,
            login_password,
            login_focus,
            login_error: None,
            login_pending: false,

            events_rx,
            events_tx,
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Resolve the stored credential in the background.
    pub fn start_initialize(&self) {
        let session = self.session.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = session.initialize().await;
            Self::send_event(&tx, AppEvent::Initialized(result)).await;
        });
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Submit the login form.
    pub fn submit_login(&mut self) {
        if self.login_pending {
            return;
        }

        let username = self.login_username.trim().to_string();
        let password = self.login_password.clone();

        if username.is_empty() || password.is_empty() {
            self.login_error = Some("Username and password required".to_string());
            return;
        }

        self.login_error = None;
        self.login_pending = true;

        let session = self.session.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = session.login(&username, &password).await;
            Self::send_event(&tx, AppEvent::LoginFinished { username, result }).await;
        });
    }

    pub fn logout(&mut self) {
        self.session.logout();
        self.login_password.clear();
        self.login_pending = false;
        self.notifications.info("Signed out");
        self.navigate(Route::LOGIN_ENTRY);
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn navigate(&mut self, route: Route) {
        let from = self.route;
        self.route = route;
        self.sync_route();

        if route == Route::Admin && self.route != Route::Admin && from != Route::Login {
            if let SessionState::Authenticated(_) = self.session_state() {
                self.notifications.warning("Administrator access required");
            }
        }
    }

    /// Follow gating redirects so `route` names what will render.
    /// Leaves the route alone while the session is still loading.
    pub fn sync_route(&mut self) {
        let Some(target) = resolve(self.route, &self.session_state()) else {
            return;
        };
        if target != self.route {
            debug!(from = self.route.path(), to = target.path(), "Redirecting");
            if target == Route::LOGIN_ENTRY {
                self.start_login();
            }
            self.route = target;
        }
    }

    /// Reset the login form focus for a fresh attempt
    fn start_login(&mut self) {
        self.login_focus = if self.login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    pub fn dismiss_oldest_notification(&self) -> bool {
        match self.notifications.oldest() {
            Some(id) => self.notifications.dismiss(id),
            None => false,
        }
    }

    // =========================================================================
    // Background tasks
    // =========================================================================

    async fn send_event(tx: &mpsc::Sender<AppEvent>, event: AppEvent) {
        if let Err(e) = tx.send(event).await {
            warn!(error = %e, "Failed to deliver background result");
        }
    }

    /// Drain and apply finished background work
    pub fn process_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.process_event(event);
        }
        self.sync_route();
    }

    fn process_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Initialized(Ok(phase)) => {
                debug!(?phase, "Session initialized");
            }
            AppEvent::Initialized(Err(e)) => {
                // A stale or missing session just means logging in again.
                debug!(error = %e, "Stored session not restored");
            }
            AppEvent::LoginFinished { username, result } => {
                // A cancelled attempt was already cleared by logout; a newer
                // attempt may own the pending flag by now.
                if !matches!(result, Err(SessionError::Cancelled)) {
                    self.login_pending = false;
                }
                match result {
                    Ok(identity) => {
                        self.login_password.clear();
                        self.remember_username(username);
                        self.notifications
                            .success(format!("Signed in as {}", identity.username));
                        self.navigate(Route::DEFAULT);
                    }
                    Err(SessionError::Cancelled) => {
                        debug!("Login result discarded after logout");
                    }
                    Err(e) => {
                        error!(error = %e, "Login failed");
                        self.login_error = Some(e.user_message());
                    }
                }
            }
        }
    }

    fn remember_username(&mut self, username: String) {
        if self.config.last_username.as_deref() == Some(username.as_str()) {
            return;
        }
        self.config.last_username = Some(username);

        if let Some(ref path) = self.config_path {
            if let Err(e) = self.config.save_to(path) {
                warn!(error = %e, "Failed to save config");
            } else {
                info!("Remembered username");
            }
        }
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a username character should be accepted
pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mailroom_core::api::{ApiError, AuthBackend};
    use mailroom_core::auth::{Credential, CredentialStore, MemoryStore};

    const PASSWORD: &str = "correct horse";

    struct StubBackend;

    #[async_trait]
    impl AuthBackend for StubBackend {
        async fn authenticate(&self, username: &str, password: &str) -> Result<Credential, ApiError> {
            if password == PASSWORD {
                Ok(Credential::new(format!("tok-{username}")))
            } else {
                Err(ApiError::Unauthorized)
            }
        }

        async fn current_identity(&self, credential: &Credential) -> Result<Identity, ApiError> {
            let username = credential
                .expose()
                .strip_prefix("tok-")
                .ok_or(ApiError::Unauthorized)?;
            Ok(Identity {
                id: 1,
                username: username.to_string(),
                is_admin: username == "root",
                is_active: true,
                created_at: None,
                storage_used_bytes: None,
            })
        }
    }

    fn app_with_store(store: Arc<MemoryStore>) -> App {
        let session = Arc::new(SessionManager::new(Arc::new(StubBackend), store));
        let config = Config {
            last_username: Some("dave".to_string()),
            ..Config::default()
        };
        let mut app = App::new(config, session, NotificationQueue::new(), None);
        app.login_password.clear();
        app
    }

    /// Let spawned session tasks run and apply their results.
    async fn settle(app: &mut App) {
        for _ in 0..50 {
            tokio::task::yield_now().await;
            app.process_events();
        }
    }

    // -------------------------------------------------------------------------
    // Session flow
    // -------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_startup_without_session_lands_on_login() {
        let mut app = app_with_store(Arc::new(MemoryStore::new()));
        app.sync_route();
        assert_eq!(app.route, Route::Inbox, "route must not move while loading");

        app.start_initialize();
        settle(&mut app).await;

        assert_eq!(app.route, Route::Login);
        assert_eq!(app.login_focus, LoginFocus::Password);
        assert!(app.notifications.is_empty(), "no toast for a missing session");
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_with_rejected_session_is_silent() {
        let store = Arc::new(MemoryStore::with_credential(Credential::new("garbage")));
        let mut app = app_with_store(store.clone());
        app.start_initialize();
        settle(&mut app).await;

        assert_eq!(app.route, Route::Login);
        assert!(app.notifications.is_empty());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_with_stored_session_goes_to_inbox() {
        let store = Arc::new(MemoryStore::with_credential(Credential::new("tok-dave")));
        let mut app = app_with_store(store);
        app.start_initialize();
        settle(&mut app).await;

        assert_eq!(app.route, Route::Inbox);
        assert_eq!(app.session.current_phase(), Phase::Authenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_requires_both_fields() {
        let mut app = app_with_store(Arc::new(MemoryStore::new()));
        app.login_username.clear();
        app.submit_login();
        assert_eq!(app.login_error.as_deref(), Some("Username and password required"));
        assert!(!app.login_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_login_shows_inline_error() {
        let mut app = app_with_store(Arc::new(MemoryStore::new()));
        app.start_initialize();
        settle(&mut app).await;

        app.login_password = "wrong".to_string();
        app.submit_login();
        assert!(app.login_pending);
        settle(&mut app).await;

        assert!(!app.login_pending);
        assert_eq!(app.login_error.as_deref(), Some("Invalid username or password"));
        assert_eq!(app.route, Route::Login);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_login_then_logout() {
        let store = Arc::new(MemoryStore::new());
        let mut app = app_with_store(store.clone());
        app.start_initialize();
        settle(&mut app).await;

        app.login_password = PASSWORD.to_string();
        app.submit_login();
        settle(&mut app).await;

        assert_eq!(app.route, Route::Inbox);
        assert!(app.login_password.is_empty());
        assert_eq!(app.config.last_username.as_deref(), Some("dave"));
        assert_eq!(app.notifications.list()[0].message(), "Signed in as dave");
        assert!(store.load().unwrap().is_some());

        app.logout();
        assert_eq!(app.route, Route::Login);
        assert_eq!(app.session.current_phase(), Phase::Unauthenticated);
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_login_keeps_newer_attempt_pending() {
        let mut app = app_with_store(Arc::new(MemoryStore::new()));
        app.start_initialize();
        settle(&mut app).await;

        // An attempt superseded by logout reports back while a newer one runs
        app.login_pending = true;
        app.process_event(AppEvent::LoginFinished {
            username: "dave".to_string(),
            result: Err(SessionError::Cancelled),
        });
        assert!(app.login_pending);
        assert_eq!(app.login_error, None);

        // The pending attempt still blocks a duplicate submit
        app.login_password = PASSWORD.to_string();
        app.submit_login();
        assert!(app.notifications.is_empty());
        settle(&mut app).await;
        assert_eq!(app.session.current_phase(), Phase::Unauthenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_admin_is_kept_out_of_admin() {
        let store = Arc::new(MemoryStore::with_credential(Credential::new("tok-dave")));
        let mut app = app_with_store(store);
        app.start_initialize();
        settle(&mut app).await;

        app.navigate(Route::Admin);
        assert_eq!(app.route, Route::Inbox);
        assert_eq!(app.notifications.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_reaches_admin() {
        let store = Arc::new(MemoryStore::with_credential(Credential::new("tok-root")));
        let mut app = app_with_store(store);
        app.start_initialize();
        settle(&mut app).await;

        app.navigate(Route::Admin);
        assert_eq!(app.route, Route::Admin);
        assert!(app.notifications.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_oldest_notification() {
        let app = app_with_store(Arc::new(MemoryStore::new()));
        assert!(!app.dismiss_oldest_notification());

        app.notifications.info("one");
        let second = app.notifications.info("two");
        assert!(app.dismiss_oldest_notification());
        assert_eq!(app.notifications.oldest(), Some(second));
    }

    // -------------------------------------------------------------------------
    // Login focus
    // -------------------------------------------------------------------------

    #[test]
    fn test_login_focus_cycles() {
        assert_eq!(LoginFocus::Username.next(), LoginFocus::Password);
        assert_eq!(LoginFocus::Button.next(), LoginFocus::Username);
        assert_eq!(LoginFocus::Username.prev(), LoginFocus::Button);
        assert_eq!(LoginFocus::Password.prev(), LoginFocus::Username);
    }

    // -------------------------------------------------------------------------
    // Input Validation Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_can_add_username_char() {
        // Valid chars within length
        assert!(can_add_username_char(0, 'a'));
        assert!(can_add_username_char(49, 'z'));
        // Exceeds max length
        assert!(!can_add_username_char(50, 'a'));
        // Control characters rejected
        assert!(!can_add_username_char(0, '\x00'));
        assert!(!can_add_username_char(0, '\n'));
        assert!(!can_add_username_char(0, '\t'));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(0, 'a'));
        assert!(can_add_password_char(127, '!'));
        assert!(!can_add_password_char(128, 'a'));
        assert!(!can_add_password_char(0, '\r'));
    }
}
