//! Core library for the mailroom client.
//!
//! - `auth`: session lifecycle, credential storage, and navigation gating
//! - `notify`: self-expiring toast notifications
//! - `api`: the Mail Manager identity endpoints
//! - `config`: configuration file and environment overrides

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod notify;

pub use api::{ApiClient, ApiError, AuthBackend};
pub use auth::{
    gate, resolve, Credential, CredentialStore, GateDecision, Phase, Route, SessionError,
    SessionManager, SessionState,
};
pub use config::Config;
pub use models::Identity;
pub use notify::{Kind, Notification, NotificationId, NotificationQueue};
