//! Authentication module for managing the client session.
//!
//! This module provides:
//! - `SessionManager`: startup resolution, login, and logout with a single
//!   source of truth for the session state
//! - `CredentialStore`: durable storage for the bearer credential (OS keychain,
//!   encrypted file, or memory)
//! - `gate`: the navigation decision derived from the session state

pub mod credentials;
pub mod error;
pub mod gate;
pub mod session;

pub use credentials::{
    Credential, CredentialStore, EncryptedFileStore, KeyringStore, MemoryStore,
};
pub use error::SessionError;
pub use gate::{gate, resolve, Access, GateDecision, Route};
pub use session::{Phase, SessionManager, SessionState, SessionView};
