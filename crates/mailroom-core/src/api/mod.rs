//! REST API client module for the Mail Manager backend.
//!
//! This module provides the `ApiClient` for the two identity endpoints the
//! session layer depends on, behind the `AuthBackend` trait so the session
//! manager can be driven by any backend implementation.
//!
//! The API uses OAuth2 password-flow bearer tokens obtained from `/auth/token`.

pub mod client;
pub mod error;

pub use client::{ApiClient, AuthBackend};
pub use error::ApiError;
