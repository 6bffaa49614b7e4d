//! Data models for Mail Manager entities.
//!
//! Only the models the session layer needs live here:
//!
//! - `Identity`: the logged-in user as reported by `/auth/me`

pub mod identity;

pub use identity::Identity;
