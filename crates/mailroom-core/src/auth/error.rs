use thiserror::Error;

use crate::api::ApiError;

/// Why a login or startup resolution did not produce a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid username or password")]
    AuthInvalid,

    #[error("Stored session was rejected by the server")]
    AuthExpired,

    #[error("Could not resolve the current user: {0}")]
    AuthUnresolvable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected server response: {0}")]
    Backend(String),

    #[error("Credential storage failed: {0}")]
    Storage(String),

    #[error("Login was cancelled by logout")]
    Cancelled,
}

impl SessionError {
    /// Classify a failure of the authenticate step of a login.
    pub fn from_login(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized | ApiError::AccessDenied(_) => SessionError::AuthInvalid,
            ApiError::Timeout => SessionError::Timeout,
            ApiError::NetworkError(msg) => SessionError::Network(msg),
            other => SessionError::Backend(other.to_string()),
        }
    }

    /// Classify a failure of identity resolution.
    pub fn from_identity(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized | ApiError::AccessDenied(_) => SessionError::AuthExpired,
            ApiError::Timeout => SessionError::Timeout,
            ApiError::NetworkError(msg) => SessionError::Network(msg),
            other => SessionError::AuthUnresolvable(other.to_string()),
        }
    }

    pub(crate) fn storage(err: anyhow::Error) -> Self {
        SessionError::Storage(format!("{:#}", err))
    }

    /// Text suitable for an inline form error or a toast.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::AuthInvalid => "Invalid username or password".to_string(),
            SessionError::AuthExpired => "Your session has expired. Please log in again.".to_string(),
            SessionError::Network(_) => {
                "Unable to connect to server. Check your connection.".to_string()
            }
            SessionError::Timeout => "Connection timed out. Please try again.".to_string(),
            SessionError::Cancelled => "Login cancelled".to_string(),
            other => format!("Login failed: {}", other),
        }
    }
}
