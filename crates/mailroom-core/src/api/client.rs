//! API client for the Mail Manager REST API.
//!
//! `ApiClient` implements `AuthBackend`, the two-endpoint identity contract
//! consumed by the session manager:
//!
//! - `POST /auth/token` exchanges a username and password for a bearer token
//! - `GET /auth/me` resolves the identity behind a bearer token

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::Credential;
use crate::models::Identity;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL of a locally running Mail Manager backend.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Both identity endpoints live on the backend's `/auth` router.
const TOKEN_PATH: &str = "auth/token";
const CURRENT_USER_PATH: &str = "auth/me";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
}

/// The backend's identity endpoints.
///
/// Implementations must not retry on their own; the session manager treats
/// every failure as fatal to the current attempt.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange a username and password for a bearer credential.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Credential, ApiError>;

    /// Resolve the user a credential belongs to.
    async fn current_identity(&self, credential: &Credential) -> Result<Identity, ApiError>;
}

/// API client for the Mail Manager backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client with the default request timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Credential, ApiError> {
        let url = self.endpoint(TOKEN_PATH);
        debug!(%url, "Sending authentication request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let token: TokenResponse = response.json().await?;

        if let Some(ref kind) = token.token_type {
            if !kind.eq_ignore_ascii_case("bearer") {
                warn!(token_type = %kind, "Unexpected token type, using it as a bearer token");
            }
        }

        if token.access_token.trim().is_empty() {
            return Err(ApiError::InvalidResponse("empty access token".to_string()));
        }

        Ok(Credential::new(token.access_token))
    }

    async fn current_identity(&self, credential: &Credential) -> Result<Identity, ApiError> {
        let url = self.endpoint(CURRENT_USER_PATH);

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(credential.expose())
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let identity: Identity = response.json().await?;

        debug!(user_id = identity.id, "Identity resolved");
        Ok(identity)
    }
}
