//! REST API client for the chat backend.
//!
//! DESIGN
//! ======
//! `PortalApi` is the seam every stateful component talks through. The
//! production implementation, `HttpPortalApi`, is a thin `reqwest` wrapper;
//! status handling and body parsing are pure helpers so they can be tested
//! without a server.
//!
//! ERROR HANDLING
//! ==============
//! Every call carries a request deadline. Expiry is reported as
//! `ApiError::Timeout` through the same path as an HTTP failure.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::ApiError;
use super::types::{
    AuthMode, AuthRequest, AuthResponse, ChatRequest, ChatResponse, ErrorBody, Metrics, SessionDetail, SessionId,
    SessionSummary,
};
use crate::config::Timeouts;

const FEDERATED_LOGIN_PATH: &str = "/api/auth/google";
const CHAT_PATH: &str = "/api/v1/chat";
const SESSIONS_PATH: &str = "/api/v1/sessions";
const METRICS_PATH: &str = "/admin/metrics";
const CACHE_CLEAR_PATH: &str = "/admin/cache/clear";
const HEALTH_PATH: &str = "/health";

// =============================================================================
// TRAIT
// =============================================================================

/// Backend operations consumed by the session controller.
///
/// Everything except `authenticate` requires a bearer token.
#[async_trait::async_trait]
pub trait PortalApi: Send + Sync {
    async fn authenticate(&self, mode: AuthMode, username: &str, password: &str) -> Result<AuthResponse, ApiError>;

    async fn chat(&self, token: &str, request: &ChatRequest<'_>) -> Result<ChatResponse, ApiError>;

    async fn list_sessions(&self, token: &str) -> Result<Vec<SessionSummary>, ApiError>;

    async fn session_detail(&self, token: &str, id: &SessionId) -> Result<SessionDetail, ApiError>;

    async fn metrics(&self, token: &str) -> Result<Metrics, ApiError>;

    async fn clear_cache(&self, token: &str) -> Result<(), ApiError>;

    /// Address the browser navigates to for the federated login handshake.
    fn federated_login_url(&self) -> String;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct HttpPortalApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPortalApi {
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute http(s) URL or the
    /// HTTP client fails to build.
    pub fn new(base_url: &str, timeouts: Timeouts) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(base_url)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check `GET /health`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or unhealthy.
    pub async fn health(&self) -> Result<(), ApiError> {
        let request = self.http.get(join_url(&self.base_url, HEALTH_PATH));
        self.send_text(request).await.map(drop)
    }

    async fn send_text(&self, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await.map_err(|e| ApiError::from_reqwest(&e))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| ApiError::from_reqwest(&e))?;
        debug!(status, body_len = text.len(), "api: response received");
        if !(200..300).contains(&status) {
            return Err(http_failure(status, &text));
        }
        Ok(text)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let text = self.send_text(request).await?;
        parse_body(&text)
    }
}

#[async_trait::async_trait]
impl PortalApi for HttpPortalApi {
    async fn authenticate(&self, mode: AuthMode, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let request = self
            .http
            .post(join_url(&self.base_url, mode.endpoint()))
            .json(&AuthRequest { username, password });
        self.send_json(request).await
    }

    async fn chat(&self, token: &str, request: &ChatRequest<'_>) -> Result<ChatResponse, ApiError> {
        let request = self
            .http
            .post(join_url(&self.base_url, CHAT_PATH))
            .bearer_auth(token)
            .json(request);
        self.send_json(request).await
    }

    async fn list_sessions(&self, token: &str) -> Result<Vec<SessionSummary>, ApiError> {
        let request = self.http.get(join_url(&self.base_url, SESSIONS_PATH)).bearer_auth(token);
        self.send_json(request).await
    }

    async fn session_detail(&self, token: &str, id: &SessionId) -> Result<SessionDetail, ApiError> {
        let request = self
            .http
            .get(join_url(&self.base_url, &session_detail_path(id)))
            .bearer_auth(token);
        self.send_json(request).await
    }

    async fn metrics(&self, token: &str) -> Result<Metrics, ApiError> {
        let request = self.http.get(join_url(&self.base_url, METRICS_PATH)).bearer_auth(token);
        self.send_json(request).await
    }

    async fn clear_cache(&self, token: &str) -> Result<(), ApiError> {
        let request = self.http.post(join_url(&self.base_url, CACHE_CLEAR_PATH)).bearer_auth(token);
        self.send_text(request).await.map(drop)
    }

    fn federated_login_url(&self) -> String {
        join_url(&self.base_url, FEDERATED_LOGIN_PATH)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Validate an absolute http(s) base URL and drop any trailing `/`.
pub(crate) fn normalize_base_url(raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = reqwest::Url::parse(trimmed).map_err(|e| ApiError::InvalidBaseUrl(format!("{trimmed}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::InvalidBaseUrl(format!("{trimmed}: unsupported scheme")));
    }
    Ok(trimmed.to_owned())
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{base_url}{path}")
}

fn session_detail_path(id: &SessionId) -> String {
    format!("{SESSIONS_PATH}/{id}")
}

/// Build the failure for a non-2xx response, keeping `{detail}` if present.
fn http_failure(status: u16, body: &str) -> ApiError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.reason());
    ApiError::Http { status, detail }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}
