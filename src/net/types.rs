//! Wire schema shared by the REST client and the client-side state.
//!
//! SYSTEM CONTEXT
//! ==============
//! Field names mirror the backend's JSON bodies exactly. Types that the
//! client only forwards (session ids, timestamps) stay opaque.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// IDENTITY
// =============================================================================

/// Account role. Only `Admin` unlocks the metrics and cache surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role string is neither `user` nor `admin`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownRole(other.to_owned())),
        }
    }
}

/// Persisted identity half of a credential (`{username, role}`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub role: Role,
}

/// Bearer token plus the identity it was issued for.
///
/// Token and identity only ever travel together.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub identity: Identity,
}

impl Credential {
    #[must_use]
    pub fn new(token: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        Self { token: token.into(), identity: Identity { username: username.into(), role } }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.identity.username
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.identity.role
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.identity.role.is_admin()
    }
}

// Keep bearer tokens out of debug output and logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("identity", &self.identity)
            .finish()
    }
}

// =============================================================================
// AUTH
// =============================================================================

/// Which credential endpoint a manual submission targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthMode {
    #[default]
    Login,
    Register,
}

impl AuthMode {
    #[must_use]
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Login => "/api/auth/login",
            Self::Register => "/api/auth/register",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Success body of `/api/auth/login` and `/api/auth/register`.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub username: String,
    pub role: Role,
}

impl From<AuthResponse> for Credential {
    fn from(resp: AuthResponse) -> Self {
        Self::new(resp.token, resp.username, resp.role)
    }
}

// =============================================================================
// CHAT
// =============================================================================

/// Server-issued conversation handle.
///
/// The backend currently issues integers, but the client never does
/// arithmetic on it: it keeps whichever JSON form it received and sends
/// that same form back.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionId {
    Numeric(i64),
    Opaque(String),
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Opaque(s) => f.write_str(s),
        }
    }
}

impl FromStr for SessionId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>().map_or_else(|_| Self::Opaque(s.to_owned()), Self::Numeric))
    }
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub prompt: &'a str,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a SessionId>,
}

/// Success body of `POST /api/v1/chat`.
///
/// Cache hits come back without a `session_id`.
#[derive(Clone, Debug, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

/// Speaker of a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        })
    }
}

// =============================================================================
// HISTORY
// =============================================================================

/// One row of `GET /api/v1/sessions`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub title: String,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Body of `GET /api/v1/sessions/{id}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDetail {
    pub id: SessionId,
    pub title: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

// =============================================================================
// ADMIN
// =============================================================================

/// Body of `GET /admin/metrics`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub total_sessions: u64,
    pub total_messages: u64,
    pub cache_size: u64,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Optional machine-readable failure body (`{"detail": ...}`).
///
/// `detail` is usually a string but validation failures carry a list.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Human-readable reason, if the body carried one.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
