//! Failure taxonomy for backend calls.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures, timeouts, and non-2xx responses all land here and are
//! rendered to the user at the operation boundary. Nothing in this module is
//! fatal to the process and nothing retries automatically.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

/// Errors produced by backend operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No response was obtained (DNS, connect, reset, ...).
    #[error("network error: {0}")]
    Transport(String),

    /// The request exceeded its configured deadline.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error("http {status}")]
    Http { status: u16, detail: Option<String> },

    /// A 2xx body did not match the expected schema.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// Classify a `reqwest` failure, folding deadline expiry into `Timeout`.
    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Reason shown to the user: the server's `detail` when it sent one.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { detail: Some(detail), .. } => detail.clone(),
            Self::Http { status, detail: None } => format!("HTTP error! status: {status}"),
            Self::Transport(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
