//! Past-conversation browser state.
//!
//! ERROR HANDLING
//! ==============
//! Failed fetches land in `error` for an inline error panel. The previously
//! loaded list and selection stay in place.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use tracing::{info, warn};

use crate::net::api::PortalApi;
use crate::net::error::ApiError;
use crate::net::types::{SessionDetail, SessionId, SessionSummary};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("not signed in")]
    Unauthenticated,
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Clone, Debug, Default)]
pub struct HistoryState {
    pub sessions: Vec<SessionSummary>,
    pub selected: Option<SessionDetail>,
    pub loading: bool,
    pub error: Option<String>,
}

impl HistoryState {
    /// Reload the session list.
    ///
    /// # Errors
    ///
    /// Returns the backend failure after recording it in `error`.
    pub async fn refresh<A>(&mut self, api: &A, token: &str) -> Result<&[SessionSummary], ApiError>
    where
        A: PortalApi + ?Sized,
    {
        self.loading = true;
        self.error = None;
        let result = api.list_sessions(token).await;
        self.loading = false;
        match result {
            Ok(sessions) => {
                info!(count = sessions.len(), "history: sessions loaded");
                self.sessions = sessions;
                Ok(&self.sessions)
            }
            Err(e) => Err(self.record_failure(e)),
        }
    }

    /// Load one session's stored messages and select it.
    ///
    /// # Errors
    ///
    /// Returns the backend failure after recording it in `error`.
    pub async fn open<A>(&mut self, api: &A, token: &str, id: &SessionId) -> Result<&SessionDetail, ApiError>
    where
        A: PortalApi + ?Sized,
    {
        self.loading = true;
        self.error = None;
        let result = api.session_detail(token, id).await;
        self.loading = false;
        match result {
            Ok(detail) => {
                info!(session_id = %id, messages = detail.messages.len(), "history: session opened");
                Ok(self.selected.insert(detail))
            }
            Err(e) => Err(self.record_failure(e)),
        }
    }

    /// Return to the list view.
    pub fn close(&mut self) {
        self.selected = None;
    }

    fn record_failure(&mut self, err: ApiError) -> ApiError {
        warn!(error = %err, "history: fetch failed");
        self.error = Some(err.user_message());
        err
    }
}
