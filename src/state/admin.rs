//! Admin surface: server metrics and cache flush.
//!
//! The role gate here is client-side only. Non-admin identities are refused
//! before any request leaves; the backend still re-checks every call.

#[cfg(test)]
#[path = "admin_test.rs"]
mod admin_test;

use tracing::{info, warn};

use crate::net::api::PortalApi;
use crate::net::error::ApiError;
use crate::net::types::{Credential, Metrics};

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("not signed in")]
    Unauthenticated,
    #[error("admin role required")]
    Forbidden,
    #[error("an admin request is already in progress")]
    InFlight,
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl AdminError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AdminState {
    pub metrics: Option<Metrics>,
    pub loading: bool,
    pub error: Option<String>,
}

fn require_admin(credential: &Credential) -> Result<&str, AdminError> {
    if credential.is_admin() {
        Ok(&credential.token)
    } else {
        warn!(username = credential.username(), "admin: refused for non-admin");
        Err(AdminError::Forbidden)
    }
}

impl AdminState {
    /// Fetch fresh metrics.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-admins (no request issued); otherwise the backend
    /// failure, also recorded in `error`.
    pub async fn refresh<A>(&mut self, api: &A, credential: &Credential) -> Result<&Metrics, AdminError>
    where
        A: PortalApi + ?Sized,
    {
        let token = require_admin(credential)?;
        self.loading = true;
        self.error = None;
        let result = api.metrics(token).await;
        self.loading = false;
        match result {
            Ok(metrics) => {
                info!(cache_size = metrics.cache_size, total_sessions = metrics.total_sessions, "admin: metrics loaded");
                Ok(self.metrics.insert(metrics))
            }
            Err(e) => {
                warn!(error = %e, "admin: metrics fetch failed");
                self.error = Some(e.user_message());
                Err(e.into())
            }
        }
    }

    /// Flush the server-side response cache, then refresh metrics.
    ///
    /// A failed follow-up refresh does not fail the flush; it only lands in
    /// `error`.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-admins (no request issued); otherwise the flush
    /// failure.
    pub async fn clear_cache<A>(&mut self, api: &A, credential: &Credential) -> Result<(), AdminError>
    where
        A: PortalApi + ?Sized,
    {
        let token = require_admin(credential)?;
        api.clear_cache(token).await.inspect_err(|e| warn!(error = %e, "admin: cache clear failed"))?;
        info!("admin: cache cleared");
        if let Err(e) = self.refresh(api, credential).await {
            warn!(error = %e, "admin: metrics refresh after cache clear failed");
        }
        Ok(())
    }
}
