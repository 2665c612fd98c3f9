//! Session controller: owns credentials, auth state, and per-view state.
//!
//! ARCHITECTURE
//! ============
//! Construction runs auth resolution, so no protected request can be issued
//! before it has completed. Credential storage and the backend are injected;
//! there is no process-wide singleton.
//!
//! Each view's state sits behind its own async mutex. `send` and the admin
//! calls use `try_lock`, so re-triggering one of them while it is in flight
//! is refused instead of queued. Other operations are independent and may
//! run concurrently. A fetch holds its view's lock from request to settle,
//! so a lock that cannot be taken is what the loading checks report.

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::config::DEFAULT_MAX_TOKENS;
use crate::net::api::PortalApi;
use crate::net::types::{AuthMode, Credential, Metrics, SessionDetail, SessionId, SessionSummary};
use crate::state::admin::{AdminError, AdminState};
use crate::state::auth::{self, AuthError, AuthOrigin, AuthState, Navigation};
use crate::state::chat::{ChatError, Conversation, ConversationPhase, Message};
use crate::state::history::{HistoryError, HistoryState};
use crate::storage::KeyValueStore;
use crate::storage::credentials::CredentialStore;

pub struct SessionController<A, S> {
    api: A,
    credentials: CredentialStore<S>,
    auth: AuthState,
    startup_origin: AuthOrigin,
    max_tokens: u32,
    conversation: Mutex<Conversation>,
    history: Mutex<HistoryState>,
    admin: Mutex<AdminState>,
}

impl<A, S> SessionController<A, S>
where
    A: PortalApi,
    S: KeyValueStore,
{
    /// Resolve auth against `navigation` and the store, then build the controller.
    pub fn start<N>(api: A, credentials: CredentialStore<S>, navigation: &mut N) -> Self
    where
        N: Navigation + ?Sized,
    {
        let source = auth::resolve_source(navigation, &credentials);
        let startup_origin = source.origin();
        Self {
            api,
            credentials,
            auth: source.into_state(),
            startup_origin,
            max_tokens: DEFAULT_MAX_TOKENS,
            conversation: Mutex::new(Conversation::new()),
            history: Mutex::new(HistoryState::default()),
            admin: Mutex::new(AdminState::default()),
        }
    }

    /// Token budget used when `send` is not given one.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    /// Where startup resolution found the credential. Later logins and
    /// logouts do not change it.
    pub fn startup_origin(&self) -> AuthOrigin {
        self.startup_origin
    }

    pub fn credentials(&self) -> &CredentialStore<S> {
        &self.credentials
    }

    pub fn federated_login_url(&self) -> String {
        self.api.federated_login_url()
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    /// Log in or register with a username and password.
    ///
    /// Signing in as someone new starts from a clean conversation.
    ///
    /// # Errors
    ///
    /// See [`auth::submit_credentials`]. Auth state is unchanged on failure.
    pub async fn submit_credentials(
        &mut self,
        mode: AuthMode,
        username: &str,
        password: &str,
    ) -> Result<Credential, AuthError> {
        let credential = auth::submit_credentials(&self.api, &self.credentials, mode, username, password).await?;
        self.reset_views();
        self.auth = AuthState::Authenticated(credential.clone());
        Ok(credential)
    }

    /// Forget the current identity locally. No network round trip.
    pub fn logout(&mut self) {
        if let Err(e) = self.credentials.clear() {
            warn!(error = %e, "logout: stored credential not cleared");
        }
        if let Some(credential) = self.auth.credential() {
            info!(username = credential.username(), "logout");
        }
        self.auth = AuthState::Unauthenticated;
        self.reset_views();
    }

    fn reset_views(&mut self) {
        *self.conversation.get_mut() = Conversation::new();
        *self.history.get_mut() = HistoryState::default();
        *self.admin.get_mut() = AdminState::default();
    }

    fn token(&self) -> Option<&str> {
        self.auth.token()
    }

    // =========================================================================
    // CHAT
    // =========================================================================

    /// Send a prompt on the current conversation.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` when signed out, `EmptyPrompt` for blank input, and
    /// `SendInFlight` while a previous send has not settled. None of these
    /// issue a request or touch the transcript.
    pub async fn send(&self, prompt: &str, max_tokens: Option<u32>) -> Result<Message, ChatError> {
        let token = self.token().ok_or(ChatError::Unauthenticated)?;
        if prompt.trim().is_empty() {
            return Err(ChatError::EmptyPrompt);
        }
        let mut conversation = self.conversation.try_lock().map_err(|_| ChatError::SendInFlight)?;
        conversation
            .send(&self.api, token, prompt, max_tokens.unwrap_or(self.max_tokens))
            .await
    }

    /// Start a fresh conversation. Waits for an in-flight send to settle first.
    pub async fn reset_conversation(&self) {
        self.conversation.lock().await.reset();
        info!("chat: conversation reset");
    }

    pub fn conversation_phase(&self) -> ConversationPhase {
        self.conversation
            .try_lock()
            .map_or(ConversationPhase::Pending, |c| c.phase())
    }

    pub async fn conversation(&self) -> MutexGuard<'_, Conversation> {
        self.conversation.lock().await
    }

    // =========================================================================
    // HISTORY
    // =========================================================================

    /// # Errors
    ///
    /// `Unauthenticated` when signed out, otherwise the backend failure.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, HistoryError> {
        let token = self.token().ok_or(HistoryError::Unauthenticated)?;
        let mut history = self.history.lock().await;
        Ok(history.refresh(&self.api, token).await?.to_vec())
    }

    /// # Errors
    ///
    /// `Unauthenticated` when signed out, otherwise the backend failure.
    pub async fn open_session(&self, id: &SessionId) -> Result<SessionDetail, HistoryError> {
        let token = self.token().ok_or(HistoryError::Unauthenticated)?;
        let mut history = self.history.lock().await;
        Ok(history.open(&self.api, token, id).await?.clone())
    }

    /// True while a list or detail fetch holds the history view.
    pub fn history_loading(&self) -> bool {
        self.history.try_lock().is_err()
    }

    pub async fn history(&self) -> MutexGuard<'_, HistoryState> {
        self.history.lock().await
    }

    // =========================================================================
    // ADMIN
    // =========================================================================

    /// Whether the admin surface should be offered at all.
    pub fn can_administer(&self) -> bool {
        self.auth.is_admin()
    }

    /// # Errors
    ///
    /// `Unauthenticated`, `Forbidden`, `InFlight` (no request issued), or the
    /// backend failure.
    pub async fn refresh_metrics(&self) -> Result<Metrics, AdminError> {
        let credential = self.auth.credential().ok_or(AdminError::Unauthenticated)?;
        let mut admin = self.admin.try_lock().map_err(|_| AdminError::InFlight)?;
        Ok(admin.refresh(&self.api, credential).await?.clone())
    }

    /// # Errors
    ///
    /// `Unauthenticated`, `Forbidden`, `InFlight` (no request issued), or the
    /// backend failure.
    pub async fn clear_cache(&self) -> Result<(), AdminError> {
        let credential = self.auth.credential().ok_or(AdminError::Unauthenticated)?;
        let mut admin = self.admin.try_lock().map_err(|_| AdminError::InFlight)?;
        admin.clear_cache(&self.api, credential).await
    }

    /// True while a metrics refresh or cache clear holds the admin view.
    pub fn admin_loading(&self) -> bool {
        self.admin.try_lock().is_err()
    }

    pub async fn admin(&self) -> MutexGuard<'_, AdminState> {
        self.admin.lock().await
    }
}
