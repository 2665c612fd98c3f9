//! Auth resolution for the current client.
//!
//! SYSTEM CONTEXT
//! ==============
//! Runs once at startup, before any protected request. Three sources compete,
//! in strict precedence: credentials carried back on the federated-login
//! redirect, then whatever the credential store holds, then nothing.
//!
//! TRADE-OFFS
//! ==========
//! The redirect parameters are stripped from the visible URL by replacing the
//! current history entry, so a reload neither replays the login nor adds a
//! back-button step. Unrelated path and query state is preserved.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use tracing::{info, warn};
use url::{Url, form_urlencoded};

use crate::net::api::PortalApi;
use crate::net::error::ApiError;
use crate::net::types::{AuthMode, Credential, Role};
use crate::storage::credentials::CredentialStore;
use crate::storage::{KeyValueStore, StorageError};

pub const TOKEN_PARAM: &str = "token";
pub const USERNAME_PARAM: &str = "username";
pub const ROLE_PARAM: &str = "role";

// =============================================================================
// TYPES
// =============================================================================

/// Where this load's credential came from. Consumed once per resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthSource {
    Redirect(Credential),
    Persisted(Credential),
    None,
}

impl AuthSource {
    /// Pick the winning source: redirect beats persisted beats nothing.
    #[must_use]
    pub fn select(redirect: Option<Credential>, persisted: Option<Credential>) -> Self {
        match (redirect, persisted) {
            (Some(credential), _) => Self::Redirect(credential),
            (None, Some(credential)) => Self::Persisted(credential),
            (None, None) => Self::None,
        }
    }

    #[must_use]
    pub fn origin(&self) -> AuthOrigin {
        match self {
            Self::Redirect(_) => AuthOrigin::Redirect,
            Self::Persisted(_) => AuthOrigin::Persisted,
            Self::None => AuthOrigin::None,
        }
    }

    #[must_use]
    pub fn into_state(self) -> AuthState {
        match self {
            Self::Redirect(credential) | Self::Persisted(credential) => AuthState::Authenticated(credential),
            Self::None => AuthState::Unauthenticated,
        }
    }
}

/// Which source won startup resolution, without the credential itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthOrigin {
    Redirect,
    Persisted,
    #[default]
    None,
}

/// Resolved authentication state gating every protected operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticated(Credential),
}

impl AuthState {
    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        match self {
            Self::Authenticated(credential) => Some(credential),
            Self::Unauthenticated => None,
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.credential().map(|c| c.token.as_str())
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Client-side gate for the admin surface. The server re-checks.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.credential().is_some_and(Credential::is_admin)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("authentication request failed: {0}")]
    Api(#[from] ApiError),
    #[error("credential storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Reason shown to the user after a failed login or registration.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(ApiError::Http { detail: Some(detail), .. }) => detail.clone(),
            Self::Api(ApiError::Http { detail: None, .. }) => "Authentication failed".to_owned(),
            Self::Api(ApiError::Transport(msg)) => format!("Network error: {msg}"),
            Self::Api(other) => format!("Network error: {other}"),
            other => other.to_string(),
        }
    }
}

// =============================================================================
// NAVIGATION CONTEXT
// =============================================================================

/// The address bar, reduced to what auth resolution needs.
pub trait Navigation {
    fn current(&self) -> Url;

    /// Replace the current history entry without pushing a new one.
    fn replace(&mut self, url: Url);
}

/// In-process navigation history, used by the CLI and tests.
#[derive(Clone, Debug)]
pub struct MemoryNavigation {
    current: Url,
    previous: Vec<Url>,
}

impl MemoryNavigation {
    #[must_use]
    pub fn new(initial: Url) -> Self {
        Self { current: initial, previous: Vec::new() }
    }

    pub fn push(&mut self, url: Url) {
        let prior = std::mem::replace(&mut self.current, url);
        self.previous.push(prior);
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        self.previous.len() + 1
    }
}

impl Navigation for MemoryNavigation {
    fn current(&self) -> Url {
        self.current.clone()
    }

    fn replace(&mut self, url: Url) {
        self.current = url;
    }
}

// =============================================================================
// REDIRECT PARAMETERS
// =============================================================================

/// Credential carried on a federated-login redirect, if all three fields are present.
///
/// Empty values count as missing. A role outside `user`/`admin` makes the
/// redirect unusable.
#[must_use]
pub fn redirect_credential(url: &Url) -> Option<Credential> {
    let mut token = None;
    let mut username = None;
    let mut role = None;
    for (key, value) in url.query_pairs() {
        if value.is_empty() {
            continue;
        }
        match &*key {
            TOKEN_PARAM => token = Some(value.into_owned()),
            USERNAME_PARAM => username = Some(value.into_owned()),
            ROLE_PARAM => role = Some(value.into_owned()),
            _ => {}
        }
    }

    let (token, username, role) = (token?, username?, role?);
    match role.parse::<Role>() {
        Ok(role) => Some(Credential::new(token, username, role)),
        Err(e) => {
            warn!(error = %e, "auth: redirect carried an unusable role");
            None
        }
    }
}

/// Copy of `url` with the three auth parameters removed.
///
/// Every other query segment is kept as its original raw text, so unrelated
/// parameters come back byte for byte.
#[must_use]
pub fn strip_auth_params(url: &Url) -> Url {
    let mut stripped = url.clone();
    let Some(query) = url.query() else {
        return stripped;
    };
    let kept: Vec<&str> = query
        .split('&')
        .filter(|segment| !segment.is_empty() && !is_auth_param(segment))
        .collect();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.set_query(Some(&kept.join("&")));
    }
    stripped
}

/// Keys are compared after percent-decoding, so `tok%65n=...` is still `token`.
fn is_auth_param(segment: &str) -> bool {
    form_urlencoded::parse(segment.as_bytes())
        .next()
        .is_some_and(|(key, _)| matches!(&*key, TOKEN_PARAM | USERNAME_PARAM | ROLE_PARAM))
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Inspect the navigation context and the store, without side effects.
pub fn detect<N, S>(navigation: &N, store: &CredentialStore<S>) -> AuthSource
where
    N: Navigation + ?Sized,
    S: KeyValueStore,
{
    if let Some(credential) = redirect_credential(&navigation.current()) {
        return AuthSource::Redirect(credential);
    }
    AuthSource::select(None, store.load())
}

/// Resolve startup auth state.
///
/// A redirect credential is persisted and its parameters are removed from
/// the current history entry before it is returned.
pub fn resolve<N, S>(navigation: &mut N, store: &CredentialStore<S>) -> AuthState
where
    N: Navigation + ?Sized,
    S: KeyValueStore,
{
    resolve_source(navigation, store).into_state()
}

/// Same as [`resolve`], but keeps the winning source.
pub fn resolve_source<N, S>(navigation: &mut N, store: &CredentialStore<S>) -> AuthSource
where
    N: Navigation + ?Sized,
    S: KeyValueStore,
{
    let source = detect(navigation, store);
    match &source {
        AuthSource::Redirect(credential) => {
            if let Err(e) = store.save(credential) {
                warn!(error = %e, "auth: redirect credential not persisted");
            }
            let clean = strip_auth_params(&navigation.current());
            navigation.replace(clean);
            info!(username = credential.username(), role = %credential.role(), "auth: resolved from redirect");
        }
        AuthSource::Persisted(credential) => {
            info!(username = credential.username(), role = %credential.role(), "auth: resolved from storage");
        }
        AuthSource::None => info!("auth: unauthenticated"),
    }
    source
}

/// Submit a username/password to the login or register endpoint.
///
/// On success the credential is persisted before it is returned. On any
/// failure stored state is untouched.
///
/// # Errors
///
/// Returns `MissingField` without issuing a request for blank input, `Api`
/// when the backend rejects or cannot be reached, and `Storage` when the
/// credential could not be persisted.
pub async fn submit_credentials<A, S>(
    api: &A,
    store: &CredentialStore<S>,
    mode: AuthMode,
    username: &str,
    password: &str,
) -> Result<Credential, AuthError>
where
    A: PortalApi + ?Sized,
    S: KeyValueStore,
{
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::MissingField("username"));
    }
    if password.is_empty() {
        return Err(AuthError::MissingField("password"));
    }

    let response = api
        .authenticate(mode, username, password)
        .await
        .inspect_err(|e| warn!(?mode, username, error = %e, "auth: credential submission rejected"))?;
    let credential = Credential::from(response);
    store.save(&credential)?;
    info!(?mode, username = credential.username(), role = %credential.role(), "auth: signed in");
    Ok(credential)
}
