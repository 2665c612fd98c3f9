//! Scripted backend and storage doubles for unit tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Semaphore;

use crate::net::api::PortalApi;
use crate::net::error::ApiError;
use crate::net::types::{
    AuthMode, AuthResponse, ChatRequest, ChatResponse, Metrics, Role, SessionDetail, SessionId, SessionSummary,
};
use crate::storage::{KeyValueStore, MemoryStore, StorageError};

/// One recorded backend call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Authenticate { mode: AuthMode, username: String },
    Chat { token: String, prompt: String, max_tokens: u32, session_id: Option<SessionId> },
    ListSessions { token: String },
    SessionDetail { token: String, id: SessionId },
    Metrics { token: String },
    ClearCache { token: String },
}

type Script<T> = Mutex<VecDeque<Result<T, ApiError>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn next<T>(script: &Script<T>) -> Result<T, ApiError> {
    lock(script)
        .pop_front()
        .unwrap_or_else(|| Err(ApiError::Transport("no scripted response".to_owned())))
}

/// Backend double: replies are queued per endpoint, calls are recorded.
///
/// A gated mock parks every chat, session-list, and metrics call until
/// `release` hands out a permit.
pub(crate) struct MockApi {
    calls: Mutex<Vec<Call>>,
    auth: Script<AuthResponse>,
    chat: Script<ChatResponse>,
    sessions: Script<Vec<SessionSummary>>,
    detail: Script<SessionDetail>,
    metrics: Script<Metrics>,
    clear: Script<()>,
    gate: Semaphore,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::with_gate(Semaphore::MAX_PERMITS)
    }
}

impl MockApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn gated() -> Self {
        Self::with_gate(0)
    }

    fn with_gate(permits: usize) -> Self {
        Self {
            calls: Mutex::default(),
            auth: Mutex::default(),
            chat: Mutex::default(),
            sessions: Mutex::default(),
            detail: Mutex::default(),
            metrics: Mutex::default(),
            clear: Mutex::default(),
            gate: Semaphore::new(permits),
        }
    }

    pub(crate) fn release(&self) {
        self.gate.add_permits(1);
    }

    pub(crate) fn with_auth(self, reply: Result<AuthResponse, ApiError>) -> Self {
        lock(&self.auth).push_back(reply);
        self
    }

    pub(crate) fn with_chat(self, reply: Result<ChatResponse, ApiError>) -> Self {
        lock(&self.chat).push_back(reply);
        self
    }

    pub(crate) fn with_sessions(self, reply: Result<Vec<SessionSummary>, ApiError>) -> Self {
        lock(&self.sessions).push_back(reply);
        self
    }

    pub(crate) fn with_detail(self, reply: Result<SessionDetail, ApiError>) -> Self {
        lock(&self.detail).push_back(reply);
        self
    }

    pub(crate) fn with_metrics(self, reply: Result<Metrics, ApiError>) -> Self {
        lock(&self.metrics).push_back(reply);
        self
    }

    pub(crate) fn with_clear(self, reply: Result<(), ApiError>) -> Self {
        lock(&self.clear).push_back(reply);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }

    async fn pass_gate(&self) -> Result<(), ApiError> {
        self.gate
            .acquire()
            .await
            .map(drop)
            .map_err(|e| ApiError::Transport(e.to_string()))
    }
}

#[async_trait::async_trait]
impl PortalApi for MockApi {
    async fn authenticate(&self, mode: AuthMode, username: &str, _password: &str) -> Result<AuthResponse, ApiError> {
        self.record(Call::Authenticate { mode, username: username.to_owned() });
        next(&self.auth)
    }

    async fn chat(&self, token: &str, request: &ChatRequest<'_>) -> Result<ChatResponse, ApiError> {
        self.record(Call::Chat {
            token: token.to_owned(),
            prompt: request.prompt.to_owned(),
            max_tokens: request.max_tokens,
            session_id: request.session_id.cloned(),
        });
        self.pass_gate().await?;
        next(&self.chat)
    }

    async fn list_sessions(&self, token: &str) -> Result<Vec<SessionSummary>, ApiError> {
        self.record(Call::ListSessions { token: token.to_owned() });
        self.pass_gate().await?;
        next(&self.sessions)
    }

    async fn session_detail(&self, token: &str, id: &SessionId) -> Result<SessionDetail, ApiError> {
        self.record(Call::SessionDetail { token: token.to_owned(), id: id.clone() });
        next(&self.detail)
    }

    async fn metrics(&self, token: &str) -> Result<Metrics, ApiError> {
        self.record(Call::Metrics { token: token.to_owned() });
        self.pass_gate().await?;
        next(&self.metrics)
    }

    async fn clear_cache(&self, token: &str) -> Result<(), ApiError> {
        self.record(Call::ClearCache { token: token.to_owned() });
        next(&self.clear)
    }

    fn federated_login_url(&self) -> String {
        "http://backend.test/api/auth/google".to_owned()
    }
}

// =============================================================================
// STORAGE
// =============================================================================

/// Store whose writes always fail; reads go to an inner `MemoryStore`.
#[derive(Default)]
pub(crate) struct ReadOnlyStore {
    pub(crate) inner: MemoryStore,
}

impl KeyValueStore for ReadOnlyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set_many(&self, _entries: &[(&str, String)]) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::other("read-only")))
    }

    fn remove_many(&self, _keys: &[&str]) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::other("read-only")))
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

pub(crate) fn auth_reply(token: &str, username: &str, role: Role) -> Result<AuthResponse, ApiError> {
    Ok(AuthResponse { token: token.to_owned(), username: username.to_owned(), role })
}

pub(crate) fn chat_reply(response: &str, cached: bool, session_id: Option<i64>) -> Result<ChatResponse, ApiError> {
    Ok(ChatResponse { response: response.to_owned(), cached, session_id: session_id.map(SessionId::Numeric) })
}

pub(crate) fn http_error(status: u16, detail: Option<&str>) -> ApiError {
    ApiError::Http { status, detail: detail.map(str::to_owned) }
}

pub(crate) fn sample_metrics() -> Metrics {
    Metrics { cpu_percent: 45.2, memory_mb: 512.0, total_sessions: 3, total_messages: 12, cache_size: 4 }
}

pub(crate) fn summary(id: i64, title: &str) -> SessionSummary {
    SessionSummary { id: SessionId::Numeric(id), title: title.to_owned(), created_at: "2025-01-01T00:00:00".to_owned() }
}
