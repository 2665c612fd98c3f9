//! Conversation tracker: transcript plus the server-issued session handle.
//!
//! DESIGN
//! ======
//! A send is two-phase. The user turn is appended before the request goes
//! out; the assistant turn (reply or failure text) is appended when it
//! settles. Every accepted send therefore grows the transcript by exactly
//! two entries, including when the request fails or the send future is
//! dropped mid-flight.
//!
//! The session id is adopted from the first reply that carries one and is
//! never replaced afterwards. Cache hits come back without an id.

#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::net::api::PortalApi;
use crate::net::types::{ChatRequest, MessageRole, SessionId};

const CANCELLED_REASON: &str = "request cancelled";

// =============================================================================
// TYPES
// =============================================================================

/// A single transcript entry. Never mutated once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Server-reported cache hit. Only set on assistant replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into(), cached: None }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>, cached: bool) -> Self {
        Self { role: MessageRole::Assistant, content: content.into(), cached: Some(cached) }
    }

    /// Assistant turn recording a failed exchange.
    #[must_use]
    pub fn failure(reason: &str) -> Self {
        Self { role: MessageRole::Assistant, content: format!("Error: {reason}"), cached: None }
    }

    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cached == Some(true)
    }
}

/// Where a conversation sits in its lifecycle.
///
/// `Empty` means no session is bound yet, even if failed or cached turns
/// are already in the transcript.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversationPhase {
    Empty,
    Pending,
    Active,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("a message is already being sent")]
    SendInFlight,
    #[error("not signed in")]
    Unauthenticated,
}

#[derive(Clone, Debug, Default)]
pub struct Conversation {
    session_id: Option<SessionId>,
    transcript: Vec<Message>,
    pending: bool,
}

// =============================================================================
// CONVERSATION
// =============================================================================

impl Conversation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    #[must_use]
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    #[must_use]
    pub fn phase(&self) -> ConversationPhase {
        if self.pending {
            ConversationPhase::Pending
        } else if self.session_id.is_some() {
            ConversationPhase::Active
        } else {
            ConversationPhase::Empty
        }
    }

    /// Send one prompt and append both turns.
    ///
    /// Returns the appended assistant turn, which carries the failure text
    /// when the request did not succeed.
    ///
    /// # Errors
    ///
    /// `EmptyPrompt` for blank input, without issuing a request or touching
    /// the transcript. A second send cannot start while one is pending: the
    /// pending send holds the only mutable borrow.
    pub async fn send<A>(&mut self, api: &A, token: &str, prompt: &str, max_tokens: u32) -> Result<Message, ChatError>
    where
        A: PortalApi + ?Sized,
    {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ChatError::EmptyPrompt);
        }

        let session_id = self.session_id.clone();
        self.transcript.push(Message::user(prompt));
        let turn = PendingTurn::begin(self);

        info!(prompt_len = prompt.len(), max_tokens, session_id = ?session_id, "chat: sending");
        let request = ChatRequest { prompt, max_tokens, session_id: session_id.as_ref() };
        let (reply, returned_id) = match api.chat(token, &request).await {
            Ok(resp) => {
                info!(cached = resp.cached, session_id = ?resp.session_id, "chat: reply received");
                (Message::assistant(resp.response, resp.cached), resp.session_id)
            }
            Err(e) => {
                warn!(error = %e, "chat: send failed");
                (Message::failure(&e.user_message()), None)
            }
        };

        turn.settle(reply.clone(), returned_id);
        Ok(reply)
    }

    /// Drop the transcript and session so the next send starts a new conversation.
    pub fn reset(&mut self) {
        self.session_id = None;
        self.transcript.clear();
        self.pending = false;
    }

    fn bind_session(&mut self, returned: Option<SessionId>) {
        let Some(returned) = returned else {
            return;
        };
        match &self.session_id {
            None => {
                info!(session_id = %returned, "chat: session bound");
                self.session_id = Some(returned);
            }
            Some(bound) if *bound != returned => {
                warn!(bound = %bound, returned = %returned, "chat: ignoring different session id");
            }
            Some(_) => {}
        }
    }
}

// =============================================================================
// PENDING TURN
// =============================================================================

/// Holds the conversation in `Pending` until the reply settles.
///
/// If dropped unsettled (the send future was cancelled), appends a failure
/// turn so the transcript still records the attempt.
struct PendingTurn<'a> {
    conversation: &'a mut Conversation,
    settled: bool,
}

impl<'a> PendingTurn<'a> {
    fn begin(conversation: &'a mut Conversation) -> Self {
        conversation.pending = true;
        Self { conversation, settled: false }
    }

    fn settle(mut self, reply: Message, returned_id: Option<SessionId>) {
        self.conversation.bind_session(returned_id);
        self.conversation.transcript.push(reply);
        self.conversation.pending = false;
        self.settled = true;
    }
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("chat: send dropped before settling");
            self.conversation.transcript.push(Message::failure(CANCELLED_REASON));
            self.conversation.pending = false;
        }
    }
}
