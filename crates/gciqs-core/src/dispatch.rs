//! Message dispatch state machine.
//!
//! Consumes decoded messages in arrival order, mutates the [`AnswerSession`]
//! and returns the render effects each message causes.
//!
//! # State Machine
//!
//! ```text
//!     ┌──────────┐  (submit)   ┌───────────┐  (first token)  ┌─────────────┐
//!     │   Idle   │────────────▶│  Loading  │────────────────▶│  Streaming  │
//!     └────┬─────┘             └─────┬─────┘                 └──────┬──────┘
//!          │                         │ (done / end)                 │ (done / end)
//!          │                         ▼                              ▼
//!          │                   ┌─────────────────────────────────────────┐
//!          │                   │               Finalized                 │
//!          │                   └─────────────────────────────────────────┘
//!          │ (transport failure)     │ (error)                      │ (error)
//!          ▼                         ▼                              ▼
//!     ┌─────────────────────────────────────────────────────────────────────┐
//!     │                              Errored                                │
//!     └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Finalized` and `Errored` are absorbing: anything fed afterwards yields no
//! effects.

use std::fmt;

use tracing::debug;

use crate::citation::mark_citations;
use crate::ids::SessionId;
use crate::message::{Message, Reference};
use crate::sink::RenderEffect;

/// Phase of the current query-response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// No query submitted yet, or results were cleared.
    #[default]
    Idle,
    /// Query submitted; waiting for the first token.
    Loading,
    /// At least one token has been appended.
    Streaming,
    /// The answer completed.
    Finalized,
    /// The session failed.
    Errored,
}

impl Phase {
    /// Whether no further messages are processed in this phase.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Errored)
    }

    /// Lowercase name of the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Streaming => "streaming",
            Self::Finalized => "finalized",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state of one query-response cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerSession {
    id: SessionId,
    accumulated_answer: String,
    references: Vec<Reference>,
    first_token_seen: bool,
    terminated: bool,
    errored: Option<String>,
}

impl AnswerSession {
    /// Create an empty session.
    #[must_use]
    pub const fn new(id: SessionId) -> Self {
        Self {
            id,
            accumulated_answer: String::new(),
            references: Vec::new(),
            first_token_seen: false,
            terminated: false,
            errored: None,
        }
    }

    /// The session id.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// All answer text received so far.
    #[must_use]
    pub fn accumulated_answer(&self) -> &str {
        &self.accumulated_answer
    }

    /// The retrieved references (empty until a references message arrives).
    #[must_use]
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Whether a token has been accepted.
    #[must_use]
    pub const fn first_token_seen(&self) -> bool {
        self.first_token_seen
    }

    /// Whether the session is frozen.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// The error that terminated the session, if any.
    #[must_use]
    pub fn errored(&self) -> Option<&str> {
        self.errored.as_deref()
    }
}

/// Drives one [`AnswerSession`] through its phases.
#[derive(Debug, Clone)]
pub struct DispatchStateMachine {
    phase: Phase,
    session: AnswerSession,
}

impl DispatchStateMachine {
    /// Start a fresh session in the `Loading` phase.
    #[must_use]
    pub const fn new(id: SessionId) -> Self {
        Self {
            phase: Phase::Loading,
            session: AnswerSession::new(id),
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The session being driven.
    #[must_use]
    pub const fn session(&self) -> &AnswerSession {
        &self.session
    }

    /// Apply one message and return the effects it produces.
    pub fn apply(&mut self, message: Message) -> Vec<RenderEffect> {
        if self.phase.is_terminal() {
            debug!(
                session_id = %self.session.id,
                kind = message.kind(),
                phase = %self.phase,
                "Ignoring message after session terminated"
            );
            return Vec::new();
        }

        match message {
            Message::References(references) => {
                // Replaces any earlier list; an empty list keeps the panel hidden.
                self.session.references = references;
                if self.session.references.is_empty() {
                    Vec::new()
                } else {
                    vec![RenderEffect::RevealReferences(self.session.references.clone())]
                }
            }
            Message::Token(fragment) => {
                let mut effects = Vec::with_capacity(2);
                if !self.session.first_token_seen {
                    self.session.first_token_seen = true;
                    self.transition(Phase::Streaming);
                    effects.push(RenderEffect::BeginStreaming);
                }
                self.session.accumulated_answer.push_str(&fragment);
                effects.push(RenderEffect::AppendText(fragment));
                effects
            }
            Message::Error(message) => self.fail(message),
            Message::Done => {
                self.session.terminated = true;
                self.transition(Phase::Finalized);
                vec![
                    RenderEffect::EndStreaming,
                    RenderEffect::FinalizeWithCitations(mark_citations(
                        &self.session.accumulated_answer,
                    )),
                ]
            }
        }
    }

    /// Terminate the session with an error banner.
    ///
    /// Used for `error` messages and for transport failures while reading the
    /// body. No effect once the session is terminated.
    pub fn fail(&mut self, message: impl Into<String>) -> Vec<RenderEffect> {
        if self.phase.is_terminal() {
            return Vec::new();
        }
        let message = message.into();
        self.session.errored = Some(message.clone());
        self.session.terminated = true;
        self.transition(Phase::Errored);
        vec![RenderEffect::ShowError(message)]
    }

    /// The transport reported end-of-stream.
    ///
    /// A session that never saw `done` stops streaming and is finalized
    /// without a citation pass.
    pub fn finish_stream(&mut self) -> Vec<RenderEffect> {
        if self.phase.is_terminal() {
            return Vec::new();
        }
        self.session.terminated = true;
        self.transition(Phase::Finalized);
        vec![RenderEffect::EndStreaming]
    }

    fn transition(&mut self, to: Phase) {
        debug!(session_id = %self.session.id, from = %self.phase, to = %to, "Phase transition");
        self.phase = to;
    }
}
