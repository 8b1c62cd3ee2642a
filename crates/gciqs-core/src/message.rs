//! Typed stream messages and their decoder.
//!
//! Each frame payload is a JSON object tagged by `type`:
//!
//! ```text
//! {"type": "references", "data": [{"id": "DOC-001", ...}]}
//! {"type": "token", "data": "BRCA1 encodes"}
//! {"type": "error", "data": "model unavailable"}
//! {"type": "done"}
//! ```
//!
//! Payloads that fail to parse, or carry an unknown tag, decode to `None` and
//! are skipped by the caller.

use serde::{Deserialize, Serialize};

use crate::frame::{Frame, PAYLOAD_PREFIX};

/// A retrieved reference document shown alongside the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// Document id, unique within one answer (e.g. `DOC-001`).
    pub id: String,
    /// Document title.
    pub title: String,
    /// Gene symbol the document is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene: Option<String>,
    /// Document type (e.g. `variant`, `pathway`).
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Retrieval score.
    #[serde(default)]
    pub score: f64,
    /// Literature citations attached to the document.
    #[serde(rename = "references", default)]
    pub citations: Vec<String>,
}

impl Reference {
    /// Gene label for display; documents without a gene are labelled `multi`.
    #[must_use]
    pub fn gene_label(&self) -> &str {
        match self.gene.as_deref() {
            Some(gene) if !gene.is_empty() => gene,
            _ => "multi",
        }
    }
}

/// Server -> client: one decoded stream message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Envelope")]
pub enum Message {
    /// Retrieved references, sent once before any token.
    References(Vec<Reference>),
    /// Answer text fragment to append.
    Token(String),
    /// Server-side failure; terminates the session.
    Error(String),
    /// End of the answer.
    Done,
}

/// Wire shape of a payload before its tag is resolved.
///
/// `data` is read per tag, so a `done` carrying stray content still decodes.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl TryFrom<Envelope> for Message {
    type Error = serde_json::Error;

    fn try_from(envelope: Envelope) -> Result<Self, <Self as TryFrom<Envelope>>::Error> {
        let Envelope { kind, data } = envelope;
        match kind.as_str() {
            "references" => serde_json::from_value(data).map(Self::References),
            "token" => serde_json::from_value(data).map(Self::Token),
            "error" => serde_json::from_value(data).map(Self::Error),
            "done" => Ok(Self::Done),
            other => Err(serde::de::Error::custom(format_args!(
                "unknown message type `{other}`"
            ))),
        }
    }
}

impl Message {
    /// Short name of the message kind, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::References(_) => "references",
            Self::Token(_) => "token",
            Self::Error(_) => "error",
            Self::Done => "done",
        }
    }
}

/// Decode a frame's payload into a message.
///
/// Returns `None` when the frame has no payload line, the payload is not JSON,
/// or its `type` tag is not recognised.
#[must_use]
pub fn decode(frame: &Frame) -> Option<Message> {
    decode_payload(frame.payload()?)
}

/// Decode raw frame text, stripping the `data: ` prefix first.
#[must_use]
pub fn decode_text(frame_text: &str) -> Option<Message> {
    decode_payload(frame_text.strip_prefix(PAYLOAD_PREFIX)?)
}

/// Decode a payload that has already had its prefix stripped.
#[must_use]
pub fn decode_payload(payload: &str) -> Option<Message> {
    match serde_json::from_str::<Message>(payload) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::debug!(error = %e, payload = %payload, "Discarding undecodable payload");
            None
        }
    }
}
