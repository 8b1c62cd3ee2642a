//! Streaming answer consumer for the GCIQS query client.
//!
//! This crate turns a chunked server-sent event body into render effects:
//!
//! - **Frames**: [`FrameExtractor`] buffers chunks and yields complete frames
//! - **Messages**: [`decode`] parses a frame payload into a typed [`Message`]
//! - **Dispatch**: [`DispatchStateMachine`] drives an [`AnswerSession`] and
//!   emits [`RenderEffect`]s
//! - **Citations**: [`mark_citations`] splits a finished answer into text and
//!   `[DOC-nnn]` citation segments
//! - **Control**: [`QuerySessionController`] runs one query at a time over a
//!   [`QueryTransport`] and applies effects to a [`RenderSink`]
//!
//! # Example
//!
//! ```
//! use gciqs_core::{decode, FrameExtractor, Message};
//!
//! let mut extractor = FrameExtractor::new();
//! let mut messages = Vec::new();
//! for chunk in [r#"data: {"type":"token","data":"Hel"#, "lo\"}\n\ndata: {\"type\":\"done\"}\n\n"] {
//!     messages.extend(extractor.feed(chunk).filter_map(|frame| decode(&frame)));
//! }
//!
//! assert_eq!(messages, vec![Message::Token("Hello".to_string()), Message::Done]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod citation;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod ids;
pub mod message;
pub mod sink;
pub mod transport;

pub use citation::{mark_citations, CitedText, Segment};
pub use controller::{PreparedQuery, QuerySessionController, Rejected, SubmitOutcome};
pub use dispatch::{AnswerSession, DispatchStateMachine, Phase};
pub use error::TransportError;
pub use frame::{extract_frames, Frame, FrameExtractor, FRAME_SEPARATOR, PAYLOAD_PREFIX};
pub use ids::SessionId;
pub use message::{decode, decode_payload, decode_text, Message, Reference};
#[cfg(any(test, feature = "test-utils"))]
pub use sink::RecordingSink;
pub use sink::{RenderEffect, RenderSink};
pub use transport::{ByteStream, QueryRequest, QueryTransport, DEFAULT_TOP_K};
