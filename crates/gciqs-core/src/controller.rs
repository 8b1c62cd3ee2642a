//! Query session controller.
//!
//! Orchestrates one query lifecycle at a time: validates the input, issues
//! the request through a [`QueryTransport`], feeds body chunks through the
//! frame extractor and message decoder into the [`DispatchStateMachine`], and
//! applies every resulting effect to the [`RenderSink`].
//!
//! The lifecycle is available in two forms. [`QuerySessionController::submit_query`]
//! awaits the whole cycle. The `prepare` / `on_*` steps expose the same cycle
//! to an event loop that reads the transport in a separate task; every
//! notification carries the [`SessionId`] it was produced for, and
//! notifications for any other session are dropped.

use futures::StreamExt;
use tracing::{debug, warn};

use crate::dispatch::{AnswerSession, DispatchStateMachine, Phase};
use crate::error::TransportError;
use crate::frame::{Frame, FrameExtractor};
use crate::ids::SessionId;
use crate::message;
use crate::sink::{RenderEffect, RenderSink};
use crate::transport::{QueryRequest, QueryTransport, DEFAULT_TOP_K};

/// Why a submission was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// The text was empty after trimming.
    EmptyQuery,
    /// A previous query is still in flight.
    Busy,
}

/// Result of [`QuerySessionController::submit_query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing happened.
    Rejected(Rejected),
    /// The stream ran to its end; `phase` is where the session stopped.
    Completed {
        /// Final phase of the session.
        phase: Phase,
    },
    /// The query failed and an error banner was shown.
    Failed {
        /// The banner text.
        message: String,
    },
}

/// An accepted submission, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    /// Session the response belongs to.
    pub id: SessionId,
    /// Request body to send.
    pub request: QueryRequest,
}

/// Owns the live session and drives it from transport notifications.
pub struct QuerySessionController<T, S> {
    transport: T,
    sink: S,
    top_k: u8,
    in_flight: Option<SessionId>,
    extractor: FrameExtractor,
    machine: Option<DispatchStateMachine>,
    phase: Phase,
    last_error: Option<String>,
}

impl<T: QueryTransport, S: RenderSink> QuerySessionController<T, S> {
    /// Create a controller requesting the default number of references.
    pub fn new(transport: T, sink: S) -> Self {
        Self {
            transport,
            sink,
            top_k: DEFAULT_TOP_K,
            in_flight: None,
            extractor: FrameExtractor::new(),
            machine: None,
            phase: Phase::Idle,
            last_error: None,
        }
    }

    /// Set the number of references requested per query.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: u8) -> Self {
        self.top_k = top_k;
        self
    }

    /// Submit a query and run its cycle to completion or failure.
    pub async fn submit_query(&mut self, text: &str) -> SubmitOutcome {
        let prepared = match self.prepare(text) {
            Ok(prepared) => prepared,
            Err(reason) => return SubmitOutcome::Rejected(reason),
        };
        let id = prepared.id;

        match self.transport.open(&prepared.request).await {
            Ok(mut body) => {
                self.on_opened(id);
                while let Some(chunk) = body.next().await {
                    match chunk {
                        Ok(bytes) => {
                            self.on_chunk(id, &bytes);
                            if self.phase().is_terminal() {
                                break;
                            }
                        }
                        Err(err) => {
                            self.on_failure(id, &err);
                            return self.outcome();
                        }
                    }
                }
                self.on_end(id);
            }
            Err(err) => self.on_failure(id, &err),
        }

        self.outcome()
    }

    /// Accept a submission and start a new session.
    ///
    /// Discards the previous session and emits `Reset`. The trigger surface
    /// stays disabled until `on_end` or `on_failure` is called for the
    /// returned id, or until [`clear`](Self::clear).
    ///
    /// # Errors
    ///
    /// Rejects empty input without any state change, and any submission
    /// while another query is in flight.
    pub fn prepare(&mut self, text: &str) -> Result<PreparedQuery, Rejected> {
        let query = text.trim();
        if query.is_empty() {
            return Err(Rejected::EmptyQuery);
        }
        if self.in_flight.is_some() {
            debug!("Rejecting submission while a query is in flight");
            return Err(Rejected::Busy);
        }

        let id = SessionId::generate();
        debug!(session_id = %id, "Submitting query");

        self.in_flight = Some(id);
        self.extractor = FrameExtractor::new();
        self.machine = None;
        self.phase = Phase::Loading;
        self.last_error = None;
        self.emit(RenderEffect::Reset);

        Ok(PreparedQuery {
            id,
            request: QueryRequest::new(query, self.top_k),
        })
    }

    /// The response headers arrived with a success status.
    pub fn on_opened(&mut self, id: SessionId) {
        if !self.is_live(id, "opened") {
            return;
        }
        self.machine = Some(DispatchStateMachine::new(id));
    }

    /// A body chunk arrived.
    pub fn on_chunk(&mut self, id: SessionId, bytes: &[u8]) {
        if !self.is_live(id, "chunk") {
            return;
        }
        let Some(machine) = &self.machine else {
            return;
        };
        if machine.phase().is_terminal() {
            return;
        }
        let frames: Vec<Frame> = self.extractor.feed(bytes).collect();
        for frame in frames {
            self.dispatch(&frame);
        }
    }

    /// The body ended.
    pub fn on_end(&mut self, id: SessionId) {
        if !self.is_live(id, "end") {
            return;
        }
        if let Some(frame) = self.extractor.flush() {
            self.dispatch(&frame);
        }
        let effects = self
            .machine
            .as_mut()
            .map(DispatchStateMachine::finish_stream)
            .unwrap_or_default();
        self.emit_all(effects);
        self.settle();
    }

    /// The request or the body read failed.
    pub fn on_failure(&mut self, id: SessionId, error: &TransportError) {
        if !self.is_live(id, "failure") {
            return;
        }
        warn!(session_id = %id, error = %error, "Query transport failed");
        let message = error.user_message();

        match self.machine.as_mut() {
            Some(machine) => {
                let effects = machine.fail(message);
                self.emit_all(effects);
            }
            None => {
                self.phase = Phase::Errored;
                self.emit(RenderEffect::ShowError(message));
            }
        }
        self.settle();
    }

    /// Abandon any in-flight or finished session and clear the results.
    pub fn clear(&mut self) {
        if let Some(id) = self.in_flight.take() {
            debug!(session_id = %id, "Abandoning in-flight session");
        }
        self.extractor = FrameExtractor::new();
        self.machine = None;
        self.phase = Phase::Idle;
        self.last_error = None;
        self.emit(RenderEffect::Reset);
    }

    /// Whether a query is in flight (the trigger surface is disabled).
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The live session, once its response has opened.
    #[must_use]
    pub fn session(&self) -> Option<&AnswerSession> {
        self.machine.as_ref().map(DispatchStateMachine::session)
    }

    /// Current phase of the live cycle.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.machine
            .as_ref()
            .map_or(self.phase, DispatchStateMachine::phase)
    }

    /// The render sink.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// The render sink, mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// The transport queries are sent through.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    fn is_live(&self, id: SessionId, event: &'static str) -> bool {
        if self.in_flight == Some(id) {
            true
        } else {
            debug!(session_id = %id, event, "Ignoring notification for stale session");
            false
        }
    }

    fn dispatch(&mut self, frame: &Frame) {
        let Some(message) = message::decode(frame) else {
            return;
        };
        let Some(machine) = self.machine.as_mut() else {
            return;
        };
        let effects = machine.apply(message);
        self.emit_all(effects);
    }

    fn settle(&mut self) {
        self.in_flight = None;
        self.phase = match &self.machine {
            Some(machine) => machine.phase(),
            // Ended before the response ever opened.
            None if self.phase == Phase::Loading => Phase::Idle,
            None => self.phase,
        };
    }

    fn outcome(&self) -> SubmitOutcome {
        match (self.phase(), &self.last_error) {
            (Phase::Errored, Some(message)) => SubmitOutcome::Failed {
                message: message.clone(),
            },
            (phase, _) => SubmitOutcome::Completed { phase },
        }
    }

    fn emit_all(&mut self, effects: Vec<RenderEffect>) {
        for effect in effects {
            self.emit(effect);
        }
    }

    fn emit(&mut self, effect: RenderEffect) {
        if let RenderEffect::ShowError(message) = &effect {
            self.last_error = Some(message.clone());
        }
        effect.apply(&mut self.sink);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures::stream;

    use super::*;
    use crate::sink::RecordingSink;
    use crate::transport::ByteStream;

    /// What the scripted transport answers for one request.
    enum Script {
        Body(Vec<Result<Vec<u8>, TransportError>>),
        Fail(TransportError),
    }

    #[derive(Clone)]
    struct ScriptedTransport {
        script: Arc<Mutex<Option<Script>>>,
        calls: Arc<AtomicUsize>,
        requests: Arc<Mutex<Vec<QueryRequest>>>,
    }

    impl ScriptedTransport {
        fn new(script: Script) -> Self {
            Self {
                script: Arc::new(Mutex::new(Some(script))),
                calls: Arc::new(AtomicUsize::new(0)),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn body(chunks: &[&str]) -> Self {
            Self::new(Script::Body(
                chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect(),
            ))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueryTransport for ScriptedTransport {
        async fn open(&self, request: &QueryRequest) -> Result<ByteStream, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            match self.script.lock().unwrap().take() {
                Some(Script::Body(chunks)) => Ok(stream::iter(chunks).boxed()),
                Some(Script::Fail(err)) => Err(err),
                None => Ok(stream::empty().boxed()),
            }
        }
    }

    fn controller(
        transport: ScriptedTransport,
    ) -> QuerySessionController<ScriptedTransport, RecordingSink> {
        QuerySessionController::new(transport, RecordingSink::default())
    }

    const REFS: &str = r#"data: {"type":"references","data":[{"id":"DOC-001","title":"BRCA1","gene":"BRCA1","type":"gene","score":0.9,"references":[]}]}"#;

    // =========================================================================
    // submit_query
    // =========================================================================

    #[tokio::test]
    async fn full_answer_cycle() {
        let references = format!("{REFS}\n\n");
        let transport = ScriptedTransport::body(&[
            references.as_str(),
            "data: {\"type\":\"token\",\"data\":\"BRCA1 repairs DNA \"}\n\n",
            "data: {\"type\":\"token\",\"data\":\"[DOC-001]\"}\n\ndata: {\"type\":\"done\"}\n\n",
        ]);
        let mut c = controller(transport.clone());

        let outcome = c.submit_query("  What does BRCA1 do?  ").await;

        assert_eq!(outcome, SubmitOutcome::Completed { phase: Phase::Finalized });
        assert!(!c.is_busy());
        assert_eq!(
            transport.requests.lock().unwrap()[0],
            QueryRequest::new("What does BRCA1 do?", DEFAULT_TOP_K)
        );

        let session = c.session().unwrap();
        assert_eq!(session.accumulated_answer(), "BRCA1 repairs DNA [DOC-001]");
        assert_eq!(session.references()[0].id, "DOC-001");

        let effects = &c.sink().effects;
        assert_eq!(effects[0], RenderEffect::Reset);
        assert!(matches!(effects[1], RenderEffect::RevealReferences(_)));
        assert_eq!(effects[2], RenderEffect::BeginStreaming);
        assert_eq!(effects[effects.len() - 2], RenderEffect::EndStreaming);
        let Some(RenderEffect::FinalizeWithCitations(text)) = effects.last() else {
            panic!("Expected FinalizeWithCitations last");
        };
        assert_eq!(text.citation_ids().collect::<Vec<_>>(), vec!["DOC-001"]);
    }

    #[tokio::test]
    async fn empty_input_is_a_silent_no_op() {
        let transport = ScriptedTransport::body(&[]);
        let mut c = controller(transport.clone());

        assert_eq!(
            c.submit_query("").await,
            SubmitOutcome::Rejected(Rejected::EmptyQuery)
        );
        assert_eq!(
            c.submit_query(" \t\n").await,
            SubmitOutcome::Rejected(Rejected::EmptyQuery)
        );

        assert_eq!(transport.calls(), 0);
        assert!(c.sink().effects.is_empty());
        assert_eq!(c.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn malformed_frame_does_not_interrupt_stream() {
        let transport = ScriptedTransport::body(&[
            "data: {\"type\":\"token\",\"data\":\"A\"}\n\ndata: not-json\n\n",
            "data: {\"type\":\"token\",\"data\":\"B\"}\n\ndata: {\"type\":\"done\"}\n\n",
        ]);
        let mut c = controller(transport);

        c.submit_query("q").await;

        assert_eq!(c.session().unwrap().accumulated_answer(), "AB");
        assert_eq!(c.sink().error_count(), 0);
        assert_eq!(c.phase(), Phase::Finalized);
    }

    #[tokio::test]
    async fn done_with_data_still_finalizes_citations() {
        let transport = ScriptedTransport::body(&[
            "data: {\"type\":\"token\",\"data\":\"see [DOC-003]\"}\n\n",
            "data: {\"type\":\"done\",\"data\":\"\"}\n\n",
        ]);
        let mut c = controller(transport);

        c.submit_query("q").await;

        assert_eq!(c.phase(), Phase::Finalized);
        let Some(RenderEffect::FinalizeWithCitations(text)) = c.sink().effects.last() else {
            panic!("Expected FinalizeWithCitations last");
        };
        assert_eq!(text.citation_ids().collect::<Vec<_>>(), vec!["DOC-003"]);
    }

    #[tokio::test]
    async fn trailing_unterminated_done_is_flushed() {
        let transport = ScriptedTransport::body(&[
            "data: {\"type\":\"token\",\"data\":\"x [DOC-7]\"}\n\n",
            "data: {\"type\":\"done\"}",
        ]);
        let mut c = controller(transport);

        c.submit_query("q").await;

        assert!(matches!(
            c.sink().effects.last(),
            Some(RenderEffect::FinalizeWithCitations(_))
        ));
    }

    #[tokio::test]
    async fn stream_end_without_done_stops_streaming() {
        let transport = ScriptedTransport::body(&[
            "data: {\"type\":\"token\",\"data\":\"partial\"}\n\ndata: {\"type\":\"tok",
        ]);
        let mut c = controller(transport);

        let outcome = c.submit_query("q").await;

        assert_eq!(outcome, SubmitOutcome::Completed { phase: Phase::Finalized });
        assert_eq!(c.sink().effects.last(), Some(&RenderEffect::EndStreaming));
        assert_eq!(c.session().unwrap().accumulated_answer(), "partial");
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[tokio::test]
    async fn transport_failure_shows_structured_error() {
        let transport = ScriptedTransport::new(Script::Fail(TransportError::Status {
            status: 400,
            message: Some("query field is required".to_string()),
        }));
        let mut c = controller(transport);

        let outcome = c.submit_query("q").await;

        assert_eq!(
            outcome,
            SubmitOutcome::Failed {
                message: "query field is required".to_string()
            }
        );
        assert!(c.session().is_none());
        assert_eq!(c.phase(), Phase::Errored);
        assert!(!c.is_busy());
        assert_eq!(
            c.sink().effects,
            vec![
                RenderEffect::Reset,
                RenderEffect::ShowError("query field is required".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn status_without_body_falls_back_to_generic_message() {
        let transport = ScriptedTransport::new(Script::Fail(TransportError::Status {
            status: 503,
            message: None,
        }));
        let mut c = controller(transport);

        assert_eq!(
            c.submit_query("q").await,
            SubmitOutcome::Failed {
                message: "HTTP 503".to_string()
            }
        );
    }

    #[tokio::test]
    async fn protocol_error_fails_session() {
        let transport = ScriptedTransport::body(&[
            "data: {\"type\":\"token\",\"data\":\"A\"}\n\n",
            "data: {\"type\":\"error\",\"data\":\"model unavailable\"}\n\n",
            "data: {\"type\":\"token\",\"data\":\"B\"}\n\n",
        ]);
        let mut c = controller(transport);

        let outcome = c.submit_query("q").await;

        assert_eq!(
            outcome,
            SubmitOutcome::Failed {
                message: "model unavailable".to_string()
            }
        );
        assert_eq!(c.session().unwrap().accumulated_answer(), "A");
        assert_eq!(c.sink().error_count(), 1);
        assert!(!c.is_busy());
    }

    #[tokio::test]
    async fn body_read_failure_fails_session() {
        let transport = ScriptedTransport::new(Script::Body(vec![
            Ok(b"data: {\"type\":\"token\",\"data\":\"A\"}\n\n".to_vec()),
            Err(TransportError::Body("connection reset".to_string())),
        ]));
        let mut c = controller(transport);

        let outcome = c.submit_query("q").await;

        assert_eq!(
            outcome,
            SubmitOutcome::Failed {
                message: "connection reset".to_string()
            }
        );
        assert_eq!(c.phase(), Phase::Errored);
    }

    // =========================================================================
    // Event-Driven Lifecycle
    // =========================================================================

    #[test]
    fn submission_rejected_while_in_flight() {
        let mut c = controller(ScriptedTransport::body(&[]));
        let first = c.prepare("first").unwrap();
        assert!(c.is_busy());
        assert_eq!(c.phase(), Phase::Loading);

        assert_eq!(c.prepare("second"), Err(Rejected::Busy));

        c.on_opened(first.id);
        c.on_end(first.id);
        assert!(!c.is_busy());
        assert!(c.prepare("second").is_ok());
    }

    #[test]
    fn stale_notifications_are_ignored_after_clear() {
        let mut c = controller(ScriptedTransport::body(&[]));
        let old = c.prepare("old").unwrap();
        c.on_opened(old.id);
        c.on_chunk(old.id, b"data: {\"type\":\"token\",\"data\":\"A\"}\n\n");

        c.clear();
        assert!(!c.is_busy());
        assert_eq!(c.phase(), Phase::Idle);
        let before = c.sink().effects.len();

        let new = c.prepare("new").unwrap();
        c.on_opened(new.id);
        c.on_chunk(old.id, b"data: {\"type\":\"token\",\"data\":\"stale\"}\n\n");
        c.on_end(old.id);
        c.on_failure(old.id, &TransportError::Network("late".to_string()));

        // Only the Reset from the new submission.
        assert_eq!(c.sink().effects.len(), before + 1);
        assert!(c.is_busy());
        assert_eq!(c.session().unwrap().accumulated_answer(), "");

        c.on_chunk(new.id, b"data: {\"type\":\"token\",\"data\":\"fresh\"}\n\n");
        assert_eq!(c.session().unwrap().accumulated_answer(), "fresh");
    }

    #[test]
    fn chunks_before_open_are_ignored() {
        let mut c = controller(ScriptedTransport::body(&[]));
        let q = c.prepare("q").unwrap();
        c.on_chunk(q.id, b"data: {\"type\":\"token\",\"data\":\"A\"}\n\n");
        assert!(c.session().is_none());
        assert_eq!(c.sink().effects, vec![RenderEffect::Reset]);
    }

    #[test]
    fn top_k_is_carried_into_request() {
        let mut c = controller(ScriptedTransport::body(&[])).with_top_k(8);
        let q = c.prepare("q").unwrap();
        assert_eq!(q.request.top_k, 8);
    }
}
