//! Application state for the terminal front end.
//!
//! The app owns the session controller (with the [`AnswerView`] as its sink),
//! the query input line and the backend health indicator. Query bodies are
//! read by a spawned task that forwards [`StreamEvent`]s, each tagged with the
//! session it belongs to, back to the event loop.

use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use gciqs_core::{
    Phase, PreparedQuery, QuerySessionController, QueryTransport, Rejected, SessionId,
    TransportError,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::{ClientError, QueryClient};
use crate::config::ClientConfig;
use crate::types::{HealthResponse, HealthStatus};
use crate::view::AnswerView;

/// Upper bound on a single health check.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Example questions cycled into the input with `Tab`.
pub const EXAMPLE_QUERIES: &[&str] = &[
    "What is the BRCA1 185delAG founder mutation?",
    "How does BRCA1 take part in homologous recombination repair?",
    "Can CRISPR be used to restore TP53 function?",
    "Why are KRAS G12C inhibitors relevant to pancreatic cancer?",
];

/// Spinner frames shown while waiting for the first token.
const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Notification from a stream task to the event loop.
#[derive(Debug)]
pub enum StreamEvent {
    /// Response headers arrived with a success status.
    Opened(SessionId),
    /// A body chunk.
    Chunk(SessionId, Vec<u8>),
    /// The body ended.
    Ended(SessionId),
    /// The request or body read failed.
    Failed(SessionId, TransportError),
}

/// Send `prepared` through `transport` and forward its body as events.
///
/// The task stops early if the receiving side is gone.
pub fn spawn_stream<T>(
    transport: T,
    prepared: PreparedQuery,
    tx: mpsc::Sender<StreamEvent>,
) -> JoinHandle<()>
where
    T: QueryTransport + 'static,
{
    tokio::spawn(async move {
        let id = prepared.id;
        let mut body = match transport.open(&prepared.request).await {
            Ok(body) => body,
            Err(err) => {
                let _ = tx.send(StreamEvent::Failed(id, err)).await;
                return;
            }
        };

        if tx.send(StreamEvent::Opened(id)).await.is_err() {
            return;
        }

        while let Some(chunk) = body.next().await {
            let event = match chunk {
                Ok(bytes) => StreamEvent::Chunk(id, bytes),
                Err(err) => {
                    let _ = tx.send(StreamEvent::Failed(id, err)).await;
                    return;
                }
            };
            if tx.send(event).await.is_err() {
                return;
            }
        }

        let _ = tx.send(StreamEvent::Ended(id)).await;
    })
}

/// Application state.
pub struct App {
    /// Session controller; its sink is the results area.
    pub controller: QuerySessionController<QueryClient, AnswerView>,
    /// Current input buffer.
    pub input: String,
    /// Cursor position in input, in characters.
    pub cursor_position: usize,
    /// Backend health as of the last check.
    pub health: HealthStatus,
    /// Status message to display.
    pub status_message: Option<String>,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Stream task of the in-flight query.
    stream_task: Option<JoinHandle<()>>,
    /// Next example query to fill in.
    next_example: usize,
    /// Spinner animation frame.
    animation_frame: usize,
}

impl App {
    /// Create a new app.
    #[must_use]
    pub fn new(client: QueryClient, config: &ClientConfig) -> Self {
        Self {
            controller: QuerySessionController::new(client, AnswerView::default())
                .with_top_k(config.effective_top_k()),
            input: String::new(),
            cursor_position: 0,
            health: HealthStatus::Unknown,
            status_message: None,
            should_quit: false,
            stream_task: None,
            next_example: 0,
            animation_frame: 0,
        }
    }

    /// The results area.
    #[must_use]
    pub const fn view(&self) -> &AnswerView {
        self.controller.sink()
    }

    /// Get the service URL.
    #[must_use]
    pub fn server_url(&self) -> &str {
        self.controller.transport().base_url()
    }

    /// Set a status message.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    /// Advance the spinner.
    pub fn tick_animation(&mut self) {
        self.animation_frame = (self.animation_frame + 1) % SPINNER.len();
    }

    /// Current spinner frame.
    #[must_use]
    pub fn spinner_char(&self) -> &'static str {
        SPINNER[self.animation_frame % SPINNER.len()]
    }

    /// Whether a query is in flight and the input is disabled.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.controller.is_busy()
    }

    /// Whether the loader should show (submitted, no token yet).
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_busy() && self.controller.phase() == Phase::Loading
    }

    /// Check if UI needs high-frequency redraws.
    #[must_use]
    pub fn needs_immediate_redraw(&self) -> bool {
        self.is_busy()
    }

    // =========================================================================
    // Query Lifecycle
    // =========================================================================

    /// Submit the current input.
    ///
    /// Starts a stream task forwarding into `tx`. Empty input and submissions
    /// while busy are ignored.
    pub fn submit(&mut self, tx: &mpsc::Sender<StreamEvent>) {
        match self.controller.prepare(&self.input) {
            Ok(prepared) => {
                tracing::debug!(session_id = %prepared.id, top_k = prepared.request.top_k, "Query submitted");
                self.status_message = None;
                let transport = self.controller.transport().clone();
                self.stream_task = Some(spawn_stream(transport, prepared, tx.clone()));
            }
            Err(Rejected::EmptyQuery | Rejected::Busy) => {}
        }
    }

    /// Apply a stream event from the query task.
    pub fn handle_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Opened(id) => self.controller.on_opened(id),
            StreamEvent::Chunk(id, bytes) => self.controller.on_chunk(id, &bytes),
            StreamEvent::Ended(id) => {
                self.controller.on_end(id);
                self.finish_if_settled();
            }
            StreamEvent::Failed(id, err) => {
                self.controller.on_failure(id, &err);
                self.finish_if_settled();
            }
        }
    }

    fn finish_if_settled(&mut self) {
        if self.is_busy() {
            return;
        }
        self.stream_task = None;
        match self.controller.phase() {
            Phase::Finalized => self.set_status("Answer complete"),
            Phase::Errored => self.set_status("Query failed"),
            Phase::Idle | Phase::Loading | Phase::Streaming => {}
        }
    }

    /// Clear the results, abandoning any in-flight query.
    pub fn clear_results(&mut self) {
        if let Some(task) = self.stream_task.take() {
            task.abort();
        }
        self.controller.clear();
        self.status_message = None;
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Record the result of a health check.
    pub fn set_health(&mut self, result: Result<HealthResponse, ClientError>) {
        let checked_at = Utc::now();
        self.health = match result {
            Ok(health) => HealthStatus::Online {
                index_size: health.index_size,
                checked_at,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Health check failed");
                HealthStatus::Offline { checked_at }
            }
        };
    }

    /// Run a health check against the service.
    pub async fn refresh_health(&mut self) {
        let client = self.controller.transport().clone();
        let result = match tokio::time::timeout(HEALTH_TIMEOUT, client.health()).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(HEALTH_TIMEOUT)),
        };
        self.set_health(result);
    }

    // =========================================================================
    // Answer Scrolling
    // =========================================================================

    /// Scroll the answer up.
    pub fn scroll_answer_up(&mut self, amount: usize) {
        self.controller.sink_mut().scroll_up(amount);
    }

    /// Scroll the answer down.
    pub fn scroll_answer_down(&mut self, amount: usize) {
        self.controller.sink_mut().scroll_down(amount);
    }

    // =========================================================================
    // Input Handling
    // =========================================================================

    fn byte_index(&self, char_index: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_index)
            .map_or(self.input.len(), |(i, _)| i)
    }

    fn char_count(&self) -> usize {
        self.input.chars().count()
    }

    /// Insert a character at the cursor position.
    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor_position);
        self.input.insert(at, c);
        self.cursor_position += 1;
    }

    /// Delete the character before the cursor.
    pub fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let at = self.byte_index(self.cursor_position);
            self.input.remove(at);
        }
    }

    /// Delete the character at the cursor.
    pub fn delete_char_forward(&mut self) {
        if self.cursor_position < self.char_count() {
            let at = self.byte_index(self.cursor_position);
            self.input.remove(at);
        }
    }

    /// Delete the word before the cursor.
    pub fn delete_word(&mut self) {
        while self.cursor_position > 0 {
            self.delete_char();
            let prev = self
                .cursor_position
                .checked_sub(1)
                .and_then(|i| self.input.chars().nth(i));
            if prev == Some(' ') {
                break;
            }
        }
    }

    /// Move cursor left.
    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    /// Move cursor right.
    pub fn move_cursor_right(&mut self) {
        if self.cursor_position < self.char_count() {
            self.cursor_position += 1;
        }
    }

    /// Move cursor to the start.
    pub fn move_cursor_start(&mut self) {
        self.cursor_position = 0;
    }

    /// Move cursor to the end.
    pub fn move_cursor_end(&mut self) {
        self.cursor_position = self.char_count();
    }

    /// Clear the input.
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
    }

    /// Replace the input with the next example query.
    pub fn fill_next_example(&mut self) {
        let example = EXAMPLE_QUERIES[self.next_example % EXAMPLE_QUERIES.len()];
        self.next_example = (self.next_example + 1) % EXAMPLE_QUERIES.len();
        self.input = example.to_string();
        self.move_cursor_end();
    }
}
