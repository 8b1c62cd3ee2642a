//! Terminal answer view: the render sink behind the TUI.
//!
//! Holds everything the results area shows. The controller drives it through
//! [`RenderSink`]; `ui` reads it when drawing.

use gciqs_core::{CitedText, Reference, RenderSink};

/// Results area state.
#[derive(Debug, Default)]
pub struct AnswerView {
    /// Retrieved references; the panel is hidden while empty.
    pub references: Vec<Reference>,
    /// Whether the answer panel has been revealed.
    pub answer_visible: bool,
    /// Whether tokens are still arriving.
    pub streaming: bool,
    /// Answer text as streamed.
    pub answer: String,
    /// Final citation-marked answer, once the stream completed.
    pub cited: Option<CitedText>,
    /// Error banner text.
    pub error: Option<String>,
    /// Answer scroll position, in lines up from the bottom.
    pub scroll: usize,
}

impl AnswerView {
    /// Scroll the answer up (towards the start).
    pub fn scroll_up(&mut self, amount: usize) {
        self.scroll = self.scroll.saturating_add(amount);
    }

    /// Scroll the answer down (towards the latest text).
    pub fn scroll_down(&mut self, amount: usize) {
        self.scroll = self.scroll.saturating_sub(amount);
    }

    /// Whether nothing is shown in the results area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty() && !self.answer_visible && self.error.is_none()
    }
}

impl RenderSink for AnswerView {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn reveal_references(&mut self, references: Vec<Reference>) {
        self.references = references;
    }

    fn begin_streaming(&mut self) {
        self.answer_visible = true;
        self.streaming = true;
    }

    fn append_text(&mut self, fragment: &str) {
        self.answer.push_str(fragment);
        // Keep the newest text in view
        self.scroll = 0;
    }

    fn end_streaming(&mut self) {
        self.streaming = false;
    }

    fn finalize_with_citations(&mut self, text: CitedText) {
        self.answer_visible = true;
        self.cited = Some(text);
    }

    fn show_error(&mut self, message: &str) {
        self.streaming = false;
        self.error = Some(message.to_string());
    }
}
