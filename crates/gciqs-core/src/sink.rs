//! Render effects and the sink that applies them.
//!
//! The dispatch state machine never touches a presentation surface. It emits
//! [`RenderEffect`] commands, and a [`RenderSink`] (terminal view, console
//! printer, test recorder) decides what each one looks like.

use crate::citation::CitedText;
use crate::message::Reference;

/// A presentation change requested by the state machine or controller.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEffect {
    /// Clear all results for a new query.
    Reset,
    /// Show the reference panel with these documents.
    RevealReferences(Vec<Reference>),
    /// Reveal the answer panel and start the streaming presentation.
    BeginStreaming,
    /// Append an answer fragment and keep it in view.
    AppendText(String),
    /// Stop the streaming presentation.
    EndStreaming,
    /// Replace the streamed text with its citation-marked final form.
    FinalizeWithCitations(CitedText),
    /// Show the error banner.
    ShowError(String),
}

impl RenderEffect {
    /// Apply this effect to `sink`.
    pub fn apply<S: RenderSink + ?Sized>(self, sink: &mut S) {
        match self {
            Self::Reset => sink.reset(),
            Self::RevealReferences(references) => sink.reveal_references(references),
            Self::BeginStreaming => sink.begin_streaming(),
            Self::AppendText(fragment) => sink.append_text(&fragment),
            Self::EndStreaming => sink.end_streaming(),
            Self::FinalizeWithCitations(text) => sink.finalize_with_citations(text),
            Self::ShowError(message) => sink.show_error(&message),
        }
    }
}

/// A presentation surface driven by render effects.
pub trait RenderSink {
    /// Clear references, answer and error banner.
    fn reset(&mut self);

    /// Show the retrieved references.
    fn reveal_references(&mut self, references: Vec<Reference>);

    /// The first token arrived: hide the loader and reveal the answer panel.
    fn begin_streaming(&mut self);

    /// Append an answer fragment.
    fn append_text(&mut self, fragment: &str);

    /// The answer stopped streaming.
    fn end_streaming(&mut self) {}

    /// Render the finished answer with citation markup.
    fn finalize_with_citations(&mut self, text: CitedText);

    /// Show an error banner.
    fn show_error(&mut self, message: &str);
}

/// A sink that records every effect it receives.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct RecordingSink {
    /// Effects in the order they were applied.
    pub effects: Vec<RenderEffect>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingSink {
    /// Number of `ShowError` effects received.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.effects
            .iter()
            .filter(|effect| matches!(effect, RenderEffect::ShowError(_)))
            .count()
    }

    /// Concatenation of all appended fragments.
    #[must_use]
    pub fn appended_text(&self) -> String {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                RenderEffect::AppendText(fragment) => Some(fragment.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl RenderSink for RecordingSink {
    fn reset(&mut self) {
        self.effects.push(RenderEffect::Reset);
    }

    fn reveal_references(&mut self, references: Vec<Reference>) {
        self.effects.push(RenderEffect::RevealReferences(references));
    }

    fn begin_streaming(&mut self) {
        self.effects.push(RenderEffect::BeginStreaming);
    }

    fn append_text(&mut self, fragment: &str) {
        self.effects.push(RenderEffect::AppendText(fragment.to_string()));
    }

    fn end_streaming(&mut self) {
        self.effects.push(RenderEffect::EndStreaming);
    }

    fn finalize_with_citations(&mut self, text: CitedText) {
        self.effects.push(RenderEffect::FinalizeWithCitations(text));
    }

    fn show_error(&mut self, message: &str) {
        self.effects.push(RenderEffect::ShowError(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::mark_citations;

    #[test]
    fn effects_apply_to_matching_sink_methods() {
        let effects = vec![
            RenderEffect::Reset,
            RenderEffect::BeginStreaming,
            RenderEffect::AppendText("Hi [DOC-1]".to_string()),
            RenderEffect::EndStreaming,
            RenderEffect::FinalizeWithCitations(mark_citations("Hi [DOC-1]")),
            RenderEffect::ShowError("boom".to_string()),
        ];

        let mut sink = RecordingSink::default();
        for effect in effects.clone() {
            effect.apply(&mut sink);
        }

        assert_eq!(sink.effects, effects);
        assert_eq!(sink.appended_text(), "Hi [DOC-1]");
        assert_eq!(sink.error_count(), 1);
    }

    #[test]
    fn end_streaming_defaults_to_no_op() {
        struct Minimal(usize);
        impl RenderSink for Minimal {
            fn reset(&mut self) {}
            fn reveal_references(&mut self, _references: Vec<Reference>) {}
            fn begin_streaming(&mut self) {}
            fn append_text(&mut self, _fragment: &str) {
                self.0 += 1;
            }
            fn finalize_with_citations(&mut self, _text: CitedText) {}
            fn show_error(&mut self, _message: &str) {}
        }

        let mut sink = Minimal(0);
        RenderEffect::EndStreaming.apply(&mut sink);
        RenderEffect::AppendText("x".to_string()).apply(&mut sink);
        assert_eq!(sink.0, 1);
    }
}
