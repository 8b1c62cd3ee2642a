//! Plain-text render sink for one-shot mode.
//!
//! References are listed first, tokens are written to the output as they
//! arrive, and the cited document ids follow the finished answer. Errors go to
//! the separate error writer.

use std::io::{self, Write};

use gciqs_core::{
    CitedText, QuerySessionController, QueryTransport, Reference, RenderSink, SubmitOutcome,
};

/// Writes render effects as plain text.
pub struct ConsoleSink<W: Write, E: Write> {
    out: W,
    err: E,
    io_error: Option<io::Error>,
}

impl ConsoleSink<io::Stdout, io::Stderr> {
    /// A sink writing to stdout and stderr.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<W: Write, E: Write> ConsoleSink<W, E> {
    /// Create a sink over the given writers.
    pub const fn new(out: W, err: E) -> Self {
        Self {
            out,
            err,
            io_error: None,
        }
    }

    /// The first write error encountered, if any.
    pub fn take_io_error(&mut self) -> Option<io::Error> {
        self.io_error.take()
    }

    /// Consume the sink and return its writers.
    pub fn into_inner(self) -> (W, E) {
        (self.out, self.err)
    }

    fn record(&mut self, result: io::Result<()>) {
        if let Err(e) = result {
            tracing::warn!(error = %e, "Console write failed");
            self.io_error.get_or_insert(e);
        }
    }
}

/// Answer one query, printing through the controller's console sink.
///
/// Returns `Ok(false)` when the answer ended in a surfaced error. A blank
/// query sends nothing and counts as success.
///
/// # Errors
///
/// Returns the first write error the sink hit.
pub async fn answer_once<T, W, E>(
    controller: &mut QuerySessionController<T, ConsoleSink<W, E>>,
    query: &str,
) -> io::Result<bool>
where
    T: QueryTransport,
    W: Write,
    E: Write,
{
    let outcome = controller.submit_query(query).await;
    if let Some(e) = controller.sink_mut().take_io_error() {
        return Err(e);
    }

    Ok(match outcome {
        SubmitOutcome::Completed { .. } => true,
        SubmitOutcome::Failed { .. } => false,
        SubmitOutcome::Rejected(reason) => {
            tracing::debug!(?reason, "Query not submitted");
            true
        }
    })
}

fn write_references(out: &mut impl Write, references: &[Reference]) -> io::Result<()> {
    writeln!(out, "References:")?;
    for reference in references {
        writeln!(
            out,
            "  [{}] {} ({}, {}, score {:.2})",
            reference.id,
            reference.title,
            reference.gene_label(),
            reference.kind,
            reference.score
        )?;
        if !reference.citations.is_empty() {
            writeln!(out, "        {}", reference.citations.join("; "))?;
        }
    }
    writeln!(out)
}

impl<W: Write, E: Write> RenderSink for ConsoleSink<W, E> {
    fn reset(&mut self) {}

    fn reveal_references(&mut self, references: Vec<Reference>) {
        let result = write_references(&mut self.out, &references);
        self.record(result);
    }

    fn begin_streaming(&mut self) {}

    fn append_text(&mut self, fragment: &str) {
        let result = self
            .out
            .write_all(fragment.as_bytes())
            .and_then(|()| self.out.flush());
        self.record(result);
    }

    fn end_streaming(&mut self) {
        let result = writeln!(self.out);
        self.record(result);
    }

    fn finalize_with_citations(&mut self, text: CitedText) {
        let mut cited: Vec<&str> = Vec::new();
        for id in text.citation_ids() {
            if !cited.contains(&id) {
                cited.push(id);
            }
        }
        if cited.is_empty() {
            return;
        }
        let result = writeln!(self.out, "\nCited: {}", cited.join(", "));
        self.record(result);
    }

    fn show_error(&mut self, message: &str) {
        let result = writeln!(self.err, "error: {message}");
        self.record(result);
    }
}
