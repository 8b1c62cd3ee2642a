//! Citation markup for finished answers.
//!
//! The model cites retrieved documents inline as `[DOC-001]`. Once the answer
//! is complete it is split into plain text and citation segments so a sink can
//! style the markers. The stored answer text itself is never modified.

use std::sync::LazyLock;

use regex::Regex;

/// `[DOC-<digits>]`, capturing the id inside the brackets.
static CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(DOC-\d+)\]").expect("CITATION_RE regex pattern is valid"));

/// One piece of a marked-up answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Unmarked answer text.
    Text(String),
    /// A citation marker; holds the document id without brackets.
    Citation(String),
}

/// An answer split into text and citation segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitedText {
    segments: Vec<Segment>,
}

impl CitedText {
    /// The segments in reading order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Document ids cited, in order of appearance (repeats included).
    pub fn citation_ids(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Citation(id) => Some(id.as_str()),
            Segment::Text(_) => None,
        })
    }

    /// Reassemble the original answer text.
    #[must_use]
    pub fn to_plain(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => text.clone(),
                Segment::Citation(id) => format!("[{id}]"),
            })
            .collect()
    }
}

/// Mark every `[DOC-<digits>]` occurrence in `answer` as a citation segment.
#[must_use]
pub fn mark_citations(answer: &str) -> CitedText {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in CITATION_RE.captures_iter(answer) {
        let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Text(answer[last..whole.start()].to_string()));
        }
        segments.push(Segment::Citation(id.as_str().to_string()));
        last = whole.end();
    }

    if last < answer.len() {
        segments.push(Segment::Text(answer[last..].to_string()));
    }

    CitedText { segments }
}
