//! Frame extraction from a chunked event stream.
//!
//! The response body arrives in chunks cut at arbitrary byte offsets. The
//! extractor owns the only accumulation buffer: each chunk is appended, every
//! complete frame is drained in arrival order, and at most one partial frame is
//! carried over to the next chunk.

/// Literal prefix of the line that carries a frame's payload.
pub const PAYLOAD_PREFIX: &str = "data: ";

/// Blank-line separator between frames.
pub const FRAME_SEPARATOR: &str = "\n\n";

/// One complete, separator-delimited unit of the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(String);

impl Frame {
    /// Wrap raw frame text (without its trailing separator).
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The raw frame text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The payload text of the first `data: ` line, prefix stripped.
    ///
    /// Returns `None` for frames without a payload line; such frames produce
    /// no message.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.0
            .lines()
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .find_map(|line| line.strip_prefix(PAYLOAD_PREFIX))
    }
}

/// Split `buffer` into its complete frames and the trailing remainder.
///
/// All segments before the last separator are complete frames, returned in
/// order. The remainder (possibly empty) is the partial frame still waiting for
/// its separator.
#[must_use]
pub fn split_frames(buffer: &str) -> (Vec<&str>, &str) {
    let mut frames = Vec::new();
    let mut rest = buffer;
    while let Some(pos) = rest.find(FRAME_SEPARATOR) {
        frames.push(&rest[..pos]);
        rest = &rest[pos + FRAME_SEPARATOR.len()..];
    }
    (frames, rest)
}

/// Pure extraction step: `(buffer, chunk) -> (complete frames, new buffer)`.
#[must_use]
pub fn extract_frames(buffer: &str, chunk: &str) -> (Vec<Frame>, String) {
    let mut joined = String::with_capacity(buffer.len() + chunk.len());
    joined.push_str(buffer);
    joined.push_str(chunk);

    let (frames, rest) = split_frames(&joined);
    let frames = frames.into_iter().map(Frame::new).collect();
    (frames, rest.to_string())
}

/// Incremental UTF-8 decoder.
///
/// A multi-byte character cut by a chunk boundary is held back until the rest
/// of its bytes arrive. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    match err.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

/// Turns raw body chunks into complete frames.
#[derive(Debug, Default)]
pub struct FrameExtractor {
    buffer: String,
    decoder: Utf8Decoder,
}

impl FrameExtractor {
    /// Create an extractor with an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the frames it completed, in arrival order.
    pub fn feed(&mut self, chunk: impl AsRef<[u8]>) -> impl Iterator<Item = Frame> {
        let text = self.decoder.decode(chunk.as_ref());
        let (frames, rest) = extract_frames(&self.buffer, &text);
        self.buffer = rest;
        tracing::trace!(
            frames = frames.len(),
            buffered = self.buffer.len(),
            "Extracted frames from chunk"
        );
        frames.into_iter()
    }

    /// Resolve whatever is left once the stream has ended.
    ///
    /// A leftover that starts with the payload prefix is treated as one final,
    /// unterminated frame. Anything else is an incomplete fragment and is
    /// dropped. The buffer is empty afterwards, so a second call returns `None`.
    pub fn flush(&mut self) -> Option<Frame> {
        let tail = self.decoder.finish();
        self.buffer.push_str(&tail);
        let rest = std::mem::take(&mut self.buffer);

        if rest.starts_with(PAYLOAD_PREFIX) {
            Some(Frame(rest))
        } else {
            if !rest.is_empty() {
                tracing::debug!(bytes = rest.len(), "Dropping incomplete trailing fragment");
            }
            None
        }
    }

    /// Whether any partial data is waiting for more input.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || !self.decoder.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(frames: impl Iterator<Item = Frame>) -> Vec<String> {
        frames.map(|f| f.as_str().to_string()).collect()
    }

    // =========================================================================
    // Splitting
    // =========================================================================

    #[test]
    fn split_keeps_trailing_partial() {
        let (frames, rest) = split_frames("data: a\n\ndata: b\n\ndata: c");
        assert_eq!(frames, vec!["data: a", "data: b"]);
        assert_eq!(rest, "data: c");
    }

    #[test]
    fn split_complete_buffer_leaves_empty_rest() {
        let (frames, rest) = split_frames("data: a\n\n");
        assert_eq!(frames, vec!["data: a"]);
        assert_eq!(rest, "");
    }

    #[test]
    fn split_consecutive_separators_yield_empty_frame() {
        let (frames, rest) = split_frames("data: a\n\n\n\ndata: b");
        assert_eq!(frames, vec!["data: a", ""]);
        assert_eq!(rest, "data: b");
    }

    #[test]
    fn extract_is_pure() {
        let (frames, rest) = extract_frames("data: {\"x\"", ":1}\n\ndata: ");
        assert_eq!(frames, vec![Frame::new("data: {\"x\":1}")]);
        assert_eq!(rest, "data: ");
    }

    // =========================================================================
    // Payload Lines
    // =========================================================================

    #[test]
    fn payload_strips_prefix() {
        let frame = Frame::new("data: {\"type\":\"done\"}");
        assert_eq!(frame.payload(), Some("{\"type\":\"done\"}"));
    }

    #[test]
    fn payload_found_after_other_fields() {
        let frame = Frame::new("event: message\nid: 7\ndata: {}");
        assert_eq!(frame.payload(), Some("{}"));
    }

    #[test]
    fn payload_tolerates_crlf() {
        let frame = Frame::new("data: {}\r\nid: 1\r");
        assert_eq!(frame.payload(), Some("{}"));
    }

    #[test]
    fn frame_without_payload_line() {
        assert_eq!(Frame::new(": keep-alive").payload(), None);
        assert_eq!(Frame::new("data:{}").payload(), None);
        assert_eq!(Frame::new("").payload(), None);
    }

    // =========================================================================
    // Extractor
    // =========================================================================

    #[test]
    fn separator_split_across_chunks() {
        let mut extractor = FrameExtractor::new();
        assert!(texts(extractor.feed("data: a\n")).is_empty());
        assert_eq!(texts(extractor.feed("\ndata: b")), vec!["data: a"]);
        assert!(extractor.has_pending());
        assert_eq!(texts(extractor.feed("\n\n")), vec!["data: b"]);
        assert!(!extractor.has_pending());
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let text = "data: {\"type\":\"token\",\"data\":\"α-helix\"}\n\n".as_bytes();
        let alpha = text.iter().position(|&b| b == 0xCE).unwrap();

        let mut extractor = FrameExtractor::new();
        assert!(texts(extractor.feed(&text[..=alpha])).is_empty());
        assert_eq!(
            texts(extractor.feed(&text[alpha + 1..])),
            vec!["data: {\"type\":\"token\",\"data\":\"α-helix\"}"]
        );
    }

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        let mut extractor = FrameExtractor::new();
        let frames = texts(extractor.feed(b"data: \xFF\n\n"));
        assert_eq!(frames, vec!["data: \u{FFFD}"]);
    }

    #[test]
    fn flush_emits_unterminated_payload_frame() {
        let mut extractor = FrameExtractor::new();
        assert!(texts(extractor.feed("data: {\"type\":\"done\"}")).is_empty());
        assert_eq!(
            extractor.flush(),
            Some(Frame::new("data: {\"type\":\"done\"}"))
        );
        assert_eq!(extractor.flush(), None);
    }

    #[test]
    fn flush_drops_fragment_without_prefix() {
        let mut extractor = FrameExtractor::new();
        let _ = extractor.feed("dat").count();
        assert_eq!(extractor.flush(), None);
        assert!(!extractor.has_pending());
    }

    #[test]
    fn flush_on_empty_buffer_is_idempotent() {
        let mut extractor = FrameExtractor::new();
        assert_eq!(extractor.flush(), None);
        assert_eq!(extractor.flush(), None);
    }

    #[test]
    fn flush_decodes_incomplete_utf8_lossily() {
        let mut extractor = FrameExtractor::new();
        let _ = extractor.feed(b"data: \xCE").count();
        assert_eq!(extractor.flush(), Some(Frame::new("data: \u{FFFD}")));
    }
}
