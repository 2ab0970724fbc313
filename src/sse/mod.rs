//! SSE line buffering and classification.
//!
//! The upstream body arrives as arbitrary byte chunks; an SSE event may be
//! split across two reads or several events may land in one. [`LineBuffer`]
//! re-frames the bytes into complete lines, and [`classify_line`] turns each
//! line into an explicit outcome so callers never have to suppress parse
//! errors ad hoc.

use crate::upstream::ChatChunk;

/// Buffers raw bytes and yields complete newline-terminated lines, carrying
/// any partial trailing line to the next push.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw chunk, returning every complete line it closes.
    /// Lines are trimmed; the unterminated remainder stays buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));

        let mut lines = Vec::new();
        while let Some(line_end) = self.buf.find('\n') {
            let line = self.buf[..line_end].trim().to_string();
            self.buf = self.buf[line_end + 1..].to_string();
            lines.push(line);
        }
        lines
    }
}

/// Outcome of classifying one complete SSE line.
#[derive(Debug)]
pub enum LineOutcome {
    /// A parsed upstream chunk.
    Event(ChatChunk),
    /// Blank line, comment, non-data field, or unparseable payload.
    /// Ignored; the stream keeps going.
    Skip,
    /// The upstream signalled `[DONE]`.
    EndOfStream,
}

/// Classify one SSE line. Keep-alive comments (`: ...`), blank separators,
/// and malformed `data:` payloads must never abort the stream, so they all
/// map to [`LineOutcome::Skip`].
pub fn classify_line(line: &str) -> LineOutcome {
    if line.is_empty() || line.starts_with(':') {
        return LineOutcome::Skip;
    }
    let Some(data) = line.strip_prefix("data: ") else {
        return LineOutcome::Skip;
    };
    if data == "[DONE]" {
        return LineOutcome::EndOfStream;
    }
    match serde_json::from_str::<ChatChunk>(data) {
        Ok(chunk) => LineOutcome::Event(chunk),
        Err(_) => LineOutcome::Skip,
    }
}
