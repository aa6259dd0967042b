//! Line framing for worker pipes.
//!
//! Coordinator reads arrive in arbitrary chunks; the framer re-assembles
//! `\n`-terminated lines, strips `\r`, truncates over-long lines, and
//! carries the fragment after the last newline over to the next chunk.

use tracing::trace;

/// Maximum bytes of a single framed line; the remainder is dropped.
pub const MAX_LINE: usize = 8192;

/// Re-assembles a byte stream into lines across chunk boundaries.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
    truncating: bool,
}

impl LineFramer {
    /// A framer with an empty carry-over buffer.
    pub fn new() -> LineFramer {
        LineFramer::default()
    }

    /// Feed one chunk, invoking `emit` for each completed line.
    ///
    /// Emitted lines carry neither the terminating `\n` nor any `\r`.
    /// Invalid UTF-8 is replaced, not dropped.
    pub fn feed(&mut self, chunk: &[u8], mut emit: impl FnMut(&str)) {
        for &byte in chunk {
            if byte == b'\n' {
                let line = String::from_utf8_lossy(&self.buf);
                emit(&line);
                self.buf.clear();
                self.truncating = false;
            } else if byte != b'\r' {
                if self.buf.len() < MAX_LINE - 1 {
                    self.buf.push(byte);
                } else if !self.truncating {
                    trace!(limit = MAX_LINE, "line exceeds frame limit, truncating");
                    self.truncating = true;
                }
            }
        }
    }

    /// Take the unterminated trailing fragment, if any.
    ///
    /// Called once when a pipe reaches EOF so a final line without `\n`
    /// is not lost.
    pub fn take_partial(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        self.truncating = false;
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(framer: &mut LineFramer, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        framer.feed(chunk, |line| lines.push(line.to_string()));
        lines
    }

    #[test]
    fn splits_complete_lines() {
        let mut framer = LineFramer::new();
        let lines = collect(&mut framer, b"one\ntwo\nthree\n");
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[test]
    fn carries_fragment_across_chunks() {
        let mut framer = LineFramer::new();
        assert!(collect(&mut framer, b"@@TE").is_empty());
        let lines = collect(&mut framer, b"XT:hello\nrest");
        assert_eq!(lines, vec!["@@TEXT:hello"]);
        assert_eq!(framer.take_partial().as_deref(), Some("rest"));
        assert_eq!(framer.take_partial(), None);
    }

    #[test]
    fn strips_carriage_returns() {
        let mut framer = LineFramer::new();
        let lines = collect(&mut framer, b"one\r\ntwo\r\n");
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn truncates_over_long_lines_at_frame_boundary() {
        let mut framer = LineFramer::new();
        let long = vec![b'x'; MAX_LINE * 2];
        assert!(collect(&mut framer, &long).is_empty());
        let lines = collect(&mut framer, b"tail\nnext\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), MAX_LINE - 1, "first line capped at the frame limit");
        assert_eq!(lines[1], "next", "framing recovers after a truncated line");
    }

    #[test]
    fn empty_lines_are_emitted() {
        let mut framer = LineFramer::new();
        let lines = collect(&mut framer, b"\n\n");
        assert_eq!(lines, vec!["", ""]);
    }
}
