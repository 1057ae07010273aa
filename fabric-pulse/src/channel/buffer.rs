//! Pattern buffer with tail-search for prompt detection.
//!
//! Only the last `search_depth` bytes are searched for the prompt, so very
//! long outputs (a full running-config) stay cheap to scan. Terminal escape
//! sequences and carriage returns are dropped as data arrives.

use std::fmt;

use bytes::{Bytes, BytesMut};
use regex::bytes::Regex;

/// Accumulates channel output with ANSI escapes removed.
pub struct PatternBuffer {
    /// The accumulated output buffer.
    buffer: BytesMut,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,

    /// Escape-sequence parser; kept across chunks so split sequences are
    /// still recognised.
    parser: vte::Parser,
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            search_depth,
            parser: vte::Parser::new(),
        }
    }

    /// Extend the buffer with raw channel data.
    pub fn extend(&mut self, data: &[u8]) {
        let mut sink = Printable(&mut self.buffer);
        self.parser.advance(&mut sink, data);
    }

    /// Search the tail of the buffer for the pattern.
    pub fn search_tail(&self, pattern: &Regex) -> Option<regex::bytes::Match<'_>> {
        pattern.find(self.tail())
    }

    /// Check if the tail contains a pattern match.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        self.search_tail(pattern).is_some()
    }

    fn tail(&self) -> &[u8] {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        &self.buffer[start..]
    }

    /// Take the buffer contents and reset.
    pub fn take(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("len", &self.buffer.len())
            .field("search_depth", &self.search_depth)
            .finish()
    }
}

/// Keeps printable characters, newlines and tabs.
struct Printable<'a>(&'a mut BytesMut);

impl vte::Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        let mut encoded = [0u8; 4];
        self.0.extend_from_slice(c.encode_utf8(&mut encoded).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\t') {
            self.0.extend_from_slice(&[byte]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extend() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"Hello, world!");
        assert_eq!(buffer.as_slice(), b"Hello, world!");
    }

    #[test]
    fn test_ansi_and_carriage_returns_stripped() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"\x1b[32mGreen text\x1b[0m\r\nleaf1#");
        assert_eq!(buffer.as_slice(), b"Green text\nleaf1#");
    }

    #[test]
    fn test_escape_split_across_chunks() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"abc\x1b[3");
        buffer.extend(b"2mdef");
        assert_eq!(buffer.as_slice(), b"abcdef");
    }

    #[test]
    fn test_tail_search() {
        let mut buffer = PatternBuffer::new(20);
        buffer.extend(&[b'x'; 100]);
        buffer.extend(b"\nleaf1#");

        let pattern = Regex::new(r"leaf1#").unwrap();
        assert!(buffer.search_tail(&pattern).is_some());
    }

    #[test]
    fn test_tail_search_not_in_tail() {
        let mut buffer = PatternBuffer::new(10);
        buffer.extend(b"leaf1#");
        buffer.extend(&[b'x'; 100]);

        let pattern = Regex::new(r"leaf1#").unwrap();
        assert!(!buffer.tail_contains(&pattern));
    }

    #[test]
    fn test_take_clears_buffer() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"test data");
        assert_eq!(&buffer.take()[..], b"test data");
        assert!(buffer.is_empty());
    }
}
