//! Output accumulator with ANSI stripping and tail-anchored prompt search.
//!
//! Device output can be large (a full `show running-config`), but the prompt
//! only ever sits at the very end, so searches are limited to the last
//! `search_depth` bytes.

use std::ops::Range;

use bytes::{BufMut, Bytes, BytesMut};
use regex::bytes::Regex;

/// Buffer for accumulating device output and locating the trailing prompt.
pub struct PatternBuffer {
    buffer: BytesMut,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,

    /// Escape sequence state survives across reads, since a sequence can
    /// be split between two SSH packets.
    parser: vte::Parser,
}

/// Keeps printable characters and line control, drops everything else.
struct Printable<'a> {
    out: &'a mut BytesMut,
}

impl vte::Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out.put_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.put_u8(byte);
        }
    }
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

    /// Append raw channel data, stripping terminal escape sequences.
    pub fn extend(&mut self, data: &[u8]) {
        let mut sink = Printable {
            out: &mut self.buffer,
        };
        self.parser.advance(&mut sink, data);
    }

    /// Find `pattern` at the end of the buffer.
    ///
    /// Only the last `search_depth` bytes are searched, and a match counts
    /// only if nothing but whitespace follows it. Returns the byte range of
    /// the match within the whole buffer.
    pub fn find_trailing(&self, pattern: &Regex) -> Option<Range<usize>> {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        let tail = &self.buffer[start..];
        let m = pattern.find_iter(tail).last()?;

        if tail[m.end()..].iter().all(u8::is_ascii_whitespace) {
            Some(start + m.start()..start + m.end())
        } else {
            None
        }
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop any pending output.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}
