//! Response buffer with escape stripping and tail-search optimization.
//!
//! Only the last `search_depth` bytes are searched for prompts and pager
//! markers, so long `show` outputs do not turn every read into a full scan.

use std::borrow::Cow;

use bytes::{Buf, BytesMut};
use regex::bytes::Regex;
use vte::{Parser, Perform};

/// Tracks a backspace-erase run (`\x08... ...\x08...`), which pagers use
/// to wipe their marker off the terminal line.
#[derive(Debug, Clone, Copy, Default)]
struct Erase {
    after_backspace: bool,
    spaces: usize,
}

/// Collects the printable text of a terminal stream.
///
/// Printable characters are kept, line structure (`\r`, `\n`, `\t`) is kept,
/// every escape sequence and every other control byte is dropped. Spaces
/// between two backspace runs are an erase and are dropped too.
struct Printable<'a> {
    out: &'a mut BytesMut,
    erase: &'a mut Erase,
}

impl Printable<'_> {
    /// Spaces that turned out not to be part of an erase are real output.
    fn flush_spaces(&mut self) {
        for _ in 0..self.erase.spaces {
            self.out.extend_from_slice(b" ");
        }
        *self.erase = Erase::default();
    }
}

impl Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        if c == ' ' && self.erase.after_backspace {
            self.erase.spaces += 1;
            return;
        }
        self.flush_spaces();
        let mut utf8 = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if byte == 0x08 {
            self.erase.spaces = 0;
            self.erase.after_backspace = true;
            return;
        }
        self.flush_spaces();
        if matches!(byte, b'\r' | b'\n' | b'\t') {
            self.out.extend_from_slice(&[byte]);
        }
    }
}

/// Strip ANSI/VT escape sequences and control bytes from a complete chunk.
pub fn strip_escapes(data: &[u8]) -> Vec<u8> {
    let mut out = BytesMut::with_capacity(data.len());
    let mut erase = Erase::default();
    let mut parser = Parser::new();
    parser.advance(
        &mut Printable {
            out: &mut out,
            erase: &mut erase,
        },
        data,
    );
    out.to_vec()
}

/// Buffer for accumulating device output and searching its tail.
///
/// The escape parser persists across [`extend`](Self::extend) calls, so a
/// color sequence split over two reads is still removed.
pub struct ResponseBuffer {
    /// The accumulated, stripped output.
    buffer: BytesMut,

    /// Escape-sequence parser state.
    parser: Parser,

    /// Backspace-erase state, also carried across reads.
    erase: Erase,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,
}

impl ResponseBuffer {
    /// Create a new buffer searching the last `search_depth` bytes.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            parser: Parser::new(),
            erase: Erase::default(),
            search_depth,
        }
    }

    /// Extend the buffer with raw device bytes, stripping escape codes.
    pub fn extend(&mut self, data: &[u8]) {
        self.parser.advance(
            &mut Printable {
                out: &mut self.buffer,
                erase: &mut self.erase,
            },
            data,
        );
    }

    /// Remove an echoed copy of `echo` from the head of the buffer.
    ///
    /// Any non-printable bytes right after the echo (the device's line
    /// break) are skipped too. Returns `false` and leaves the buffer alone
    /// when the head does not match.
    pub fn strip_echo(&mut self, echo: &str) -> bool {
        if echo.is_empty() || !self.buffer.starts_with(echo.as_bytes()) {
            return false;
        }

        let mut end = echo.len();
        while end < self.buffer.len() && matches!(self.buffer[end], b'\r' | b'\n' | b'\t') {
            end += 1;
        }
        self.buffer.advance(end);
        true
    }

    /// Search only the tail of the buffer for the pattern.
    ///
    /// Offsets of the returned match are relative to the start of the
    /// searched region, not the whole buffer.
    pub fn search_tail(&self, pattern: &Regex) -> Option<regex::bytes::Match<'_>> {
        pattern.find(self.tail())
    }

    /// Check if the tail contains a pattern match.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        self.search_tail(pattern).is_some()
    }

    /// Cut the buffer at the start of a tail match of `pattern`.
    ///
    /// Used to drop a pager marker before the next page arrives. The
    /// spaces padding the marker go with it.
    pub fn truncate_tail_match(&mut self, pattern: &Regex) -> bool {
        let offset = self.tail_offset();
        let Some(start) = self.search_tail(pattern).map(|m| m.start()) else {
            return false;
        };
        let mut end = offset + start;
        while end > 0 && self.buffer[end - 1] == b' ' {
            end -= 1;
        }
        self.buffer.truncate(end);
        true
    }

    /// The searched region as lossy UTF-8.
    pub fn tail_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.tail())
    }

    /// Take the buffer contents as a string and reset.
    pub fn take_string(&mut self) -> String {
        let data = self.buffer.split();
        String::from_utf8_lossy(&data).into_owned()
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and any half-parsed escape sequence.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.parser = Parser::new();
        self.erase = Erase::default();
    }

    fn tail_offset(&self) -> usize {
        self.buffer.len().saturating_sub(self.search_depth)
    }

    fn tail(&self) -> &[u8] {
        &self.buffer[self.tail_offset()..]
    }
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}
