//! Append-only character buffer with a read cursor.
//!
//! Positions are byte offsets into the buffered text. Every operation clamps
//! its input into range and snaps it forward onto a UTF-8 character
//! boundary, so no call can panic on out-of-range input.

/// Growable text buffer with a forward-moving cursor.
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    buffer: String,
    pos: usize,
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly arrived text.
    pub fn append(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// The character under the cursor, if any.
    pub fn peek(&self) -> Option<char> {
        self.buffer[self.pos..].chars().next()
    }

    /// Move past the character under the cursor.
    pub fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    /// Move the cursor forward by `n` bytes, clamped to the buffer end.
    pub fn advance_by(&mut self, n: usize) {
        self.pos = self.snap(self.pos.saturating_add(n));
    }

    pub fn has_more_chars(&self) -> bool {
        self.pos < self.buffer.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor to `pos`, clamped into `[0, len]`.
    ///
    /// This is the only way the cursor moves backwards; the state machine
    /// uses it to hand back bytes a delimiter search over-consumed.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = self.snap(pos);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Unconsumed text from the cursor to the end of the buffer.
    pub fn remaining(&self) -> &str {
        &self.buffer[self.pos..]
    }

    /// Text between `start` and `end` (or the buffer end), both clamped.
    pub fn substring(&self, start: usize, end: Option<usize>) -> &str {
        let start = self.snap(start);
        let end = self.snap(end.unwrap_or(self.buffer.len())).max(start);
        &self.buffer[start..end]
    }

    /// Absolute offset of the first `needle` at or after `from` (default: the cursor).
    pub fn find(&self, needle: &str, from: Option<usize>) -> Option<usize> {
        let from = self.snap(from.unwrap_or(self.pos));
        self.buffer[from..].find(needle).map(|i| from + i)
    }

    /// Advance by `n` bytes and return the text passed over.
    pub fn consume(&mut self, n: usize) -> String {
        let start = self.pos;
        self.advance_by(n);
        self.buffer[start..self.pos].to_string()
    }

    /// Consume everything up to the end of the buffer.
    pub fn consume_remaining(&mut self) -> String {
        let text = self.buffer[self.pos..].to_string();
        self.pos = self.buffer.len();
        text
    }

    /// Discard the consumed prefix once it reaches `min_prefix` bytes.
    ///
    /// Returns the number of bytes discarded. Unconsumed text is never
    /// touched, so absolute positions held across a compaction are invalid;
    /// callers only compact between state-machine runs.
    pub fn compact(&mut self, min_prefix: usize) -> usize {
        if self.pos == 0 || self.pos < min_prefix {
            return 0;
        }
        let discarded = self.pos;
        self.buffer.drain(..discarded);
        self.pos = 0;
        discarded
    }

    /// Clamp to the buffer and round up to the next char boundary.
    fn snap(&self, pos: usize) -> usize {
        let mut pos = pos.min(self.buffer.len());
        while !self.buffer.is_char_boundary(pos) {
            pos += 1;
        }
        pos
    }
}
