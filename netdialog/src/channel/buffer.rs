//! Output accumulator for a single wait operation.
//!
//! Reads arrive as arbitrary byte chunks. The accumulator turns them into
//! text, optionally stripping ANSI escape codes, and keeps everything it
//! has seen so far so patterns can be tested against the whole output.

use super::ansi::AnsiStripper;
use super::patterns::PatternSpec;

/// Growing text buffer built from successive channel reads.
///
/// Usually scoped to one call: create it when a wait starts, hand its
/// contents back when the wait ends. Cleared after every chunk, it also
/// serves as a streaming decoder.
#[derive(Debug)]
pub struct Accumulator {
    text: String,

    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,

    /// Present when ANSI stripping is enabled.
    stripper: Option<AnsiStripper>,
}

impl Accumulator {
    /// Create an accumulator, stripping ANSI escape codes if asked to.
    pub fn new(strip_ansi: bool) -> Self {
        Self {
            text: String::with_capacity(4096),
            pending: Vec::new(),
            stripper: strip_ansi.then(AnsiStripper::new),
        }
    }

    /// Append a raw chunk, returning the text it contributed.
    pub fn extend(&mut self, data: &[u8]) -> String {
        let decoded = match self.stripper.as_mut() {
            Some(stripper) => stripper.feed(data),
            None => self.decode(data),
        };
        self.text.push_str(&decoded);
        decoded
    }

    /// Lossy UTF-8 decoding that holds back a split trailing sequence.
    fn decode(&mut self, data: &[u8]) -> String {
        self.pending.extend_from_slice(data);
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let rest = self.pending.split_off(valid_up_to);
        let complete = std::mem::replace(&mut self.pending, rest);
        String::from_utf8_lossy(&complete).into_owned()
    }

    /// Test the whole accumulated text against a pattern.
    pub fn is_match(&self, pattern: &PatternSpec) -> bool {
        pattern.is_match(&self.text)
    }

    /// Replace the accumulated text (used by output corrections).
    pub fn replace(&mut self, text: String) {
        self.text = text;
    }

    /// Get the accumulated text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Drop the accumulated text, keeping any partial sequence.
    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Take ownership of the text and reset.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }

    /// Consume the accumulator.
    pub fn into_string(self) -> String {
        self.text
    }

    /// Get the current text length in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Check if nothing has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new(true)
    }
}
