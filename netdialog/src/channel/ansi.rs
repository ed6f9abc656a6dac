//! ANSI escape stripping on top of the `vte` parser.

use vte::{Parser, Perform};

/// Collects printable text and the few control bytes the dialogs care about.
///
/// Backspace is kept on purpose: echo-repaint correction keys off it.
#[derive(Debug, Default)]
pub(crate) struct TextCollector {
    pub(crate) text: String,
}

impl Perform for TextCollector {
    fn print(&mut self, c: char) {
        self.text.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' | b'\r' | b'\t' | 0x08 => self.text.push(byte as char),
            _ => {}
        }
    }
}

/// Stateful stripper; escape sequences may straddle reads.
pub(crate) struct AnsiStripper {
    parser: Parser,
    collector: TextCollector,
}

impl AnsiStripper {
    pub(crate) fn new() -> Self {
        Self {
            parser: Parser::new(),
            collector: TextCollector::default(),
        }
    }

    /// Feed raw bytes, returning the plain text they produced.
    pub(crate) fn feed(&mut self, data: &[u8]) -> String {
        self.parser.advance(&mut self.collector, data);
        std::mem::take(&mut self.collector.text)
    }
}

impl std::fmt::Debug for AnsiStripper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnsiStripper").finish_non_exhaustive()
    }
}

/// Strip ANSI escape codes from a complete string.
pub fn strip_ansi(input: &str) -> String {
    AnsiStripper::new().feed(input.as_bytes())
}
