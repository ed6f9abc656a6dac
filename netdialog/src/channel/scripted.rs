//! Scripted in-memory channel for driving dialogs without a device.
//!
//! Replies are keyed on what gets written: every write is trimmed of
//! surrounding `\r`/`\n` and compared against the reply rules in insertion
//! order. The first live rule whose trigger equals the written text queues
//! its chunks; each later `read()` hands back one chunk.
//!
//! ```rust
//! use netdialog::channel::{Channel, ScriptedChannel};
//!
//! let mut channel = ScriptedChannel::new()
//!     .reply_once("", "Last login: Mon Jan 1 from 10.0.0.1")
//!     .reply("", "\r\nRouter#");
//!
//! channel.write(b"\n").unwrap();
//! assert_eq!(channel.read(), b"Last login: Mon Jan 1 from 10.0.0.1");
//! channel.write(b"\n").unwrap();
//! assert_eq!(channel.read(), b"\r\nRouter#");
//! ```

use std::collections::VecDeque;

use log::trace;

use super::Channel;
use crate::error::{ChannelError, Result};

#[derive(Debug, Clone)]
struct ReplyRule {
    trigger: String,
    chunks: Vec<String>,
    /// `None` repeats forever.
    remaining: Option<usize>,
}

/// In-memory [`Channel`] that answers writes from a script.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    rules: Vec<ReplyRule>,
    pending: VecDeque<Vec<u8>>,
    written: Vec<String>,
    closed: bool,
    reads: usize,
    close_after_reads: Option<usize>,
    close_on_write: Option<String>,
    fail_writes: bool,
}

impl ScriptedChannel {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `output` every time `trigger` is written.
    pub fn reply(self, trigger: &str, output: &str) -> Self {
        self.rule(trigger, &[output], None)
    }

    /// Reply with `output` the first time `trigger` is written.
    pub fn reply_once(self, trigger: &str, output: &str) -> Self {
        self.rule(trigger, &[output], Some(1))
    }

    /// Reply with several chunks, one per read, every time `trigger` is written.
    pub fn reply_chunks(self, trigger: &str, chunks: &[&str]) -> Self {
        self.rule(trigger, chunks, None)
    }

    /// Reply with several chunks the first time `trigger` is written.
    pub fn reply_chunks_once(self, trigger: &str, chunks: &[&str]) -> Self {
        self.rule(trigger, chunks, Some(1))
    }

    fn rule(mut self, trigger: &str, chunks: &[&str], remaining: Option<usize>) -> Self {
        self.rules.push(ReplyRule {
            trigger: trigger.to_string(),
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            remaining,
        });
        self
    }

    /// Close the stream as soon as `trigger` is written.
    pub fn closing_on(mut self, trigger: &str) -> Self {
        self.close_on_write = Some(trigger.to_string());
        self
    }

    /// Make every write fail as if the socket broke.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Queue unsolicited output for the next read.
    pub fn push_output(&mut self, output: &str) {
        self.pending.push_back(output.as_bytes().to_vec());
    }

    /// Close the stream right after the `n`th read returns.
    pub fn close_after_reads(&mut self, n: usize) {
        self.close_after_reads = Some(self.reads + n);
    }

    /// Everything written so far, one entry per write.
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// Written entries with line endings trimmed, for easy assertions.
    pub fn written_lines(&self) -> Vec<&str> {
        self.written.iter().map(|w| trim_line(w)).collect()
    }
}

fn trim_line(text: &str) -> &str {
    text.trim_matches(|c| c == '\r' || c == '\n')
}

impl Channel for ScriptedChannel {
    fn read(&mut self) -> Vec<u8> {
        if self.closed {
            return Vec::new();
        }
        let Some(chunk) = self.pending.pop_front() else {
            return Vec::new();
        };
        self.reads += 1;
        if self.close_after_reads.is_some_and(|n| self.reads >= n) {
            self.closed = true;
        }
        chunk
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.closed || self.fail_writes {
            return Err(ChannelError::SessionDown {
                context: "writing to the channel".into(),
            }
            .into());
        }
        let text = String::from_utf8_lossy(data).into_owned();
        let key = trim_line(&text).to_string();
        trace!("scripted write: {:?}", text);
        self.written.push(text);

        if self.close_on_write.as_deref() == Some(key.as_str()) {
            self.closed = true;
            return Ok(());
        }

        if let Some(rule) = self
            .rules
            .iter_mut()
            .find(|r| r.trigger == key && r.remaining != Some(0))
        {
            if let Some(n) = rule.remaining.as_mut() {
                *n -= 1;
            }
            self.pending
                .extend(rule.chunks.iter().map(|c| c.as_bytes().to_vec()));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn clear_buffer(&mut self) {
        self.pending.clear();
    }

    fn close(&mut self) {
        self.closed = true;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_once_rules_take_precedence_until_spent() {
        let mut channel = ScriptedChannel::new()
            .reply_once("show clock", "first")
            .reply("show clock", "again");

        channel.write(b"show clock\n").unwrap();
        assert_eq!(channel.read(), b"first");
        channel.write(b"show clock\n").unwrap();
        assert_eq!(channel.read(), b"again");
        assert!(channel.read().is_empty());
    }

    #[test]
    fn test_chunks_one_per_read() {
        let mut channel = ScriptedChannel::new().reply_chunks("", &["a", "b"]);
        channel.write(b"\r\n").unwrap();
        assert_eq!(channel.read(), b"a");
        assert_eq!(channel.read(), b"b");
        assert_eq!(channel.written_lines(), vec![""]);
    }

    #[test]
    fn test_closed_channel_rejects_writes() {
        let mut channel = ScriptedChannel::new().closing_on("exit");
        channel.write(b"exit\n").unwrap();
        assert!(channel.is_closed());
        assert!(channel.write(b"\n").is_err());
    }
}
