//! Polling pattern waiter.
//!
//! The channel carries no framing, so "the device is done" can only be
//! inferred by matching accumulated output against a regex, bounded by a
//! wall-clock timeout, while watching for the stream to die.

use std::time::Duration;

use log::{debug, error, trace};
use tokio::time::Instant;

use super::Channel;
use super::buffer::Accumulator;
use super::patterns::PatternSpec;
use crate::error::{ChannelError, Result};

/// Result of one wait. Callers must handle all three outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogOutcome {
    /// The pattern matched. Holds everything read, including bytes after
    /// the match point.
    Matched(String),

    /// Time ran out with the channel still open.
    Timeout { output: String, waited: Duration },

    /// The channel closed mid-wait.
    SessionDown { output: String, waited: Duration },
}

impl DialogOutcome {
    /// Matched text, if any.
    pub fn matched(&self) -> Option<&str> {
        match self {
            DialogOutcome::Matched(text) => Some(text),
            _ => None,
        }
    }

    /// Whatever was accumulated, regardless of outcome.
    pub fn output(&self) -> &str {
        match self {
            DialogOutcome::Matched(output)
            | DialogOutcome::Timeout { output, .. }
            | DialogOutcome::SessionDown { output, .. } => output,
        }
    }

    /// Translate into the error vocabulary every caller uses.
    ///
    /// `context` names what the caller was doing, e.g. "sending commit command".
    pub fn into_result(self, pattern: &PatternSpec, context: &str) -> Result<String> {
        match self {
            DialogOutcome::Matched(output) => Ok(output),
            DialogOutcome::Timeout { output, waited } => {
                error!(
                    "pattern not found while {} after {:?}: {:?}",
                    context,
                    waited,
                    pattern.as_str()
                );
                Err(ChannelError::PatternNotFound {
                    context: context.to_string(),
                    pattern: pattern.as_str().to_string(),
                    output,
                    waited,
                }
                .into())
            }
            DialogOutcome::SessionDown { .. } => {
                error!("session went down while {}", context);
                Err(ChannelError::SessionDown {
                    context: context.to_string(),
                }
                .into())
            }
        }
    }
}

/// Reads a channel until a pattern matches, time runs out, or it closes.
#[derive(Debug, Clone, Copy)]
pub struct PatternWaiter {
    loop_delay: Duration,
    strip_ansi: bool,
}

impl PatternWaiter {
    /// Create a waiter polling every `loop_delay`.
    pub fn new(loop_delay: Duration, strip_ansi: bool) -> Self {
        Self {
            loop_delay,
            strip_ansi,
        }
    }

    /// Get the poll interval.
    pub fn loop_delay(&self) -> Duration {
        self.loop_delay
    }

    /// Wait for `pattern` to appear in the accumulated output.
    ///
    /// The returned text is not truncated at the match: anything already
    /// read past it stays in the result.
    pub async fn wait_for<C: Channel + ?Sized>(
        &self,
        channel: &mut C,
        pattern: &PatternSpec,
        timeout: Duration,
    ) -> DialogOutcome {
        let start = Instant::now();
        let mut acc = Accumulator::new(self.strip_ansi);

        debug!(
            "waiting for pattern {:?} (timeout {:?})",
            pattern.as_str(),
            timeout
        );

        loop {
            let waited = start.elapsed();
            if channel.is_closed() {
                return DialogOutcome::SessionDown {
                    output: acc.into_string(),
                    waited,
                };
            }
            if waited >= timeout {
                return DialogOutcome::Timeout {
                    output: acc.into_string(),
                    waited,
                };
            }

            let data = channel.read();
            if data.is_empty() {
                trace!("pattern not found, waited {:?}", waited);
                tokio::time::sleep(self.loop_delay).await;
                continue;
            }

            acc.extend(&data);
            if channel.is_closed() {
                return DialogOutcome::SessionDown {
                    output: acc.into_string(),
                    waited: start.elapsed(),
                };
            }
            if acc.is_match(pattern) {
                debug!("pattern found after {:?}", start.elapsed());
                return DialogOutcome::Matched(acc.into_string());
            }
        }
    }
}

impl Default for PatternWaiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedChannel;

    #[tokio::test(start_paused = true)]
    async fn test_matched_keeps_trailing_bytes() {
        let mut channel = ScriptedChannel::new();
        channel.push_output("RP/0/RP0/CPU0:R1(config)#\nextra");
        let waiter = PatternWaiter::default();
        let pattern = PatternSpec::new(r"\)#").unwrap();

        let outcome = waiter
            .wait_for(&mut channel, &pattern, Duration::from_secs(5))
            .await;
        assert_eq!(
            outcome,
            DialogOutcome::Matched("RP/0/RP0/CPU0:R1(config)#\nextra".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_across_chunks() {
        let mut channel = ScriptedChannel::new();
        channel.push_output("Rout");
        channel.push_output("er#");
        let waiter = PatternWaiter::default();
        let pattern = PatternSpec::new("Router#").unwrap();

        let outcome = waiter
            .wait_for(&mut channel, &pattern, Duration::from_secs(5))
            .await;
        assert_eq!(outcome.matched(), Some("Router#"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_bounds() {
        let loop_delay = Duration::from_millis(100);
        for secs in [1u64, 3, 7] {
            let timeout = Duration::from_millis(secs * 1000 + 37);
            let mut channel = ScriptedChannel::new();
            let waiter = PatternWaiter::new(loop_delay, true);
            let pattern = PatternSpec::new("never").unwrap();

            let start = Instant::now();
            let outcome = waiter.wait_for(&mut channel, &pattern, timeout).await;
            let elapsed = start.elapsed();

            assert!(matches!(outcome, DialogOutcome::Timeout { .. }));
            assert!(elapsed >= timeout, "returned early: {elapsed:?}");
            assert!(elapsed <= timeout + loop_delay, "returned late: {elapsed:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_wins_over_match() {
        let mut channel = ScriptedChannel::new();
        channel.push_output("Router#");
        channel.close_after_reads(1);
        let waiter = PatternWaiter::default();
        let pattern = PatternSpec::new("Router#").unwrap();

        let outcome = waiter
            .wait_for(&mut channel, &pattern, Duration::from_secs(5))
            .await;
        assert!(matches!(outcome, DialogOutcome::SessionDown { .. }));
        assert_eq!(outcome.output(), "Router#");
    }

    #[tokio::test(start_paused = true)]
    async fn test_into_result_errors() {
        let pattern = PatternSpec::new("#").unwrap();
        let timeout = DialogOutcome::Timeout {
            output: "partial".into(),
            waited: Duration::from_secs(2),
        };
        let err = timeout.into_result(&pattern, "checking config mode").unwrap_err();
        assert!(err.is_pattern_not_found());
        assert!(err.to_string().contains("partial"));

        let down = DialogOutcome::SessionDown {
            output: String::new(),
            waited: Duration::ZERO,
        };
        assert!(down.into_result(&pattern, "x").unwrap_err().is_session_down());
    }
}
