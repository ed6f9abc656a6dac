//! Command execution.

use std::borrow::Cow;
use std::time::Duration;

use log::{debug, info};
use tokio::time::Instant;

use super::legacy::LegacyTiming;
use super::response::Response;
use super::sanitize::{normalize_linefeeds, repaint_correction, strip_command, strip_prompt};
use super::session::Session;
use crate::channel::{Accumulator, Channel, PatternSpec};
use crate::error::{ChannelError, Result};

/// Banner printed before a slow commit; the device wants a return to go on.
pub const LARGE_CONFIG_BANNER: &str = "This could be a few minutes if your config is large";

/// Per-command options.
#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// Completion pattern; defaults to the detected prompt.
    pub expect: Option<PatternSpec>,

    /// Detect the prompt before sending. When off, the base prompt is used.
    pub auto_find_prompt: bool,

    pub strip_prompt: bool,
    pub strip_command: bool,

    /// Send exactly one trailing return.
    pub normalize: bool,

    /// Overrides the session read timeout.
    pub read_timeout: Option<Duration>,

    /// Legacy timing, used only when `read_timeout` is unset.
    pub legacy: Option<LegacyTiming>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            expect: None,
            auto_find_prompt: true,
            strip_prompt: true,
            strip_command: true,
            normalize: true,
            read_timeout: None,
            legacy: None,
        }
    }
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for `pattern` instead of the prompt.
    pub fn expect(mut self, pattern: PatternSpec) -> Self {
        self.expect = Some(pattern);
        self
    }

    pub fn auto_find_prompt(mut self, enabled: bool) -> Self {
        self.auto_find_prompt = enabled;
        self
    }

    /// Keep both the command echo and the trailing prompt.
    pub fn raw(mut self) -> Self {
        self.strip_prompt = false;
        self.strip_command = false;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn legacy(mut self, timing: LegacyTiming) -> Self {
        self.legacy = Some(timing);
        self
    }
}

impl<C: Channel> Session<C> {
    /// Send a command and wait for the prompt.
    pub async fn send_command(&mut self, command: &str) -> Result<Response> {
        self.send_command_with(command, CommandOptions::default())
            .await
    }

    /// Send a command and wait for its completion pattern.
    ///
    /// A timeout always raises `PatternNotFound` carrying the partial
    /// output; a closed channel raises `SessionDown`.
    pub async fn send_command_with(
        &mut self,
        command: &str,
        options: CommandOptions,
    ) -> Result<Response> {
        let start = Instant::now();
        let timeout = match (options.read_timeout, options.legacy) {
            (Some(timeout), _) => timeout,
            (None, Some(legacy)) => legacy.to_timeout(self.settings().legacy_timeout),
            (None, None) => self.settings().read_timeout,
        };

        let search = match options.expect.clone() {
            Some(pattern) => pattern,
            None => {
                let prompt = if options.auto_find_prompt {
                    self.find_prompt().await?
                } else {
                    self.base_prompt().to_string()
                };
                PatternSpec::literal(prompt.trim()).map_err(ChannelError::InvalidPattern)?
            }
        };
        let repaint = PatternSpec::with_flags(&format!("{}.*$", search.as_str()), search.flags())
            .map_err(ChannelError::InvalidPattern)?;

        let to_send = if options.normalize {
            self.normalize_cmd(command)
        } else {
            command.to_string()
        };

        debug!("send_command: {:?} expecting {:?}", command.trim(), search.as_str());
        self.clear_buffer();
        self.write_channel(&to_send)?;

        let loop_delay = self.settings().loop_delay;
        let mut acc = Accumulator::new(self.settings().strip_ansi);
        // Start of output not yet checked for the large-config banner.
        let mut banner_from = 0;
        loop {
            if self.is_closed() {
                return Err(ChannelError::SessionDown {
                    context: "checking for prompt after sending command".into(),
                }
                .into());
            }
            let waited = start.elapsed();
            if waited >= timeout {
                return Err(ChannelError::PatternNotFound {
                    context: "checking for prompt after sending command".into(),
                    pattern: search.as_str().to_string(),
                    output: acc.into_string(),
                    waited,
                }
                .into());
            }

            let data = self.channel_mut().read();
            if data.is_empty() {
                tokio::time::sleep(loop_delay).await;
                continue;
            }
            acc.extend(&data);

            let repainted = match repaint_correction(acc.as_str(), &repaint) {
                Cow::Owned(fixed) => Some(fixed),
                Cow::Borrowed(_) => None,
            };
            if let Some(fixed) = repainted {
                banner_from = banner_from.min(fixed.len());
                acc.replace(fixed);
            }
            if acc.is_match(&search) {
                break;
            }

            let unchecked = acc.as_str().get(banner_from..).unwrap_or_default();
            if unchecked.contains(LARGE_CONFIG_BANNER) {
                info!("device asked for a return before continuing");
                let continued = Box::pin(self.send_command_with(
                    "\n",
                    CommandOptions::new()
                        .auto_find_prompt(false)
                        .raw()
                        .read_timeout(timeout.saturating_sub(start.elapsed())),
                ))
                .await?;
                // The continuation replaces everything read so far.
                let mut text = continued.raw_result;
                text.push_str(&self.read_channel());
                banner_from = text.len();
                acc.replace(text);
                if acc.is_match(&search) {
                    break;
                }
            }
        }

        let raw = acc.into_string();
        let mut result = normalize_linefeeds(&raw);
        if options.strip_command {
            result = strip_command(command, &result);
        }
        if options.strip_prompt {
            result = strip_prompt(self.base_prompt(), &result);
        }

        Ok(Response::new(
            command.trim(),
            result,
            raw,
            search.as_str(),
            start.elapsed(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedChannel;
    use crate::platform::Platform;

    async fn ready_session(channel: ScriptedChannel) -> Session<ScriptedChannel> {
        let mut session = Session::new(channel.reply("", "\r\nRP/0/RP0/CPU0:R1#"), Platform::CiscoXr);
        session.set_base_prompt().await.unwrap();
        session
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_command_strips_echo_and_prompt() {
        let mut session = ready_session(ScriptedChannel::new().reply_chunks(
            "show clock",
            &["show clock\r\n", "Mon Jan  1 00:00:00.000 UTC\r\n", "RP/0/RP0/CPU0:R1#"],
        ))
        .await;

        let response = session.send_command("show clock").await.unwrap();
        assert_eq!(response.result, "Mon Jan  1 00:00:00.000 UTC");
        assert!(response.contains("UTC"));
        assert_eq!(response.lines().count(), 1);
        assert!(response.raw_result.ends_with("RP/0/RP0/CPU0:R1#"));
        assert_eq!(response.pattern, regex::escape("RP/0/RP0/CPU0:R1#"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expect_pattern_skips_prompt_detection() {
        let mut session = ready_session(
            ScriptedChannel::new().reply("reload", "reload\r\nProceed with reload? [confirm]"),
        )
        .await;

        let options = CommandOptions::new().expect(PatternSpec::new(r"\[confirm\]").unwrap());
        let response = session.send_command_with("reload", options).await.unwrap();
        assert!(response.result.contains("Proceed with reload?"));
        // Only the base prompt detection wrote a bare return.
        assert_eq!(session.channel().written_lines(), vec!["", "reload"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_raises_pattern_not_found() {
        let mut session =
            ready_session(ScriptedChannel::new().reply("show tech", "show tech\r\npartial")).await;

        let options = CommandOptions::new()
            .auto_find_prompt(false)
            .read_timeout(Duration::from_secs(2));
        let err = session.send_command_with("show tech", options).await.unwrap_err();
        assert!(err.is_pattern_not_found());
        assert!(err.to_string().contains("partial"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_mid_command_is_session_down() {
        let mut session = ready_session(ScriptedChannel::new().closing_on("reload")).await;
        let err = session
            .send_command_with("reload", CommandOptions::new().auto_find_prompt(false))
            .await
            .unwrap_err();
        assert!(err.is_session_down());
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_config_banner_sends_return() {
        let mut session = ready_session(ScriptedChannel::new().reply(
            "commit",
            "commit\r\nThis could be a few minutes if your config is large. Confirm? [y/n][confirm]",
        ))
        .await;
        // The return answering the banner gets the prompt.
        let options = CommandOptions::new().auto_find_prompt(false);
        let response = session.send_command_with("commit", options).await.unwrap();

        assert_eq!(session.channel().written_lines(), vec!["", "commit", ""]);
        assert!(!response.raw_result.contains(LARGE_CONFIG_BANNER));
        assert_eq!(response.raw_result, "\r\nRP/0/RP0/CPU0:R1#");
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuation_output_shrunk_by_repaint() {
        let channel = ScriptedChannel::new()
            .reply(
                "commit",
                "commit\r\nThis could be a few minutes if your config is large. [confirm]",
            )
            .reply_chunks_once(
                "",
                &[
                    "RP/0/RP0/CPU0:R1#",
                    " ",
                    "\x08 done",
                    "\r\nRP/0/RP0/CPU0:R1# done",
                ],
            );
        let mut session = Session::new(channel, Platform::CiscoXr);
        session.set_base_prompt_text("RP/0/RP0/CPU0:R1".into());

        // The repaint cuts the output below the point already scanned for
        // the banner.
        let options = CommandOptions::new()
            .expect(PatternSpec::new(r"R1#.*done").unwrap())
            .read_timeout(Duration::from_secs(10));
        let response = session.send_command_with("commit", options).await.unwrap();

        assert_eq!(session.channel().written_lines(), vec!["commit", ""]);
        assert_eq!(response.raw_result, "RP/0/RP0/CPU0:\r\nRP/0/RP0/CPU0:R1# done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_echo_repaint_is_corrected() {
        let mut session = ready_session(ScriptedChannel::new().reply_chunks(
            "show running-config interface",
            &[
                "show running-config interface\x08\x08\x08RP/0/RP0/CPU0:R1#",
                "\r\ninterface Loopback0\r\nRP/0/RP0/CPU0:R1#",
            ],
        ))
        .await;

        let options = CommandOptions::new().auto_find_prompt(false);
        let response = session
            .send_command_with("show running-config interface", options)
            .await
            .unwrap();
        assert_eq!(response.result, "interface Loopback0");
        assert_eq!(response.lines().collect::<Vec<_>>(), vec!["interface Loopback0"]);
    }
}
