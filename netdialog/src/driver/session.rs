//! Session state shared by every dialog.
//!
//! A [`Session`] owns its channel exclusively. Every operation takes
//! `&mut self`, so one logical conversation runs at a time; concurrency
//! happens a layer above, one session per device.

use std::fmt;
use std::time::Duration;

use log::{debug, info, trace, warn};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::channel::{Accumulator, Channel, PatternSpec, PatternWaiter};
use crate::error::{ChannelError, DriverError, Result};
use crate::platform::PlatformDefinition;
use crate::transport::SshChannel;

/// Bound for the config mode check made while closing.
const CLEANUP_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Timing and decoding knobs for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Default bound for every wait.
    pub read_timeout: Duration,

    /// Sleep between polls that produced no bytes.
    pub loop_delay: Duration,

    /// Strip ANSI escape codes from device output.
    pub strip_ansi: bool,

    /// Extra back-off after a transient banner, on top of `loop_delay`.
    pub transient_retry_delay: Duration,

    /// Line terminator written after commands.
    pub return_sequence: String,

    /// Base timeout that legacy `delay_factor`/`max_loops` values scale.
    pub legacy_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(1800),
            loop_delay: Duration::from_millis(100),
            strip_ansi: true,
            transient_retry_delay: Duration::from_secs(3),
            return_sequence: "\n".to_string(),
            legacy_timeout: Duration::from_secs(100),
        }
    }
}

/// Login credentials. The password is exposed only when written.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One interactive CLI conversation with a device.
pub struct Session<C: Channel = SshChannel> {
    channel: C,
    platform: PlatformDefinition,
    settings: SessionSettings,
    credentials: Option<Credentials>,
    host: String,

    /// Idle prompt minus its terminator; the default match anchor.
    base_prompt: String,

    /// Decoder for direct reads; escape and UTF-8 sequences may span reads.
    decoder: Accumulator,

    closed: bool,
}

impl<C: Channel> Session<C> {
    /// Create a session over an already-open channel.
    pub fn new(channel: C, platform: impl Into<PlatformDefinition>) -> Self {
        Self {
            channel,
            platform: platform.into(),
            settings: SessionSettings::default(),
            credentials: None,
            host: String::new(),
            base_prompt: String::new(),
            decoder: Accumulator::new(true),
            closed: false,
        }
    }

    /// Replace the session settings.
    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.decoder = Accumulator::new(settings.strip_ansi);
        self.settings = settings;
        self
    }

    /// Set the credentials used by console logins.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the host name used in log and error messages.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Get the stored base prompt.
    pub fn base_prompt(&self) -> &str {
        &self.base_prompt
    }

    pub(crate) fn set_base_prompt_text(&mut self, prompt: String) {
        debug!("base prompt set to {:?}", prompt);
        self.base_prompt = prompt;
    }

    /// Get the platform definition.
    pub fn platform(&self) -> &PlatformDefinition {
        &self.platform
    }

    /// Get the session settings.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Get the host this session talks to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get a reference to the channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Get a mutable reference to the channel.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Whether the session or its channel has closed.
    pub fn is_closed(&self) -> bool {
        self.closed || self.channel.is_closed()
    }

    pub(crate) fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub(crate) fn waiter(&self) -> PatternWaiter {
        PatternWaiter::new(self.settings.loop_delay, self.settings.strip_ansi)
    }

    /// Write text to the channel.
    pub fn write_channel(&mut self, text: &str) -> Result<()> {
        trace!("write: {:?}", text);
        self.write_raw(text)
    }

    /// Write a secret followed by `ending`, keeping it out of logs.
    pub(crate) fn write_secret_with(&mut self, secret: &SecretString, ending: &str) -> Result<()> {
        trace!("write: <redacted>");
        let line = format!("{}{}", secret.expose_secret(), ending);
        self.write_raw(&line)
    }

    fn write_raw(&mut self, text: &str) -> Result<()> {
        if self.is_closed() {
            return Err(ChannelError::SessionDown {
                context: "writing to the channel".into(),
            }
            .into());
        }
        self.channel.write(text.as_bytes()).inspect_err(|_| {
            self.closed = true;
        })
    }

    /// Write a line, terminated by the return sequence.
    pub(crate) fn write_line(&mut self, line: &str) -> Result<()> {
        let text = format!("{}{}", line, self.settings.return_sequence);
        self.write_channel(&text)
    }

    /// Send the bare return sequence.
    pub(crate) fn send_return(&mut self) -> Result<()> {
        let ret = self.settings.return_sequence.clone();
        self.write_channel(&ret)
    }

    /// Read whatever the channel has right now, decoded.
    pub fn read_channel(&mut self) -> String {
        let data = self.channel.read();
        if data.is_empty() {
            return String::new();
        }
        let text = self.decode(&data);
        trace!("read: {:?}", text);
        text
    }

    /// Decode a raw chunk read directly from the channel.
    pub(crate) fn decode(&mut self, data: &[u8]) -> String {
        let text = self.decoder.extend(data);
        self.decoder.clear();
        text
    }

    /// Drop anything the channel has buffered.
    pub fn clear_buffer(&mut self) {
        self.channel.clear_buffer();
        self.decoder = Accumulator::new(self.settings.strip_ansi);
    }

    /// Read until `pattern` matches.
    ///
    /// `timeout` defaults to the session read timeout. `context` names the
    /// operation in the error raised on timeout or session loss.
    pub async fn read_until_pattern(
        &mut self,
        pattern: &PatternSpec,
        timeout: Option<Duration>,
        context: &str,
    ) -> Result<String> {
        let timeout = timeout.unwrap_or(self.settings.read_timeout);
        let waiter = self.waiter();
        let outcome = waiter.wait_for(&mut self.channel, pattern, timeout).await;
        outcome.into_result(pattern, context)
    }

    /// Normalize a command to a single trailing return sequence.
    pub(crate) fn normalize_cmd(&self, command: &str) -> String {
        let mut cmd = command.trim_end().to_string();
        cmd.push_str(&self.settings.return_sequence);
        cmd
    }

    pub(crate) async fn settle(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }

    /// Sync on a prompt, set the base prompt and run the platform's
    /// on-open commands.
    ///
    /// A standby route processor stops after the base prompt: it accepts
    /// no further commands.
    pub async fn prepare(&mut self) -> Result<()> {
        let mut ready = PatternSpec::new(self.platform.prompt.ready_pattern())
            .map_err(ChannelError::InvalidPattern)?;
        if let Some(marker) = self.platform.prompt.standby_marker() {
            ready = ready
                .or(&regex::escape(marker))
                .map_err(ChannelError::InvalidPattern)?;
        }
        self.send_return()?;
        self.read_until_pattern(&ready, None, "waiting for the first prompt")
            .await?;

        let prompt = self.set_base_prompt().await?;
        if self.is_standby(&prompt) {
            warn!("{} is a standby node, skipping session preparation", self.host);
            return Ok(());
        }

        for command in self.platform.on_open_commands.clone() {
            debug!("on_open: {}", command);
            self.send_command_with(&command, super::CommandOptions::new().auto_find_prompt(false))
                .await?;
        }
        info!("session to {} prepared, base prompt {:?}", self.host, self.base_prompt);
        Ok(())
    }

    pub(crate) fn is_standby(&self, prompt: &str) -> bool {
        self.platform
            .prompt
            .standby_marker()
            .is_some_and(|marker| prompt.contains(marker))
    }

    /// Leave config mode if needed, send `exit_command`, then close.
    ///
    /// Failures while leaving config mode are logged and ignored.
    pub async fn cleanup(&mut self, exit_command: &str) -> Result<()> {
        match self.check_config_mode_within(Some(CLEANUP_CHECK_TIMEOUT)).await {
            Ok(true) => {
                if let Err(e) = self.exit_config_mode(None, None, false).await {
                    warn!("failed to exit config mode during cleanup: {}", e);
                }
            }
            Ok(false) => {}
            Err(e) => warn!("config mode check failed during cleanup: {}", e),
        }
        if !self.is_closed() {
            self.write_line(exit_command)?;
        }
        self.close();
        Ok(())
    }

    /// Close the channel. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            debug!("closing session to {}", self.host);
            self.channel.close();
            self.closed = true;
        }
    }

    pub(crate) fn auth_failure(&mut self, reason: impl Into<String>) -> crate::Error {
        let reason = reason.into();
        warn!("login to {} failed: {}", self.host, reason);
        self.close();
        DriverError::AuthenticationFailed {
            host: self.host.clone(),
            reason,
        }
        .into()
    }
}

impl<C: Channel> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("platform", &self.platform.name)
            .field("base_prompt", &self.base_prompt)
            .field("settings", &self.settings)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedChannel;
    use crate::platform::Platform;

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: SessionSettings =
            serde_json::from_str(r#"{"strip_ansi": false, "read_timeout": {"secs": 30, "nanos": 0}}"#)
                .unwrap();
        assert!(!settings.strip_ansi);
        assert_eq!(settings.read_timeout, Duration::from_secs(30));
        assert_eq!(settings.loop_delay, Duration::from_millis(100));
        assert_eq!(settings.return_sequence, "\n");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("admin", "hunter2");
        let shown = format!("{:?}", creds);
        assert!(shown.contains("admin"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_normalize_cmd() {
        let session = Session::new(ScriptedChannel::new(), Platform::CiscoXr);
        assert_eq!(session.normalize_cmd("show run  \r\n"), "show run\n");
        assert_eq!(session.normalize_cmd("\n"), "\n");
    }

    #[test]
    fn test_write_after_close_is_session_down() {
        let mut session = Session::new(ScriptedChannel::new(), Platform::CiscoXr);
        session.close();
        let err = session.write_channel("\n").unwrap_err();
        assert!(err.is_session_down());
    }

    #[test]
    fn test_failed_write_closes_session() {
        let mut session = Session::new(ScriptedChannel::new().failing_writes(), Platform::CiscoXr);
        let err = session.write_channel("show version\n").unwrap_err();
        assert!(err.is_session_down());
        assert!(session.is_closed());
        assert!(session.write_line("show version").unwrap_err().is_session_down());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_on_silent_device_is_bounded() {
        let mut session = Session::new(ScriptedChannel::new(), Platform::CiscoXr);

        let start = tokio::time::Instant::now();
        session.cleanup("exit").await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(60));
        assert!(session.is_closed());
        assert_eq!(session.channel().written_lines(), vec!["", "exit"]);
    }

    #[test]
    fn test_read_channel_keeps_split_escape() {
        let mut channel = ScriptedChannel::new();
        channel.push_output("\r\n\x1b[3");
        channel.push_output("2mRP/0/RP0/CPU0:R1#\x1b[0m");
        let mut session = Session::new(channel, Platform::CiscoXr);

        assert_eq!(session.read_channel(), "\r\n");
        assert_eq!(session.read_channel(), "RP/0/RP0/CPU0:R1#");
    }

    #[tokio::test(start_paused = true)]
    async fn test_prepare_runs_on_open_commands() {
        let channel = ScriptedChannel::new()
            .reply("", "\r\nRP/0/RP0/CPU0:R1#")
            .reply("terminal width 511", "terminal width 511\r\nRP/0/RP0/CPU0:R1#")
            .reply("terminal length 0", "terminal length 0\r\nRP/0/RP0/CPU0:R1#");
        let mut session = Session::new(channel, Platform::CiscoXr);

        session.prepare().await.unwrap();
        assert_eq!(session.base_prompt(), "RP/0/RP0/CPU0:R1");
        let written = session.channel().written_lines();
        assert!(written.contains(&"terminal width 511"));
        assert!(written.contains(&"terminal length 0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prepare_stops_on_standby() {
        let channel = ScriptedChannel::new()
            .reply("", "\r\nThis (D)RP Node is not ready or active for login /configuration");
        let mut session = Session::new(channel, Platform::CiscoXr);

        session.prepare().await.unwrap();
        assert!(session.base_prompt().contains("RP Node is not "));
        assert!(!session.channel().written_lines().contains(&"terminal length 0"));
    }
}
