//! Configuration mode transitions.

use std::time::Duration;

use log::{debug, info, warn};

use super::sanitize::normalize_linefeeds;
use super::session::Session;
use crate::channel::{Channel, PatternSpec};
use crate::error::{ChannelError, DriverError, Result};

/// How a platform shows and switches config mode.
#[derive(Debug, Clone)]
pub struct ConfigModeProfile {
    /// Text present in a config mode prompt, e.g. `)#`.
    pub check_string: String,

    /// Pattern read after a bare return when checking the mode.
    pub check_pattern: PatternSpec,

    /// Markers removed before testing for `check_string`, e.g. `(admin)`.
    pub ignore_markers: Vec<String>,

    pub enter_command: String,

    /// Characters of the base prompt anchoring the entry pattern.
    pub prompt_prefix_len: usize,

    /// Regex appended after `.*` to the escaped base prompt prefix.
    pub enter_suffix: String,

    pub exit_command: String,
    pub exit_pattern: PatternSpec,

    /// Marker of the "uncommitted changes" question on exit.
    pub uncommitted_marker: String,

    /// Reply discarding uncommitted changes.
    pub discard_reply: String,

    /// Pattern read after discarding.
    pub after_discard_pattern: PatternSpec,

    /// The config prompt, waited for after each config line and commit step.
    pub config_prompt: PatternSpec,
}

impl ConfigModeProfile {
    /// Entry pattern for a base prompt.
    pub fn enter_pattern(&self, base_prompt: &str) -> Result<PatternSpec> {
        let prefix: String = base_prompt.chars().take(self.prompt_prefix_len).collect();
        PatternSpec::new(&format!("{}.*{}", regex::escape(&prefix), self.enter_suffix))
            .map_err(|e| ChannelError::InvalidPattern(e).into())
    }

    /// Whether a mode-check read shows config mode.
    pub fn is_config_prompt(&self, output: &str) -> bool {
        let mut cleaned = output.to_string();
        for marker in &self.ignore_markers {
            cleaned = cleaned.replace(marker.as_str(), "");
        }
        cleaned.contains(&self.check_string)
    }
}

/// Options for [`Session::send_config_set`].
#[derive(Debug, Clone)]
pub struct ConfigSetOptions {
    /// Leave config mode after the last line. Leaving discards anything
    /// not yet committed, so this is off by default.
    pub exit_config_mode: bool,

    /// Overrides the platform's entry command.
    pub config_mode_command: Option<String>,

    /// Per-line wait bound; defaults to the session read timeout.
    pub read_timeout: Option<Duration>,
}

impl Default for ConfigSetOptions {
    fn default() -> Self {
        Self {
            exit_config_mode: false,
            config_mode_command: None,
            read_timeout: None,
        }
    }
}

impl<C: Channel> Session<C> {
    fn config_profile(&self) -> ConfigModeProfile {
        self.platform().prompt.config_mode().clone()
    }

    /// Check whether the device is in config mode.
    pub async fn check_config_mode(&mut self) -> Result<bool> {
        self.check_config_mode_within(None).await
    }

    pub(crate) async fn check_config_mode_within(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        let profile = self.config_profile();
        self.send_return()?;
        let output = self
            .read_until_pattern(&profile.check_pattern, timeout, "checking config mode")
            .await?;
        let in_config = profile.is_config_prompt(&output);
        debug!("config mode check: {}", in_config);
        Ok(in_config)
    }

    /// Enter config mode unless already there.
    ///
    /// `command` and `pattern` default to the platform's entry command and
    /// the base-prompt-anchored entry pattern.
    pub async fn config_mode(
        &mut self,
        command: Option<&str>,
        pattern: Option<PatternSpec>,
    ) -> Result<String> {
        let profile = self.config_profile();
        if self.check_config_mode().await? {
            return Ok(String::new());
        }

        let command = command.unwrap_or(profile.enter_command.as_str());
        let pattern = match pattern {
            Some(pattern) => pattern,
            None => profile.enter_pattern(self.base_prompt())?,
        };
        info!("entering config mode with {:?}", command);
        self.write_line(command)?;
        let output = self
            .read_until_pattern(&pattern, None, "entering config mode")
            .await?;

        if !self.check_config_mode().await? {
            warn!("still in exec mode after {:?}", command);
            return Err(DriverError::ConfigModeEnter.into());
        }
        Ok(output)
    }

    /// Leave config mode.
    ///
    /// Uncommitted changes are discarded. With `skip_check` the exit command
    /// is sent blindly and the result is not verified.
    pub async fn exit_config_mode(
        &mut self,
        command: Option<&str>,
        pattern: Option<PatternSpec>,
        skip_check: bool,
    ) -> Result<String> {
        let profile = self.config_profile();
        if !skip_check && !self.check_config_mode().await? {
            return Ok(String::new());
        }

        let command = command.unwrap_or(profile.exit_command.as_str());
        info!("exiting config mode with {:?}", command);
        self.write_line(command)?;
        let mut output = self
            .read_until_pattern(&profile.exit_pattern, None, "exiting config mode")
            .await?;

        if output.contains(&profile.uncommitted_marker) {
            warn!("discarding uncommitted changes");
            self.write_line(&profile.discard_reply)?;
            let more = self
                .read_until_pattern(
                    &profile.after_discard_pattern,
                    None,
                    "discarding uncommitted changes",
                )
                .await?;
            output.push_str(&more);
        }

        if let Some(pattern) = pattern
            && !pattern.is_match(&output)
        {
            let more = self
                .read_until_pattern(&pattern, None, "exiting config mode")
                .await?;
            output.push_str(&more);
        }

        if !skip_check && self.check_config_mode().await? {
            return Err(DriverError::ConfigModeExit.into());
        }
        Ok(output)
    }

    /// Enter config mode, send every line, and optionally leave again.
    ///
    /// The config prompt is awaited after each line.
    pub async fn send_config_set(
        &mut self,
        commands: &[&str],
        options: ConfigSetOptions,
    ) -> Result<String> {
        let profile = self.config_profile();
        let mut output = self
            .config_mode(options.config_mode_command.as_deref(), None)
            .await?;

        for line in commands.iter().flat_map(|c| c.lines()) {
            debug!("config line: {:?}", line);
            let cmd = self.normalize_cmd(line);
            self.write_channel(&cmd)?;
            let out = self
                .read_until_pattern(
                    &profile.config_prompt,
                    options.read_timeout,
                    "sending config line",
                )
                .await?;
            output.push_str(&out);
        }

        if options.exit_config_mode {
            let out = self.exit_config_mode(None, None, false).await?;
            output.push_str(&out);
        }
        Ok(normalize_linefeeds(&output))
    }
}
