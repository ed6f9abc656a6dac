//! Commit command construction and the commit dialog.
//!
//! A commit can end four ways: back at the config prompt, at a
//! confirmation sub-prompt, at a conflict question because another session
//! committed first, or with a "Failed to" report. The first two are driven
//! to completion here; the last two become `ConfigCommit` errors unless the
//! caller supplied a reply for the conflict question.

use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use super::command::CommandOptions;
use super::session::Session;
use crate::channel::{Channel, PatternSpec};
use crate::error::{ChannelError, DriverError, PlatformError, Result};

/// Options for one commit. Built per call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitRequest {
    /// Commit with automatic rollback unless confirmed.
    pub confirm: bool,

    /// Seconds before rollback; required with `confirm`.
    pub confirm_delay: Option<u32>,

    pub comment: Option<String>,
    pub label: Option<String>,
    pub replace: bool,
    pub force: bool,
    pub best_effort: bool,

    /// Replies to dialog markers, tried in order (e.g. conflict marker → "yes").
    pub error_dialog: IndexMap<String, String>,

    /// Overrides the platform's commit timeout.
    pub read_timeout: Option<Duration>,
}

impl CommitRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit with rollback after `delay` seconds.
    pub fn confirmed(mut self, delay: u32) -> Self {
        self.confirm = true;
        self.confirm_delay = Some(delay);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }

    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    /// Answer `marker` with `reply` instead of failing.
    pub fn on_dialog(mut self, marker: impl Into<String>, reply: impl Into<String>) -> Self {
        self.error_dialog.insert(marker.into(), reply.into());
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    fn delay(&self) -> Option<u32> {
        self.confirm_delay.filter(|d| *d > 0)
    }

    fn comment_text(&self) -> Option<&str> {
        self.comment.as_deref().filter(|c| !c.is_empty())
    }

    fn label_text(&self) -> Option<&str> {
        self.label.as_deref().filter(|l| !l.is_empty())
    }

    /// Reject contradictory options. No I/O.
    pub fn validate(&self) -> Result<()> {
        if self.confirm && self.delay().is_none() {
            return Err(DriverError::invalid_argument(
                "Invalid arguments supplied to XR commit: confirm requires confirm_delay",
            )
            .into());
        }
        if self.delay().is_some() && !self.confirm {
            return Err(DriverError::invalid_argument(
                "Invalid arguments supplied to XR commit: confirm_delay requires confirm",
            )
            .into());
        }
        if self.confirm && self.comment_text().is_some() {
            return Err(DriverError::invalid_argument(
                "Invalid arguments supplied to XR commit: comment and confirm are mutually exclusive",
            )
            .into());
        }
        if self.comment_text().is_some_and(|c| c.contains('"')) {
            return Err(DriverError::invalid_argument(
                "Invalid comment contains double quote",
            )
            .into());
        }
        Ok(())
    }

    /// Build the commit command.
    pub fn command(&self) -> Result<String> {
        self.validate()?;

        let comment = self.comment_text().map(|c| format!("\"{}\"", c));
        let mut command = match (self.label_text(), self.delay(), comment) {
            (Some(label), _, Some(comment)) => format!("commit label {} comment {}", label, comment),
            (Some(label), Some(delay), None) => format!("commit label {} confirmed {}", label, delay),
            (Some(label), None, None) => format!("commit label {}", label),
            (None, Some(delay), _) => format!("commit confirmed {}", delay),
            (None, None, Some(comment)) => format!("commit comment {}", comment),
            (None, None, None) => "commit".to_string(),
        };

        if self.force {
            command = command.replacen("commit", "commit force", 1);
        }
        if self.best_effort {
            command = command.replacen("commit", "commit best-effort", 1);
        }
        if self.replace {
            command = command.replacen("commit", "commit replace", 1);
        }
        Ok(command)
    }
}

/// Markers and replies of a platform's commit dialog.
#[derive(Debug, Clone)]
pub struct CommitProfile {
    /// Substring of a hard commit failure.
    pub failure_marker: String,

    /// Substring of the cross-session conflict question.
    pub conflict_marker: String,

    /// Warning printed before a replace commit.
    pub replace_warning: String,

    /// Confirmation sub-prompt, if the platform asks one.
    pub confirm_prompt: Option<PatternSpec>,

    pub confirm_reply: String,
    pub replace_reply: String,

    /// Reply declining an unresolved conflict.
    pub decline_reply: String,

    /// Enter config mode before committing.
    pub enter_config_first: bool,

    /// Default wait bound for the commit dialog.
    pub read_timeout: Option<Duration>,
}

impl<C: Channel> Session<C> {
    /// Commit the candidate configuration.
    ///
    /// Options are validated before anything is written. Returns the whole
    /// dialog output.
    pub async fn commit(&mut self, request: &CommitRequest) -> Result<String> {
        let strategy = self
            .platform()
            .commit
            .clone()
            .ok_or_else(|| PlatformError::Unsupported {
                platform: self.platform().name.clone(),
                operation: "commit".into(),
            })?;
        let command = strategy.build_command(request)?;
        let profile = strategy.profile().clone();
        let config_prompt = self.platform().prompt.config_mode().config_prompt.clone();
        let timeout = request.read_timeout.or(profile.read_timeout);
        info!("commit string: {}", command);

        let mut output = String::new();
        if profile.enter_config_first {
            output.push_str(&self.config_mode(None, None).await?);
        }

        let prompt_or_conflict = config_prompt
            .or(&regex::escape(&profile.conflict_marker))
            .map_err(ChannelError::InvalidPattern)?;

        if request.replace {
            let warning = PatternSpec::literal(&profile.replace_warning)
                .map_err(ChannelError::InvalidPattern)?;
            let cmd = self.normalize_cmd(&command);
            self.clear_buffer();
            self.write_channel(&cmd)?;
            let out = self
                .read_until_pattern(&warning, timeout, "sending commit replace command")
                .await?;
            output.push_str(&out);

            let out = self
                .commit_step(&profile.replace_reply, &prompt_or_conflict, timeout)
                .await
                .map_err(|e| e.in_context("sending commit replace confirmation command"))?;
            output.push_str(&out);
        } else {
            let expect = match &profile.confirm_prompt {
                Some(confirm) => prompt_or_conflict
                    .or(confirm.as_str())
                    .map_err(ChannelError::InvalidPattern)?,
                None => prompt_or_conflict.clone(),
            };
            let out = self
                .commit_step(&command, &expect, timeout)
                .await
                .map_err(|e| e.in_context("sending commit command"))?;
            output.push_str(&out);

            if let Some(confirm) = &profile.confirm_prompt
                && confirm.is_match(&out)
                && !prompt_or_conflict.is_match(&out)
            {
                debug!("answering commit confirmation");
                let out = self
                    .commit_step(&profile.confirm_reply, &prompt_or_conflict, timeout)
                    .await
                    .map_err(|e| e.in_context("confirming commit"))?;
                output.push_str(&out);
            }
        }

        if output.contains(&profile.conflict_marker) {
            let reply = request
                .error_dialog
                .iter()
                .find(|(marker, _)| output.contains(marker.as_str()))
                .map(|(_, reply)| reply.clone());
            match reply {
                Some(reply) => {
                    warn!("commit conflict, replying {:?}", reply);
                    self.write_line(&reply)?;
                    let out = self
                        .read_until_pattern(&config_prompt, timeout, "resolving commit conflict")
                        .await?;
                    output.push_str(&out);
                }
                None => {
                    self.write_line(&profile.decline_reply)?;
                    let out = self
                        .read_until_pattern(&config_prompt, timeout, "declining commit")
                        .await?;
                    output.push_str(&out);
                    error!("commit failed, another session committed first");
                    return Err(DriverError::ConfigCommit {
                        message: "Commit failed as one or more commits have occurred from other \
                                  configuration sessions"
                            .into(),
                        output,
                    }
                    .into());
                }
            }
        }

        if output.contains(&profile.failure_marker) {
            error!("commit failed");
            return Err(DriverError::ConfigCommit {
                message: "Commit failed with the following errors".into(),
                output,
            }
            .into());
        }

        Ok(output)
    }

    async fn commit_step(
        &mut self,
        command: &str,
        expect: &PatternSpec,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let mut options = CommandOptions::new().expect(expect.clone()).raw();
        options.read_timeout = timeout;
        let response = self.send_command_with(command, options).await?;
        Ok(response.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedChannel;
    use crate::platform::Platform;

    const CONFLICT: &str = "One or more commits have occurred from other configuration sessions \
                            since this session started or since the last commit was made from this session.";

    #[test]
    fn test_command_precedence() {
        let cases = [
            (CommitRequest::new().label("L").comment("c"), r#"commit label L comment "c""#),
            (CommitRequest::new().label("L").confirmed(30), "commit label L confirmed 30"),
            (CommitRequest::new().label("L"), "commit label L"),
            (CommitRequest::new().confirmed(30), "commit confirmed 30"),
            (CommitRequest::new().comment("c"), r#"commit comment "c""#),
            (CommitRequest::new(), "commit"),
        ];
        for (request, expected) in cases {
            assert_eq!(request.command().unwrap(), expected);
        }
    }

    #[test]
    fn test_modifiers_follow_verb() {
        let request = CommitRequest::new().label("L").force().best_effort().replace();
        assert_eq!(
            request.command().unwrap(),
            "commit replace best-effort force label L"
        );
    }

    #[test]
    fn test_validation_rejects_contradictions() {
        let bad = [
            CommitRequest {
                confirm: true,
                ..Default::default()
            },
            CommitRequest {
                confirm: true,
                confirm_delay: Some(0),
                ..Default::default()
            },
            CommitRequest {
                confirm_delay: Some(30),
                ..Default::default()
            },
            CommitRequest::new().confirmed(30).comment("c"),
            CommitRequest::new().comment("a\"b"),
        ];
        for request in bad {
            let err = request.validate().unwrap_err();
            assert!(err.is_invalid_argument(), "{request:?}");
        }
    }

    #[test]
    fn test_request_from_json() {
        let request: CommitRequest = serde_json::from_str(r#"{"confirm": true, "confirm_delay": null}"#).unwrap();
        assert!(request.validate().unwrap_err().is_invalid_argument());

        let request: CommitRequest =
            serde_json::from_str(r#"{"label": "L", "confirm": true, "confirm_delay": 30}"#).unwrap();
        assert_eq!(request.command().unwrap(), "commit label L confirmed 30");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_request_writes_nothing() {
        let mut session = Session::new(ScriptedChannel::new(), Platform::CiscoXr);
        let err = session
            .commit(&CommitRequest::new().comment("a\"b"))
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(session.channel().written().is_empty());
    }

    fn vxr_session(channel: ScriptedChannel) -> Session<ScriptedChannel> {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut session = Session::new(channel, Platform::CiscoVxr);
        session.set_base_prompt_text("RP/0/RP0/CPU0:R1".into());
        session
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_commit() {
        let mut session = vxr_session(
            ScriptedChannel::new().reply("commit", "commit\r\nRP/0/RP0/CPU0:R1(config)#"),
        );
        let output = session.commit(&CommitRequest::new()).await.unwrap();
        assert!(output.ends_with("(config)#"));
        assert_eq!(session.channel().written_lines(), vec!["commit"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflict_without_mapping_fails() {
        let mut session = vxr_session(
            ScriptedChannel::new()
                .reply(
                    "commit",
                    &format!("commit\r\n{}\r\nDo you wish to proceed with this commit anyway? [no]: ", CONFLICT),
                )
                .reply("no", "no\r\nRP/0/RP0/CPU0:R1(config)#"),
        );

        let err = session.commit(&CommitRequest::new()).await.unwrap_err();
        assert!(err.is_commit_error());
        assert!(err.to_string().contains("One or more commits have occurred from other"));
        assert_eq!(session.channel().written_lines(), vec!["commit", "no"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflict_with_mapping_proceeds() {
        let mut session = vxr_session(
            ScriptedChannel::new()
                .reply(
                    "commit",
                    &format!("commit\r\n{}\r\nDo you wish to proceed with this commit anyway? [no]: ", CONFLICT),
                )
                .reply("yes", "yes\r\nRP/0/RP0/CPU0:R1(config)#"),
        );

        let request =
            CommitRequest::new().on_dialog("One or more commits have occurred from other", "yes");
        let output = session.commit(&request).await.unwrap();
        assert!(output.ends_with("(config)#"));
        assert_eq!(session.channel().written_lines(), vec!["commit", "yes"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_marker_raises() {
        let mut session = vxr_session(ScriptedChannel::new().reply(
            "commit",
            "commit\r\n% Failed to commit one or more configuration items. Please issue 'show configuration failed'\r\nRP/0/RP0/CPU0:R1(config)#",
        ));
        let err = session.commit(&CommitRequest::new()).await.unwrap_err();
        assert!(err.is_commit_error());
        assert!(err.to_string().contains("show configuration failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_commit_dialog() {
        let mut session = vxr_session(
            ScriptedChannel::new()
                .reply(
                    "commit replace",
                    "commit replace\r\nThis commit will replace or remove the entire running configuration. \
                     This operation can be service affecting.\r\nDo you wish to proceed? [no]: ",
                )
                .reply("yes", "yes\r\nRP/0/RP0/CPU0:R1(config)#"),
        );
        session.commit(&CommitRequest::new().replace()).await.unwrap();
        assert_eq!(session.channel().written_lines(), vec!["commit replace", "yes"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_commit_ignores_stale_output() {
        let mut session = vxr_session(
            ScriptedChannel::new()
                .reply(
                    "commit replace",
                    "commit replace\r\nThis commit will replace or remove the entire running configuration. \
                     This operation can be service affecting.\r\nDo you wish to proceed? [no]: ",
                )
                .reply("yes", "yes\r\nRP/0/RP0/CPU0:R1(config)#"),
        );
        session
            .channel_mut()
            .push_output("\r\n% Failed to commit one or more configuration items.\r\n");

        let output = session.commit(&CommitRequest::new().replace()).await.unwrap();
        assert!(!output.contains("Failed to"));
        assert!(output.ends_with("(config)#"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_xr_enters_config_and_answers_confirm() {
        let channel = ScriptedChannel::new()
            .reply_once("", "\r\nRP/0/RP0/CPU0:R1#")
            .reply("", "\r\nRP/0/RP0/CPU0:R1(config)#")
            .reply("configure terminal", "configure terminal\r\nRP/0/RP0/CPU0:R1(config)#")
            .reply(
                "commit confirmed 60",
                "commit confirmed 60\r\nThis could be a few minutes if your config is large. Confirm? [y/n][confirm]",
            )
            .reply("y", "y\r\nRP/0/RP0/CPU0:R1(config)#");
        let mut session = Session::new(channel, Platform::CiscoXr);
        session.set_base_prompt_text("RP/0/RP0/CPU0:R1".into());

        let output = session
            .commit(&CommitRequest::new().confirmed(60))
            .await
            .unwrap();
        assert!(output.ends_with("(config)#"));
        assert_eq!(
            session.channel().written_lines(),
            vec!["", "configure terminal", "", "commit confirmed 60", "y"]
        );
    }
}
