//! Idle prompt detection.
//!
//! Devices print asynchronous banners (last login, autocommand, failover
//! notices) that arrive exactly when a prompt is expected. Detection keeps
//! nudging the device with a return until a line shows up that is not one
//! of those banners.

use std::time::Duration;

use log::{debug, info, trace};
use tokio::time::Instant;

use super::sanitize::normalize_linefeeds;
use super::session::Session;
use crate::channel::{Channel, contains_ignore_case};
use crate::error::{ChannelError, Result};

/// Prompt detection parameters for one call.
#[derive(Debug, Clone)]
pub struct PromptDetector {
    /// Case-insensitive banner markers to skip.
    pub transient_banners: Vec<String>,
    pub read_timeout: Duration,
    pub loop_delay: Duration,
    pub retry_delay: Duration,
}

impl PromptDetector {
    /// Whether `output` carries one of the transient banners.
    pub fn is_transient(&self, output: &str) -> bool {
        self.transient_banners
            .iter()
            .any(|banner| contains_ignore_case(output, banner))
    }
}

/// Last non-empty line of `output`, trimmed.
pub fn last_line(output: &str) -> &str {
    output
        .trim()
        .rsplit('\n')
        .next()
        .map(str::trim)
        .unwrap_or("")
}

impl<C: Channel> Session<C> {
    /// Detect the device's idle prompt.
    ///
    /// Sends a return and reads until non-empty output shows up. Output
    /// carrying a transient banner is discarded and the return resent
    /// after a back-off. The buffer is cleared before returning.
    pub async fn find_prompt(&mut self) -> Result<String> {
        let timeout = self.settings().read_timeout;
        self.find_prompt_within(timeout).await
    }

    /// [`find_prompt`](Self::find_prompt) with an explicit bound.
    pub(crate) async fn find_prompt_within(&mut self, read_timeout: Duration) -> Result<String> {
        let settings = self.settings().clone();
        let detector = PromptDetector {
            transient_banners: self
                .platform()
                .prompt
                .transient_banners()
                .iter()
                .map(|b| b.to_string())
                .collect(),
            read_timeout,
            loop_delay: settings.loop_delay,
            retry_delay: settings.transient_retry_delay,
        };

        self.clear_buffer();
        self.send_return()?;
        self.settle(detector.loop_delay).await;

        let start = Instant::now();
        let mut last_seen = String::new();
        let prompt = loop {
            if self.is_closed() {
                return Err(ChannelError::SessionDown {
                    context: "finding prompt".into(),
                }
                .into());
            }
            let waited = start.elapsed();
            if waited >= detector.read_timeout {
                return Err(ChannelError::PromptNotFound { waited, last_seen }.into());
            }

            let data = self.channel_mut().read();
            if data.is_empty() {
                self.settle(detector.loop_delay).await;
                continue;
            }

            let text = self.decode(&data);
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            if detector.is_transient(trimmed) {
                info!("transient banner seen, retrying prompt detection");
                trace!("banner: {:?}", trimmed);
                last_seen = trimmed.to_string();
                self.settle(detector.loop_delay + detector.retry_delay).await;
                self.clear_buffer();
                self.send_return()?;
                self.settle(detector.loop_delay).await;
                continue;
            }

            let normalized = normalize_linefeeds(trimmed);
            let candidate = last_line(&normalized);
            if !candidate.is_empty() {
                break candidate.to_string();
            }
        };

        self.settle(detector.loop_delay).await;
        self.clear_buffer();
        debug!("found prompt {:?}", prompt);
        Ok(prompt)
    }

    /// Detect the prompt and store it, minus its terminator, as the base
    /// prompt.
    ///
    /// A standby node's banner is stored verbatim.
    pub async fn set_base_prompt(&mut self) -> Result<String> {
        let start = Instant::now();
        let prompt = self.find_prompt().await?;

        if self.is_standby(&prompt) {
            info!("standby node banner: {}", prompt);
            self.set_base_prompt_text(prompt.clone());
            return Ok(prompt);
        }

        let terminators = self.platform().prompt.terminators();
        match prompt.chars().last() {
            Some(last) if terminators.contains(&last) => {
                let base = prompt[..prompt.len() - last.len_utf8()].to_string();
                self.set_base_prompt_text(base);
                Ok(prompt)
            }
            _ => Err(ChannelError::PromptNotFound {
                waited: start.elapsed(),
                last_seen: prompt,
            }
            .into()),
        }
    }
}
