//! Remote file digests.

use std::sync::LazyLock;
use std::time::Duration;

use log::debug;
use regex::Regex;

use super::command::CommandOptions;
use super::session::Session;
use crate::channel::Channel;
use crate::error::{DriverError, Result};

static MD5_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([a-fA-F0-9]+)$").expect("valid MD5 line regex"));

const MD5_TIMEOUT: Duration = Duration::from_secs(300);

/// Pull the digest out of `show md5 file` output.
///
/// The device may print a timestamp line first.
pub fn process_md5(output: &str) -> Option<&str> {
    let normalized = output.trim_end_matches(['\r', '\n']);
    MD5_LINE
        .captures_iter(normalized)
        .find_map(|c| c.get(1))
        .map(|m| m.as_str())
}

impl<C: Channel> Session<C> {
    /// MD5 digest of `remote_file` on `file_system`.
    ///
    /// Both the leading slash and the slash after the file system are
    /// required, e.g. `show md5 file /bootflash:/boot/grub/grub.cfg`.
    pub async fn remote_md5(&mut self, file_system: &str, remote_file: &str) -> Result<String> {
        let command = format!("show md5 file /{}/{}", file_system, remote_file);
        let response = self
            .send_command_with(&command, CommandOptions::new().read_timeout(MD5_TIMEOUT))
            .await?;
        let text = response.result.replace('\r', "");
        match process_md5(&text) {
            Some(digest) => {
                debug!("md5 of {}: {}", remote_file, digest);
                Ok(digest.to_string())
            }
            None => Err(DriverError::UnexpectedOutput {
                command,
                output: response.result,
            }
            .into()),
        }
    }
}
