//! Builder for opening sessions.

use std::path::PathBuf;
use std::time::Duration;

use log::{info, warn};
use secrecy::SecretString;

use super::session::{Credentials, Session, SessionSettings};
use crate::channel::Channel;
use crate::error::{PlatformError, Result};
use crate::platform::{Platform, PlatformDefinition};
use crate::transport::{AuthMethod, HostKeyVerification, SshChannel, SshConfig};

/// Builder for constructing sessions.
///
/// # Example
///
/// ```rust,no_run
/// use netdialog::{Platform, SessionBuilder};
///
/// # async fn example() -> Result<(), netdialog::Error> {
/// let mut session = SessionBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .platform(Platform::CiscoXr)
///     .connect()
///     .await?;
///
/// let response = session.send_command("show version").await?;
/// println!("{}", response.result);
/// session.cleanup("exit").await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<SecretString>,
    private_key: Option<(PathBuf, Option<SecretString>)>,
    platform: Option<PlatformDefinition>,
    settings: SessionSettings,
    timeout: Duration,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    console_login: bool,
    prepare: bool,
}

impl SessionBuilder {
    /// Create a new builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            password: None,
            private_key: None,
            platform: None,
            settings: SessionSettings::default(),
            timeout: Duration::from_secs(30),
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            console_login: false,
            prepare: true,
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password, used for SSH and for console logins.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Authenticate SSH with a private key.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.private_key = Some((key_path.into(), None));
        self
    }

    /// Authenticate SSH with an encrypted private key.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.private_key = Some((
            key_path.into(),
            Some(SecretString::from(passphrase.into())),
        ));
        self
    }

    /// Set a built-in platform.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform.definition());
        self
    }

    /// Set a platform by name (e.g. "cisco_xr").
    pub fn platform_name(mut self, name: &str) -> Result<Self> {
        let platform: Platform = name.parse()?;
        self.platform = Some(platform.definition());
        Ok(self)
    }

    /// Set a custom platform definition.
    pub fn custom_platform(mut self, platform: PlatformDefinition) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Replace the session settings.
    pub fn settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the default bound for every wait.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.settings.read_timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Run the console login dialog after the shell opens.
    ///
    /// For console servers that hand the SSH session straight to a device
    /// console, where the device asks for its own credentials.
    pub fn console_login(mut self, enabled: bool) -> Self {
        self.console_login = enabled;
        self
    }

    /// Sync on the prompt and run on-open commands (default: on).
    pub fn prepare(mut self, enabled: bool) -> Self {
        self.prepare = enabled;
        self
    }

    /// Connect over SSH and return a ready session.
    pub async fn connect(self) -> Result<Session<SshChannel>> {
        let platform = self.platform.clone().ok_or_else(|| PlatformError::InvalidDefinition {
            message: "Platform must be specified".to_string(),
        })?;
        let username = self.username.clone().ok_or_else(|| PlatformError::InvalidDefinition {
            message: "Username is required".to_string(),
        })?;

        let auth = match (&self.private_key, &self.password) {
            (Some((path, passphrase)), _) => AuthMethod::PrivateKey {
                path: path.clone(),
                passphrase: passphrase.clone(),
            },
            (None, Some(password)) => AuthMethod::Password(password.clone()),
            (None, None) => AuthMethod::None,
        };

        let config = SshConfig {
            host: self.host.clone(),
            port: self.port,
            username,
            auth,
            timeout: self.timeout,
            terminal_width: platform.terminal_width,
            terminal_height: platform.terminal_height,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path.clone(),
        };

        info!("opening {} session to {}", platform.name, config.socket_addr());
        let channel = SshChannel::open(config).await?;
        self.finish(channel, platform).await
    }

    /// Build a session over an already-open channel.
    ///
    /// Runs the same console login and preparation as [`connect`](Self::connect).
    pub async fn build_with_channel<C: Channel>(self, channel: C) -> Result<Session<C>> {
        let platform = self.platform.clone().ok_or_else(|| PlatformError::InvalidDefinition {
            message: "Platform must be specified".to_string(),
        })?;
        self.finish(channel, platform).await
    }

    async fn finish<C: Channel>(
        self,
        channel: C,
        platform: PlatformDefinition,
    ) -> Result<Session<C>> {
        let mut session = Session::new(channel, platform)
            .with_settings(self.settings)
            .with_host(self.host);
        if let (Some(username), Some(password)) = (self.username, self.password) {
            session = session.with_credentials(Credentials {
                username,
                password,
            });
        }

        if self.console_login {
            let report = session.serial_login().await?;
            if report.standby {
                warn!("{} is a standby node, skipping preparation", session.host());
                return Ok(session);
            }
        }
        if self.prepare {
            session.prepare().await?;
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedChannel;

    #[tokio::test]
    async fn test_missing_platform_is_rejected() {
        let err = SessionBuilder::new("r1")
            .build_with_channel(ScriptedChannel::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Platform(PlatformError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_unknown_platform_name() {
        let err = SessionBuilder::new("r1").platform_name("juniper_junos").err().unwrap();
        assert!(matches!(
            err,
            crate::Error::Platform(PlatformError::UnknownPlatform { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_with_channel_prepares() {
        let channel = ScriptedChannel::new()
            .reply("", "\r\nRP/0/RP0/CPU0:R1#")
            .reply("terminal width 511", "terminal width 511\r\nRP/0/RP0/CPU0:R1#")
            .reply("terminal length 0", "terminal length 0\r\nRP/0/RP0/CPU0:R1#");
        let session = SessionBuilder::new("r1")
            .platform(Platform::CiscoXr)
            .build_with_channel(channel)
            .await
            .unwrap();
        assert_eq!(session.base_prompt(), "RP/0/RP0/CPU0:R1");
        assert_eq!(session.host(), "r1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_console_login_then_prepare() {
        let channel = ScriptedChannel::new()
            .reply_once("", "\r\nUsername: ")
            .reply_once("", "\r\nUsername: ")
            .reply("admin", "\r\nPassword: ")
            .reply("secret", "\r\nRP/0/RP0/CPU0:R1#")
            .reply("", "\r\nRP/0/RP0/CPU0:R1#")
            .reply("terminal width 511", "terminal width 511\r\nRP/0/RP0/CPU0:R1#")
            .reply("terminal length 0", "terminal length 0\r\nRP/0/RP0/CPU0:R1#");
        let session = SessionBuilder::new("console-1")
            .username("admin")
            .password("secret")
            .platform(Platform::CiscoXr)
            .console_login(true)
            .build_with_channel(channel)
            .await
            .unwrap();
        let written = session.channel().written_lines();
        assert!(written.contains(&"admin"));
        assert!(written.contains(&"terminal length 0"));
    }
}
