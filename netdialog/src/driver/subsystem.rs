//! Management controller (BMC) shells on BSP consoles.
//!
//! The console of a BSP board may land on its BMC, which has its own login
//! and a serial-over-LAN command that attaches to the board shell. A
//! control sequence detaches back to the BMC.

use std::time::Duration;

use log::{debug, info};
use secrecy::SecretString;
use tokio::time::Instant;

use super::session::Session;
use crate::channel::{Channel, PatternSpec};
use crate::error::{DriverError, PlatformError, Result};

/// How to log into a subsystem shell and switch to and from the primary one.
#[derive(Debug, Clone)]
pub struct SubsystemLogin {
    /// Subsystem name used in logs and errors, e.g. `BMC`.
    pub name: String,

    /// Primary shell name, e.g. `BSP`.
    pub primary_name: String,

    /// Console output showing the subsystem wants a login.
    pub banner: PatternSpec,

    pub username: String,
    pub password: String,
    pub username_prompt: PatternSpec,
    pub password_prompt: PatternSpec,

    /// Subsystem shell prompt.
    pub prompt: PatternSpec,

    /// Primary shell prompt.
    pub primary_prompt: PatternSpec,

    /// Command attaching to the primary shell.
    pub enter_command: String,

    /// Control key detaching from the primary shell.
    pub leave_key: String,

    /// Command following `leave_key`.
    pub leave_command: String,

    /// Bound for each login or switch.
    pub timeout: Duration,
}

impl SubsystemLogin {
    /// At the subsystem prompt and not at the primary one.
    ///
    /// The subsystem prompt pattern is loose enough to match the primary
    /// prompt too.
    pub fn at_subsystem(&self, output: &str) -> bool {
        self.prompt.is_match(output) && !self.primary_prompt.is_match(output)
    }

    fn switch_failed(&self, to_primary: bool, prompt: String) -> DriverError {
        let (from, to) = if to_primary {
            (&self.name, &self.primary_name)
        } else {
            (&self.primary_name, &self.name)
        };
        DriverError::ModeSwitchFailed {
            from: from.clone(),
            to: to.clone(),
            prompt,
        }
    }
}

impl<C: Channel> Session<C> {
    fn subsystem_login(&self) -> Result<SubsystemLogin> {
        self.platform().login.rules().subsystem.clone().ok_or_else(|| {
            PlatformError::Unsupported {
                platform: self.platform().name.clone(),
                operation: "subsystem login".into(),
            }
            .into()
        })
    }

    /// Log into the BMC shell.
    pub async fn bmc_login(&mut self) -> Result<()> {
        let sub = self.subsystem_login()?;
        let password = SecretString::from(sub.password.clone());
        let ret = self.settings().return_sequence.clone();
        let short = Duration::from_millis(500);
        let start = Instant::now();

        while start.elapsed() < sub.timeout {
            let mut output = self.login_prompt(sub.timeout).await?;
            if sub.prompt.is_match(&output) {
                debug!("on the {} prompt", sub.name);
                return Ok(());
            }

            if sub.username_prompt.is_match(&output) {
                debug!("{} username prompt, sending {}", sub.name, sub.username);
                self.settle(Duration::from_secs(1)).await;
                self.write_line(&sub.username)?;
                self.settle(Duration::from_secs(1)).await;
                output = self.login_prompt(sub.timeout).await?;
            }

            if sub.password_prompt.is_match(&output) {
                debug!("{} password prompt", sub.name);
                self.write_secret_with(&password, &ret)?;
                self.settle(short).await;
                output = self.login_prompt(sub.timeout).await?;
                if sub.prompt.is_match(&output) {
                    info!("logged in to the {}", sub.name);
                    return Ok(());
                }
                if sub.password_prompt.is_match(&output) {
                    self.write_secret_with(&password, &ret)?;
                    self.settle(short).await;
                }
            }
        }

        self.send_return()?;
        self.settle(short).await;
        let output = self.login_prompt(sub.timeout).await?;
        if sub.prompt.is_match(&output) {
            info!("logged in to the {} on the last try", sub.name);
            return Ok(());
        }
        Err(self.auth_failure(format!("{} login failed", sub.name)))
    }

    /// Switch from the BMC shell to the BSP shell.
    pub async fn bmc_to_bsp(&mut self) -> Result<()> {
        let sub = self.subsystem_login()?;
        let start = Instant::now();
        let mut output = self.login_prompt(sub.timeout).await?;

        while start.elapsed() < sub.timeout {
            if sub.primary_prompt.is_match(&output) {
                debug!("on the {} prompt", sub.primary_name);
                return Ok(());
            }
            if sub.prompt.is_match(&output) {
                info!("attaching to the {} with {}", sub.primary_name, sub.enter_command);
                self.write_line(&sub.enter_command)?;
            }
            output = self.login_prompt(sub.timeout).await?;
        }

        if sub.primary_prompt.is_match(&output) {
            return Ok(());
        }
        Err(sub.switch_failed(true, output).into())
    }

    /// Switch from the BSP shell back to the BMC shell.
    pub async fn bsp_to_bmc(&mut self) -> Result<()> {
        let sub = self.subsystem_login()?;
        let start = Instant::now();
        let mut output = self.login_prompt(sub.timeout).await?;

        while start.elapsed() < sub.timeout {
            if sub.at_subsystem(&output) {
                debug!("on the {} prompt", sub.name);
                return Ok(());
            }
            if sub.primary_prompt.is_match(&output) {
                info!("detaching from the {}", sub.primary_name);
                self.write_channel(&sub.leave_key)?;
                self.write_line(&sub.leave_command)?;
            }
            output = self.login_prompt(sub.timeout).await?;
        }

        if sub.at_subsystem(&output) {
            return Ok(());
        }
        Err(sub.switch_failed(false, output).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedChannel;
    use crate::driver::Credentials;
    use crate::platform::Platform;

    const BMC: &str = "\r\nroot@bmc:~#";
    const BSP: &str = "\r\n[root@bsp ~]#";

    fn bsp_session(channel: ScriptedChannel) -> Session<ScriptedChannel> {
        Session::new(channel, Platform::CiscoBsp)
            .with_credentials(Credentials::new("cisco", "cisco123"))
            .with_host("bsp-console")
    }

    #[test]
    fn test_bsp_prompt_is_not_bmc() {
        let rules = Platform::CiscoBsp.definition().login.rules().clone();
        let sub = rules.subsystem.unwrap();
        assert!(sub.at_subsystem("root@bmc:~#"));
        assert!(!sub.at_subsystem("[root@bsp ~]#"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_console_login_through_bmc() {
        let mut channel = ScriptedChannel::new()
            .reply_once("", "\r\nbmc-host login: ")
            .reply_once("", "\r\nPassword: ")
            .reply_once("", BMC)
            .reply_once("", BMC)
            .reply("", BSP);
        channel.push_output("\r\nbmc-host login: ");
        let mut session = bsp_session(channel);

        let report = session.login().await.unwrap();
        assert!(!report.standby);
        assert!(report.transcript.contains("[root@bsp ~]#"));
        let written = session.channel().written_lines();
        assert!(written.contains(&"root"));
        assert!(written.contains(&"0penBmc"));
        assert!(written.contains(&"/usr/local/bin/sol.sh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bsp_to_bmc_sends_detach_sequence() {
        let channel = ScriptedChannel::new().reply_once("", BSP).reply("", BMC);
        let mut session = bsp_session(channel);

        session.bsp_to_bmc().await.unwrap();
        let written = session.channel().written_lines();
        assert!(written.contains(&"\x0c"));
        assert!(written.contains(&"x"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bsp_to_bmc_fails_when_stuck() {
        let mut session = bsp_session(ScriptedChannel::new().reply("", BSP));

        let err = session.bsp_to_bmc().await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Driver(DriverError::ModeSwitchFailed { ref from, ref to, .. })
                if from == "BSP" && to == "BMC"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bmc_to_bsp_is_noop_on_bsp() {
        let mut session = bsp_session(ScriptedChannel::new().reply("", BSP));
        session.bmc_to_bsp().await.unwrap();
        assert!(!session.channel().written_lines().contains(&"/usr/local/bin/sol.sh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_xr_has_no_subsystem() {
        let mut session = Session::new(ScriptedChannel::new(), Platform::CiscoXr);
        let err = session.bmc_login().await.unwrap_err();
        assert!(matches!(err, crate::Error::Platform(PlatformError::Unsupported { .. })));
    }
}
