//! Console login negotiation.
//!
//! A console may greet with anything: a username prompt, a management
//! controller shell, a Linux host shell, a standby notice, or the router
//! prompt itself. Each read is run through an ordered rule list. Rules are
//! pure functions of `(state, output)` that yield the next state and,
//! optionally, an action; the engine performs the action and feeds the new
//! output to the remaining rules of the same iteration.

use std::time::Duration;

use log::{debug, info, trace, warn};
use secrecy::SecretString;
use tokio::time::Instant;

use super::session::{Credentials, Session};
use super::subsystem::SubsystemLogin;
use crate::channel::{Channel, PatternSpec};
use crate::error::Result;

/// Marker that ends the initial configuration dialog.
const GET_STARTED_MARKER: &str = "ress RETURN to get started";

/// Where the dialog stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    AwaitingOutput,
    SawUsernamePrompt { alternate_password: bool },
    SawPasswordPrompt { alternate_password: bool },
    SawSubsystemBanner,
    LeftNestedShell,
    Done { standby: bool },
    Failed { reason: String },
}

/// Facts that survive across iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginContext {
    /// A subsystem shell (BMC, x86 host) was seen; `>` alone no longer
    /// proves the router CLI is up.
    pub subsystem_seen: bool,
}

/// The rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginRule {
    EmptyOutput,
    ReadyPrompt,
    PasswordProbe,
    Subsystem,
    ModeSwitch(usize),
    ShellExited(usize),
    Standby,
    Username,
    Password,
    PasswordOutcome,
    GetStarted,
    InitialDialog,
    NoPasswordSet,
    MarkSubsystem,
    Terminators,
}

/// Which credential to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Username,
    Password { alternate: bool },
}

/// Line ending for a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// The platform's credential terminator (a bare `\r` on XR consoles).
    Credential,
    /// The session return sequence.
    Return,
}

/// Side effect requested by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginAction {
    /// Pause, then run prompt detection.
    FindPrompt { delay: Duration },
    /// Send a return, then run prompt detection.
    ReturnAndFindPrompt,
    /// Write a command, wait, optionally send a return, then read.
    Send {
        command: String,
        wrap_in_returns: bool,
        settle: Duration,
        then_return: bool,
    },
    SendCredential {
        kind: CredentialKind,
        terminator: Terminator,
        delay_before: Duration,
        settle: Duration,
    },
    /// Log into the subsystem shell and switch to the primary shell.
    SubsystemLogin,
    /// Decline the initial configuration dialog.
    AnswerInitialDialog,
}

/// Outcome of one rule firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub rule: LoginRule,
    pub state: LoginState,
    pub action: Option<LoginAction>,
    pub mark_subsystem: bool,
}

impl Transition {
    fn to(rule: LoginRule, state: LoginState) -> Self {
        Self {
            rule,
            state,
            action: None,
            mark_subsystem: false,
        }
    }

    fn with(mut self, action: LoginAction) -> Self {
        self.action = Some(action);
        self
    }
}

/// A banner that calls for a fixed command.
#[derive(Debug, Clone)]
pub struct ModeSwitch {
    pub name: String,
    pub banner: PatternSpec,
    pub command: String,
    /// Send a return before and after the command.
    pub wrap_in_returns: bool,
    pub settle: Duration,
    pub then_return: bool,
    /// The command leaves a nested shell; a prompt afterwards ends the login.
    pub exits_shell: bool,
}

/// How many times the dialog is retried.
#[derive(Debug, Clone, Copy)]
pub struct LoginBudget {
    pub passes: usize,
    pub max_loops: usize,
    /// Wall-clock bound across all passes.
    pub deadline: Option<Duration>,
    /// Send a return between passes.
    pub reset_between_passes: bool,
    /// Send a return after every iteration that did not finish.
    pub return_each_iteration: bool,
}

impl LoginBudget {
    pub fn loops_per_pass(&self) -> usize {
        (self.max_loops / self.passes.max(1)).max(1)
    }
}

/// Fixed delays of the dialog.
#[derive(Debug, Clone, Copy)]
pub struct LoginTiming {
    pub initial_delay: Duration,
    pub empty_output_delay: Duration,
    pub username_delay: Duration,
    pub settle: Duration,
    pub short_settle: Duration,
    pub dialog_poll: Duration,
    pub dialog_reads: usize,
    pub last_try_delay: Duration,
    /// Bound for prompt detection inside the dialog.
    pub prompt_timeout: Duration,
}

impl Default for LoginTiming {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            empty_output_delay: Duration::from_secs(2),
            username_delay: Duration::from_secs(1),
            settle: Duration::from_secs(1),
            short_settle: Duration::from_millis(500),
            dialog_poll: Duration::from_secs(2),
            dialog_reads: 15,
            last_try_delay: Duration::from_millis(500),
            prompt_timeout: Duration::from_secs(60),
        }
    }
}

/// A platform's login rule set.
#[derive(Debug, Clone)]
pub struct LoginRules {
    /// Prompt ending, multiline (e.g. `\#\s*$`).
    pub pri_prompt: PatternSpec,
    /// Alternate prompt ending (e.g. `>\s*$`).
    pub alt_prompt: PatternSpec,
    pub username: PatternSpec,
    pub password: PatternSpec,

    /// A prompt that proves the router CLI is up.
    pub ready_prompt: Option<PatternSpec>,

    /// Resend a return when a password prompt shows up unasked.
    pub probe_password_prompt: bool,

    /// Banner of a subsystem that needs its own login.
    pub subsystem: Option<SubsystemLogin>,

    pub mode_switches: Vec<ModeSwitch>,
    pub standby: Option<PatternSpec>,

    /// Username banner whose password is the subsystem one.
    pub alternate_password_banner: Option<PatternSpec>,
    pub alternate_password: Option<String>,

    /// Banner accepting the username directly.
    pub direct_login: Option<PatternSpec>,

    pub get_started: Option<PatternSpec>,
    pub initial_dialog: Option<PatternSpec>,
    pub no_password_set: PatternSpec,

    /// Shells after which `>` no longer proves the router CLI is up.
    pub subsystem_markers: Vec<PatternSpec>,

    pub credential_terminator: String,
    pub budget: LoginBudget,
    pub timing: LoginTiming,
}

impl LoginRules {
    /// Rules in evaluation order.
    pub fn sequence(&self) -> Vec<LoginRule> {
        let mut rules = vec![LoginRule::EmptyOutput];
        if self.ready_prompt.is_some() {
            rules.push(LoginRule::ReadyPrompt);
        }
        if self.probe_password_prompt {
            rules.push(LoginRule::PasswordProbe);
        }
        if self.subsystem.is_some() {
            rules.push(LoginRule::Subsystem);
        }
        for (i, switch) in self.mode_switches.iter().enumerate() {
            rules.push(LoginRule::ModeSwitch(i));
            if switch.exits_shell {
                rules.push(LoginRule::ShellExited(i));
            }
        }
        if self.standby.is_some() {
            rules.push(LoginRule::Standby);
        }
        rules.extend([
            LoginRule::NoPasswordSet,
            LoginRule::Username,
            LoginRule::Password,
            LoginRule::PasswordOutcome,
        ]);
        if self.get_started.is_some() {
            rules.push(LoginRule::GetStarted);
        }
        if self.initial_dialog.is_some() {
            rules.push(LoginRule::InitialDialog);
        }
        if !self.subsystem_markers.is_empty() {
            rules.push(LoginRule::MarkSubsystem);
        }
        rules.push(LoginRule::Terminators);
        rules
    }

    /// Either prompt ending shows.
    pub fn at_any_prompt(&self, output: &str) -> bool {
        self.pri_prompt.is_match(output) || self.alt_prompt.is_match(output)
    }

    fn subsystem_in(&self, output: &str) -> bool {
        self.subsystem_markers.iter().any(|m| m.is_match(output))
    }

    /// First rule at or after `from` that fires.
    pub fn next_transition(
        &self,
        sequence: &[LoginRule],
        from: usize,
        state: &LoginState,
        ctx: &LoginContext,
        output: &str,
    ) -> Option<(usize, Transition)> {
        sequence
            .iter()
            .enumerate()
            .skip(from)
            .find_map(|(i, rule)| self.evaluate(*rule, state, ctx, output).map(|t| (i, t)))
    }

    /// Evaluate one rule. Pure.
    pub fn evaluate(
        &self,
        rule: LoginRule,
        state: &LoginState,
        ctx: &LoginContext,
        output: &str,
    ) -> Option<Transition> {
        let timing = &self.timing;
        match rule {
            LoginRule::EmptyOutput => output.is_empty().then(|| {
                Transition::to(rule, LoginState::AwaitingOutput).with(LoginAction::FindPrompt {
                    delay: timing.empty_output_delay,
                })
            }),
            LoginRule::ReadyPrompt => self
                .ready_prompt
                .as_ref()
                .filter(|p| p.is_match(output))
                .map(|_| Transition::to(rule, LoginState::Done { standby: false })),
            LoginRule::PasswordProbe => self
                .password
                .is_match(output)
                .then(|| Transition::to(rule, state.clone()).with(LoginAction::ReturnAndFindPrompt)),
            LoginRule::Subsystem => self
                .subsystem
                .as_ref()
                .filter(|s| s.banner.is_match(output))
                .map(|_| {
                    Transition::to(rule, LoginState::SawSubsystemBanner)
                        .with(LoginAction::SubsystemLogin)
                }),
            LoginRule::ModeSwitch(i) => {
                let switch = self.mode_switches.get(i)?;
                switch.banner.is_match(output).then(|| {
                    let next = if switch.exits_shell {
                        LoginState::LeftNestedShell
                    } else {
                        state.clone()
                    };
                    Transition::to(rule, next).with(LoginAction::Send {
                        command: switch.command.clone(),
                        wrap_in_returns: switch.wrap_in_returns,
                        settle: switch.settle,
                        then_return: switch.then_return,
                    })
                })
            }
            LoginRule::ShellExited(_) => (*state == LoginState::LeftNestedShell
                && self.at_any_prompt(output))
            .then(|| Transition::to(rule, LoginState::Done { standby: false })),
            LoginRule::Standby => self
                .standby
                .as_ref()
                .filter(|p| p.is_match(output))
                .map(|_| Transition::to(rule, LoginState::Done { standby: true })),
            LoginRule::Username => {
                if self.username.is_match(output) {
                    let alternate_password = self
                        .alternate_password_banner
                        .as_ref()
                        .is_some_and(|p| p.is_match(output));
                    Some(
                        Transition::to(rule, LoginState::SawUsernamePrompt { alternate_password })
                            .with(LoginAction::SendCredential {
                                kind: CredentialKind::Username,
                                terminator: Terminator::Credential,
                                delay_before: timing.username_delay,
                                settle: timing.settle,
                            }),
                    )
                } else if self.direct_login.as_ref().is_some_and(|p| p.is_match(output)) {
                    Some(
                        Transition::to(
                            rule,
                            LoginState::SawUsernamePrompt {
                                alternate_password: false,
                            },
                        )
                        .with(LoginAction::SendCredential {
                            kind: CredentialKind::Username,
                            terminator: Terminator::Return,
                            delay_before: Duration::ZERO,
                            settle: timing.settle,
                        }),
                    )
                } else {
                    None
                }
            }
            LoginRule::Password => {
                if !self.password.is_match(output) {
                    return None;
                }
                let alternate_password = matches!(
                    state,
                    LoginState::SawUsernamePrompt {
                        alternate_password: true
                    }
                );
                Some(
                    Transition::to(rule, LoginState::SawPasswordPrompt { alternate_password }).with(
                        LoginAction::SendCredential {
                            kind: CredentialKind::Password {
                                alternate: alternate_password,
                            },
                            terminator: Terminator::Credential,
                            delay_before: Duration::ZERO,
                            settle: timing.short_settle,
                        },
                    ),
                )
            }
            LoginRule::PasswordOutcome => {
                let LoginState::SawPasswordPrompt { alternate_password } = state else {
                    return None;
                };
                if self.no_password_set.is_match(output) {
                    Some(Transition::to(rule, no_password_failure()))
                } else if self.pri_prompt.is_match(output)
                    || (self.alt_prompt.is_match(output) && !self.subsystem_in(output))
                {
                    Some(Transition::to(rule, LoginState::Done { standby: false }))
                } else if self.password.is_match(output) {
                    Some(Transition::to(rule, state.clone()).with(LoginAction::SendCredential {
                        kind: CredentialKind::Password {
                            alternate: *alternate_password,
                        },
                        terminator: Terminator::Return,
                        delay_before: Duration::ZERO,
                        settle: timing.short_settle,
                    }))
                } else {
                    None
                }
            }
            LoginRule::GetStarted => self
                .get_started
                .as_ref()
                .filter(|p| p.is_match(output))
                .map(|_| {
                    Transition::to(rule, state.clone()).with(LoginAction::Send {
                        command: String::new(),
                        wrap_in_returns: false,
                        settle: Duration::ZERO,
                        then_return: false,
                    })
                }),
            LoginRule::InitialDialog => self
                .initial_dialog
                .as_ref()
                .filter(|p| p.is_match(output))
                .map(|_| {
                    Transition::to(rule, state.clone()).with(LoginAction::AnswerInitialDialog)
                }),
            LoginRule::NoPasswordSet => self
                .no_password_set
                .is_match(output)
                .then(|| Transition::to(rule, no_password_failure())),
            LoginRule::MarkSubsystem => self.subsystem_in(output).then(|| Transition {
                rule,
                state: state.clone(),
                action: None,
                mark_subsystem: true,
            }),
            LoginRule::Terminators => (self.pri_prompt.is_match(output)
                || (self.alt_prompt.is_match(output) && !ctx.subsystem_seen))
                .then(|| Transition::to(rule, LoginState::Done { standby: false })),
        }
    }
}

fn no_password_failure() -> LoginState {
    LoginState::Failed {
        reason: "Password required, but none set".into(),
    }
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginReport {
    /// Everything read during the dialog.
    pub transcript: String,

    /// The node is a standby route processor and accepts no logins.
    pub standby: bool,
}

impl<C: Channel> Session<C> {
    /// Log in over a console where the device may already be at a prompt.
    ///
    /// Sends a return and reads once; the full dialog runs only when no
    /// prompt shows.
    pub async fn serial_login(&mut self) -> Result<LoginReport> {
        let rules = self.platform().login.rules().clone();
        self.send_return()?;
        let output = self.read_channel();
        if rules.at_any_prompt(&output) {
            debug!("serial console already at a prompt");
            return Ok(LoginReport {
                transcript: output,
                standby: false,
            });
        }
        self.login().await
    }

    /// Negotiate a console login.
    ///
    /// Fails with `AuthenticationFailed`, closing the channel, when the
    /// rules give up, the device has no password set, or the stream ends.
    pub async fn login(&mut self) -> Result<LoginReport> {
        let rules = self.platform().login.rules().clone();
        let Some(credentials) = self.credentials().cloned() else {
            return Err(self.auth_failure("no credentials configured"));
        };
        let sequence = rules.sequence();
        let budget = rules.budget;
        let start = Instant::now();
        let mut ctx = LoginContext::default();
        let mut transcript = String::new();

        info!("starting console login to {}", self.host());
        self.settle(rules.timing.initial_delay).await;

        'passes: for pass in 0..budget.passes {
            for iteration in 0..budget.loops_per_pass() {
                if budget.deadline.is_some_and(|d| start.elapsed() >= d) {
                    debug!("login deadline reached");
                    break 'passes;
                }
                if self.is_closed() {
                    return Err(self.auth_failure("end of stream during login"));
                }
                trace!("login pass {} iteration {}", pass + 1, iteration + 1);

                let mut output = self.read_channel();
                transcript.push_str(&output);
                let mut state = LoginState::AwaitingOutput;
                let mut cursor = 0;

                while let Some((index, transition)) =
                    rules.next_transition(&sequence, cursor, &state, &ctx, &output)
                {
                    cursor = index + 1;
                    debug!("login rule {:?} -> {:?}", transition.rule, transition.state);
                    if transition.mark_subsystem {
                        ctx.subsystem_seen = true;
                    }
                    state = transition.state;
                    match &state {
                        LoginState::Done { standby } => {
                            if *standby {
                                warn!("{} is a standby node", self.host());
                            } else {
                                info!("logged in to {}", self.host());
                            }
                            return Ok(LoginReport {
                                transcript,
                                standby: *standby,
                            });
                        }
                        LoginState::Failed { reason } => {
                            let reason = reason.clone();
                            return Err(self.auth_failure(reason));
                        }
                        _ => {}
                    }

                    if let Some(action) = transition.action {
                        output = match self.perform(action, &rules, &credentials).await {
                            Ok(output) => output,
                            Err(e) if e.is_session_down() => {
                                return Err(self.auth_failure("end of stream during login"));
                            }
                            Err(e) => return Err(e),
                        };
                        transcript.push_str(&output);
                        if self.is_closed() {
                            return Err(self.auth_failure("end of stream during login"));
                        }
                    }
                }

                if budget.return_each_iteration {
                    self.login_return()?;
                    self.settle(self.settings().loop_delay).await;
                }
            }

            if budget.reset_between_passes {
                self.login_return()?;
                self.settle(rules.timing.short_settle).await;
            }
        }

        self.login_return()?;
        self.settle(rules.timing.last_try_delay).await;
        let output = self.read_channel();
        transcript.push_str(&output);
        if rules.at_any_prompt(&output) {
            info!("logged in to {} on the last try", self.host());
            return Ok(LoginReport {
                transcript,
                standby: false,
            });
        }
        Err(self.auth_failure("login dialog exhausted"))
    }

    fn login_return(&mut self) -> Result<()> {
        match self.send_return() {
            Err(e) if e.is_session_down() => Err(self.auth_failure("end of stream during login")),
            other => other,
        }
    }

    async fn perform(
        &mut self,
        action: LoginAction,
        rules: &LoginRules,
        credentials: &Credentials,
    ) -> Result<String> {
        let timing = rules.timing;
        match action {
            LoginAction::FindPrompt { delay } => {
                self.settle(delay).await;
                self.login_prompt(timing.prompt_timeout).await
            }
            LoginAction::ReturnAndFindPrompt => {
                self.send_return()?;
                self.login_prompt(timing.prompt_timeout).await
            }
            LoginAction::Send {
                command,
                wrap_in_returns,
                settle,
                then_return,
            } => {
                debug!("login: sending {:?}", command);
                let ret = self.settings().return_sequence.clone();
                let text = if wrap_in_returns {
                    format!("{ret}{command}{ret}")
                } else {
                    format!("{command}{ret}")
                };
                self.write_channel(&text)?;
                self.settle(settle).await;
                if then_return {
                    self.send_return()?;
                }
                Ok(self.read_channel())
            }
            LoginAction::SendCredential {
                kind,
                terminator,
                delay_before,
                settle,
            } => {
                self.settle(delay_before).await;
                let ending = match terminator {
                    Terminator::Credential => rules.credential_terminator.clone(),
                    Terminator::Return => self.settings().return_sequence.clone(),
                };
                match kind {
                    CredentialKind::Username => {
                        debug!("login: sending username {}", credentials.username);
                        self.write_channel(&format!("{}{}", credentials.username, ending))?;
                    }
                    CredentialKind::Password { alternate } => {
                        debug!("login: sending password (alternate: {})", alternate);
                        let secret = match (&rules.alternate_password, alternate) {
                            (Some(password), true) => SecretString::from(password.clone()),
                            _ => credentials.password.clone(),
                        };
                        self.write_secret_with(&secret, &ending)?;
                    }
                }
                self.settle(settle).await;
                Ok(self.read_channel())
            }
            LoginAction::SubsystemLogin => {
                info!("subsystem login banner seen");
                self.bmc_login().await?;
                self.bmc_to_bsp().await?;
                self.login_prompt(timing.prompt_timeout).await
            }
            LoginAction::AnswerInitialDialog => {
                info!("declining the initial configuration dialog");
                self.write_line("no")?;
                self.settle(timing.short_settle).await;
                let mut seen = String::new();
                for _ in 0..timing.dialog_reads {
                    let output = self.read_channel();
                    seen.push_str(&output);
                    if output.contains(GET_STARTED_MARKER) {
                        // The caller sees an empty read and finds the prompt.
                        return Ok(String::new());
                    }
                    self.settle(timing.dialog_poll).await;
                }
                Ok(seen)
            }
        }
    }

    /// Prompt detection that treats "no prompt" as empty output.
    pub(super) async fn login_prompt(&mut self, timeout: Duration) -> Result<String> {
        match self.find_prompt_within(timeout).await {
            Err(e) if e.is_prompt_not_found() => {
                debug!("no prompt during login: {}", e);
                Ok(String::new())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedChannel;
    use crate::platform::Platform;
    use tokio_test::assert_ok;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn xr_rules() -> LoginRules {
        Platform::CiscoXr.definition().login.rules().clone()
    }

    fn rules_timing() -> LoginTiming {
        xr_rules().timing
    }

    fn first(rules: &LoginRules, output: &str) -> Option<Transition> {
        rules
            .next_transition(
                &rules.sequence(),
                0,
                &LoginState::AwaitingOutput,
                &LoginContext::default(),
                output,
            )
            .map(|(_, t)| t)
    }

    fn session(channel: ScriptedChannel) -> Session<ScriptedChannel> {
        Session::new(channel, Platform::CiscoXr)
            .with_credentials(Credentials::new("admin", "secret"))
            .with_host("console-1")
    }

    #[test]
    fn test_sequence_order() {
        let sequence = xr_rules().sequence();
        let pos = |rule: LoginRule| sequence.iter().position(|r| *r == rule).unwrap();
        assert_eq!(sequence[0], LoginRule::EmptyOutput);
        assert!(pos(LoginRule::ReadyPrompt) < pos(LoginRule::Standby));
        assert!(pos(LoginRule::Standby) < pos(LoginRule::Username));
        assert!(pos(LoginRule::Username) < pos(LoginRule::Password));
        assert!(pos(LoginRule::MarkSubsystem) < pos(LoginRule::Terminators));
        assert_eq!(*sequence.last().unwrap(), LoginRule::Terminators);
    }

    #[test]
    fn test_username_prompt_transition() {
        let rules = xr_rules();
        let t = first(&rules, "\r\nUser Access Verification\r\n\r\nUsername: ").unwrap();
        assert_eq!(t.rule, LoginRule::Username);
        assert_eq!(
            t.state,
            LoginState::SawUsernamePrompt {
                alternate_password: false
            }
        );

        let t = first(&rules, "spitfire-arm login: ").unwrap();
        assert_eq!(
            t.state,
            LoginState::SawUsernamePrompt {
                alternate_password: true
            }
        );
    }

    #[test]
    fn test_password_uses_alternate_after_subsystem_banner() {
        let rules = xr_rules();
        let state = LoginState::SawUsernamePrompt {
            alternate_password: true,
        };
        let t = rules
            .evaluate(LoginRule::Password, &state, &LoginContext::default(), "Password: ")
            .unwrap();
        assert!(matches!(
            t.action,
            Some(LoginAction::SendCredential {
                kind: CredentialKind::Password { alternate: true },
                ..
            })
        ));
    }

    #[test]
    fn test_terminal_states() {
        let rules = xr_rules();
        assert_eq!(
            first(&rules, "RP/0/RP0/CPU0:R1#").unwrap().state,
            LoginState::Done { standby: false }
        );
        assert_eq!(
            first(&rules, "This (D)RP Node is not ready or active for login /configuration")
                .unwrap()
                .state,
            LoginState::Done { standby: true }
        );
        assert!(matches!(
            first(&rules, "% Password required, but none set").unwrap().state,
            LoginState::Failed { .. }
        ));
        assert_eq!(first(&rules, "nothing useful"), None);
    }

    #[test]
    fn test_alt_prompt_after_subsystem_is_not_done() {
        let rules = xr_rules();
        let ctx = LoginContext {
            subsystem_seen: true,
        };
        let state = LoginState::AwaitingOutput;
        assert!(rules
            .evaluate(LoginRule::Terminators, &state, &ctx, "host>")
            .is_none());
        assert!(rules
            .evaluate(LoginRule::Terminators, &state, &LoginContext::default(), "host>")
            .is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_username_password_login() {
        let mut channel = ScriptedChannel::new()
            .reply("admin", "\r\nPassword: ")
            .reply("secret", "\r\nRP/0/RP0/CPU0:R1#");
        channel.push_output("\r\nUser Access Verification\r\n\r\nUsername: ");
        init_logging();
        let mut session = session(channel);

        let report = assert_ok!(session.login().await);
        assert!(!report.standby);
        assert!(report.transcript.ends_with("RP/0/RP0/CPU0:R1#"));
        assert_eq!(session.channel().written(), &["admin\r", "secret\r"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_standby_console_succeeds_with_caveat() {
        let mut channel = ScriptedChannel::new();
        channel.push_output("This (D)RP Node is not ready or active for login /configuration");
        let mut session = session(channel);

        let report = session.login().await.unwrap();
        assert!(report.standby);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_password_set_fails_and_closes() {
        let mut channel = ScriptedChannel::new();
        channel.push_output("\r\n% Password required, but none set\r\n");
        let mut session = session(channel);

        let err = session.login().await.unwrap_err();
        assert!(err.is_authentication_failure());
        assert!(session.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_dialog_fails() {
        let mut session = session(ScriptedChannel::new().reply("", "garbage"));

        let err = session.login().await.unwrap_err();
        assert!(err.is_authentication_failure());
        assert!(session.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_of_stream_is_authentication_failure() {
        let mut channel = ScriptedChannel::new().closing_on("admin");
        channel.push_output("Username: ");
        let mut session = session(channel);

        let err = session.login().await.unwrap_err();
        assert!(err.is_authentication_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_linux_shell_switches_to_xr() {
        let mut channel = ScriptedChannel::new()
            .reply("xr", "xr\r\nUsername: ")
            .reply("admin", "\r\nPassword: ")
            .reply("secret", "\r\nRP/0/RP0/CPU0:R1#");
        channel.push_output("\r\n[xr:~]$ ");
        init_logging();
        let mut session = session(channel);

        assert_ok!(session.login().await);
        let written = session.channel().written_lines();
        assert_eq!(written, vec!["xr", "admin", "secret"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_libraries_restart_routing() {
        let mut channel = ScriptedChannel::new().reply("", "\r\nRP/0/RP0/CPU0:R1#");
        channel.push_output("exec: error while loading shared libraries: libinfra.so\r\n");
        let mut session = session(channel);

        let start = Instant::now();
        assert_ok!(session.login().await);
        assert_eq!(
            session.channel().written(),
            &["initctl start ios-xr.routing.start\n", "\n"]
        );
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_password_reprompt_resends_with_return() {
        let mut channel = ScriptedChannel::new()
            .reply("admin", "\r\nPassword: ")
            .reply_once("secret", "\r\n% Authentication failed\r\nPassword: ")
            .reply("secret", "\r\nRP/0/RP0/CPU0:R1#");
        channel.push_output("Username: ");
        let mut session = session(channel);

        assert_ok!(session.login().await);
        assert_eq!(
            session.channel().written(),
            &["admin\r", "secret\r", "secret\n"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bmc_shell_detaches_with_ctrl_w() {
        let mut channel = ScriptedChannel::new().reply("\x17", "\r\nRP/0/RP0/CPU0:R1#");
        channel.push_output("\r\nroot@spitfire-arm:~# ");
        init_logging();
        let mut session = session(channel);

        let report = assert_ok!(session.login().await);
        assert!(report.transcript.ends_with("RP/0/RP0/CPU0:R1#"));
        assert_eq!(session.channel().written(), &["\n\x17\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebooted_bmc_boots_the_host() {
        let mut channel = ScriptedChannel::new().reply("", "\r\nRP/0/RP0/CPU0:R1#");
        channel.push_output("\r\ncisco-bmc# ");
        let mut session = session(channel);

        assert_ok!(session.login().await);
        assert_eq!(session.channel().written(), &["\nboot\n", "\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_dialog_is_declined() {
        let mut channel = ScriptedChannel::new()
            .reply_chunks(
                "no",
                &["no\r\n", "\r\nPress RETURN to get started.\r\n"],
            )
            .reply("", "\r\nRP/0/RP0/CPU0:R1#");
        channel.push_output(
            "Would you like to enter the initial configuration dialog? [yes/no]: ",
        );
        let mut session = session(channel);

        let start = Instant::now();
        let report = assert_ok!(session.login().await);
        assert!(report.transcript.ends_with("RP/0/RP0/CPU0:R1#"));
        assert_eq!(session.channel().written_lines(), vec!["no", ""]);
        assert!(start.elapsed() >= rules_timing().dialog_poll);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_started_sends_return() {
        let mut channel = ScriptedChannel::new().reply("", "\r\nRP/0/RP0/CPU0:R1#");
        channel.push_output("\r\nSYSTEM CONFIGURATION COMPLETED\r\nPress RETURN to get started.");
        let mut session = session(channel);

        assert_ok!(session.login().await);
        assert_eq!(session.channel().written_lines(), vec![""]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_return_between_passes_wakes_console() {
        let rules = xr_rules();
        // Prompt detection inside the first pass gets no answer.
        let mut channel = ScriptedChannel::new();
        for _ in 0..rules.budget.loops_per_pass() {
            channel = channel.reply_chunks_once("", &[]);
        }
        let channel = channel.reply("", "\r\nRP/0/RP0/CPU0:R1#");
        let mut session = session(channel);

        let report = assert_ok!(session.login().await);
        assert!(report.transcript.ends_with("RP/0/RP0/CPU0:R1#"));
        let written = session.channel().written_lines();
        assert_eq!(written.len(), rules.budget.loops_per_pass() + 1);
        assert!(written.iter().all(|w| w.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_serial_login_at_prompt_skips_dialog() {
        let mut session = session(ScriptedChannel::new().reply("", "\r\nRP/0/RP0/CPU0:R1#"));
        let report = session.serial_login().await.unwrap();
        assert!(report.transcript.contains("RP/0/RP0/CPU0:R1#"));
        assert_eq!(session.channel().written_lines(), vec![""]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_credentials_fail() {
        let mut session = Session::new(ScriptedChannel::new(), Platform::CiscoXr);
        assert!(session.login().await.unwrap_err().is_authentication_failure());
    }
}
