//! Cisco IOS-XR platform definition.
//!
//! # Prompt Examples
//!
//! ```text
//! RP/0/RP0/CPU0:R1#                  # exec mode
//! RP/0/RP0/CPU0:R1(config)#          # configuration mode
//! RP/0/RP0/CPU0:R1(config-if)#       # config sub-mode
//! RP/0/RP0/CPU0:R1(admin)#           # admin exec, not config mode
//! This (D)RP Node is not ready or active for login /configuration
//! ```
//!
//! Consoles can also land on the management controller shell, the x86
//! host shell, or a nested exec session; the login rules walk each of
//! those back to the XR CLI.

use std::sync::Arc;
use std::time::Duration;

use crate::channel::PatternSpec;
use crate::driver::{
    CommitProfile, ConfigModeProfile, LoginBudget, LoginRules, LoginTiming, ModeSwitch,
};
use crate::platform::{CommitStrategy, LoginStrategy, PlatformDefinition, PromptStrategy};

pub const PLATFORM_NAME: &str = "cisco_xr";

/// Prompt of a standby route processor.
pub const STANDBY_MARKER: &str = "RP Node is not ";

/// Password of the management controller shell reached from an XR console.
const BMC_PASSWORD: &str = "0penBmc";

pub(crate) struct XrPrompt {
    pub(crate) config: ConfigModeProfile,
}

impl PromptStrategy for XrPrompt {
    fn standby_marker(&self) -> Option<&str> {
        Some(STANDBY_MARKER)
    }

    fn config_mode(&self) -> &ConfigModeProfile {
        &self.config
    }
}

pub(crate) struct XrLogin {
    pub(crate) rules: LoginRules,
}

impl LoginStrategy for XrLogin {
    fn rules(&self) -> &LoginRules {
        &self.rules
    }
}

pub(crate) struct XrCommit {
    pub(crate) profile: CommitProfile,
}

impl CommitStrategy for XrCommit {
    fn profile(&self) -> &CommitProfile {
        &self.profile
    }
}

pub(crate) fn config_mode() -> ConfigModeProfile {
    ConfigModeProfile {
        check_string: ")#".into(),
        check_pattern: PatternSpec::new(r"[#\$]").unwrap(),
        ignore_markers: vec!["(admin)".into()],
        enter_command: "configure terminal".into(),
        prompt_prefix_len: 16,
        enter_suffix: regex::escape(")#"),
        exit_command: "end".into(),
        exit_pattern: PatternSpec::new(r"(Uncommitted|#\s*$)").unwrap(),
        uncommitted_marker: "Uncommitted".into(),
        discard_reply: "no".into(),
        after_discard_pattern: PatternSpec::new(r"[>#]").unwrap(),
        config_prompt: PatternSpec::new(r"\)#$").unwrap(),
    }
}

pub(crate) fn commit_profile() -> CommitProfile {
    CommitProfile {
        failure_marker: "Failed to".into(),
        conflict_marker: "One or more commits have occurred from other".into(),
        replace_warning: "This commit will replace or remove the entire running configuration"
            .into(),
        confirm_prompt: None,
        confirm_reply: "y".into(),
        replace_reply: "yes".into(),
        decline_reply: "no".into(),
        enter_config_first: false,
        read_timeout: None,
    }
}

fn switch(name: &str, banner: &str, command: &str, settle: Duration) -> ModeSwitch {
    ModeSwitch {
        name: name.into(),
        banner: PatternSpec::new(banner).unwrap(),
        command: command.into(),
        wrap_in_returns: true,
        settle,
        then_return: false,
        exits_shell: false,
    }
}

/// Console login rules shared by the XR family.
pub(crate) fn login_rules() -> LoginRules {
    let second = Duration::from_secs(1);
    let minute = Duration::from_secs(60);

    let rebooted_bmc = ModeSwitch {
        then_return: true,
        ..switch("rebooted BMC", r"cisco-bmc#", "boot", minute)
    };
    let bmc_shell = switch("BMC shell", r"root@spitfire-arm:~#", "\x17", second);
    let host_shell = switch(
        "host shell",
        r"(\[xr:~\]\$)|(\[[\w\-]+:~\]\$$)|(\S+@xr:~#)|(\S+@ios:~#)",
        "xr",
        second,
    );
    let nested_exec = ModeSwitch {
        exits_shell: true,
        ..switch(
            "nested exec",
            r"Exec cannot be started from within an existing exec session",
            "exit",
            second,
        )
    };
    let restart = ModeSwitch {
        wrap_in_returns: false,
        then_return: true,
        ..switch(
            "routing restart",
            r"(error while loading shared libraries)|(cannot open shared object)",
            "initctl start ios-xr.routing.start",
            minute,
        )
    };

    LoginRules {
        pri_prompt: PatternSpec::multiline(r"\#\s*$").unwrap(),
        alt_prompt: PatternSpec::multiline(r">\s*$").unwrap(),
        username: PatternSpec::case_insensitive(r"(?:user:|username|login|user name)").unwrap(),
        password: PatternSpec::case_insensitive(r"assword|ecret").unwrap(),
        ready_prompt: Some(PatternSpec::multiline(r"RP/\d+/RP\d+/CPU\d+:\S*#$").unwrap()),
        probe_password_prompt: false,
        subsystem: None,
        mode_switches: vec![rebooted_bmc, bmc_shell, host_shell, nested_exec, restart],
        standby: Some(PatternSpec::new(r"RP Node is not ready or active for login").unwrap()),
        alternate_password_banner: Some(PatternSpec::new(r"spitfire-arm login:").unwrap()),
        alternate_password: Some(BMC_PASSWORD.into()),
        direct_login: Some(PatternSpec::new(r"xr login:|ios login:").unwrap()),
        get_started: Some(PatternSpec::new(r"Press RETURN to get started\.$").unwrap()),
        initial_dialog: Some(
            PatternSpec::new(r"initial configuration dialog\? \[yes/no\]: ").unwrap(),
        ),
        no_password_set: PatternSpec::new(r"assword required, but none set").unwrap(),
        subsystem_markers: vec![
            PatternSpec::new(r"cisco-bmc#").unwrap(),
            PatternSpec::new(r"root@spitfire-arm:~#").unwrap(),
            PatternSpec::new(r"(\S+@xr:~#)|(\S+@ios:~#)").unwrap(),
        ],
        credential_terminator: "\r".into(),
        budget: LoginBudget {
            passes: 3,
            max_loops: 20,
            deadline: None,
            reset_between_passes: true,
            return_each_iteration: false,
        },
        timing: LoginTiming::default(),
    }
}

/// Create the Cisco IOS-XR platform definition.
pub fn platform() -> PlatformDefinition {
    let commit = CommitProfile {
        confirm_prompt: Some(PatternSpec::new(r"\[y/n\]").unwrap()),
        enter_config_first: true,
        read_timeout: Some(Duration::from_secs(120)),
        ..commit_profile()
    };

    PlatformDefinition::new(
        PLATFORM_NAME,
        Arc::new(XrPrompt {
            config: config_mode(),
        }),
        Arc::new(XrLogin {
            rules: login_rules(),
        }),
    )
    .with_commit(Arc::new(XrCommit { profile: commit }))
    .with_on_open_command("terminal width 511")
    .with_on_open_command("terminal length 0")
    .with_terminal_size(511, 511)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xr_platform() {
        let platform = platform();
        assert_eq!(platform.name, "cisco_xr");
        assert_eq!(
            platform.on_open_commands,
            vec!["terminal width 511", "terminal length 0"]
        );
        assert_eq!(platform.prompt.standby_marker(), Some("RP Node is not "));
        let commit = platform.commit.as_ref().unwrap().profile();
        assert!(commit.enter_config_first);
        assert_eq!(commit.read_timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_config_prompt_match() {
        let config = config_mode();
        assert!(config.config_prompt.is_match("RP/0/RP0/CPU0:R1(config)#"));
        assert!(config.config_prompt.is_match("RP/0/RP0/CPU0:R1(config-if)#"));
        assert!(!config.config_prompt.is_match("RP/0/RP0/CPU0:R1#"));
    }

    #[test]
    fn test_login_patterns() {
        let rules = login_rules();
        assert!(rules.username.is_match("Username: "));
        assert!(rules.username.is_match("USER NAME:"));
        assert!(rules.password.is_match("Secret:"));
        assert!(rules.mode_switches[2].banner.is_match("[xr:~]$ "));
        assert!(rules.mode_switches[2].banner.is_match("root@xr:~#"));
        assert!(!rules.at_any_prompt("Username: "));
        assert!(rules.at_any_prompt("RP/0/RP0/CPU0:R1#\r\n"));
    }
}
