//! Cisco BSP (board support package) Linux shell.
//!
//! # Prompt Examples
//!
//! ```text
//! [root@bsp ~]#                      # root shell
//! [cisco@bsp ~]$                     # non-root shell
//! root@bmc:~#                        # management controller shell
//! ```
//!
//! There is no configuration commit. The console may land on the BMC,
//! which needs its own login before `sol.sh` attaches to the board.

use std::sync::Arc;
use std::time::Duration;

use crate::channel::PatternSpec;
use crate::driver::{
    ConfigModeProfile, LoginBudget, LoginRules, LoginTiming, SubsystemLogin,
};
use crate::platform::{LoginStrategy, PlatformDefinition, PromptStrategy};

pub const PLATFORM_NAME: &str = "cisco_bsp";

struct BspPrompt {
    config: ConfigModeProfile,
}

impl PromptStrategy for BspPrompt {
    fn terminators(&self) -> &[char] {
        &['#', '$']
    }

    fn ready_pattern(&self) -> &str {
        r"[#\$]"
    }

    fn config_mode(&self) -> &ConfigModeProfile {
        &self.config
    }
}

struct BspLogin {
    rules: LoginRules,
}

impl LoginStrategy for BspLogin {
    fn rules(&self) -> &LoginRules {
        &self.rules
    }
}

fn config_mode() -> ConfigModeProfile {
    ConfigModeProfile {
        check_string: ")#".into(),
        check_pattern: PatternSpec::new(r"[#\$]").unwrap(),
        ignore_markers: vec![],
        enter_command: "configure terminal".into(),
        prompt_prefix_len: 16,
        enter_suffix: regex::escape(")#"),
        exit_command: "end".into(),
        exit_pattern: PatternSpec::new(r"[#\$]\s*$").unwrap(),
        uncommitted_marker: "Uncommitted".into(),
        discard_reply: "no".into(),
        after_discard_pattern: PatternSpec::new(r"[#\$]").unwrap(),
        config_prompt: PatternSpec::new(r"\)#$").unwrap(),
    }
}

fn bmc() -> SubsystemLogin {
    SubsystemLogin {
        name: "BMC".into(),
        primary_name: "BSP".into(),
        banner: PatternSpec::new("bmc").unwrap(),
        username: "root".into(),
        password: "0penBmc".into(),
        username_prompt: PatternSpec::new("login").unwrap(),
        password_prompt: PatternSpec::new("assword").unwrap(),
        prompt: PatternSpec::new(r"\s*\#").unwrap(),
        primary_prompt: PatternSpec::new(r"]\s*\#").unwrap(),
        enter_command: "/usr/local/bin/sol.sh".into(),
        leave_key: "\x0c".into(),
        leave_command: "x".into(),
        timeout: Duration::from_secs(10),
    }
}

fn login_rules() -> LoginRules {
    LoginRules {
        pri_prompt: PatternSpec::multiline(r"]\s*\#").unwrap(),
        alt_prompt: PatternSpec::multiline(r"]\s*\$").unwrap(),
        username: PatternSpec::new("login").unwrap(),
        password: PatternSpec::new("assword").unwrap(),
        ready_prompt: None,
        probe_password_prompt: true,
        subsystem: Some(bmc()),
        mode_switches: vec![],
        standby: None,
        alternate_password_banner: None,
        alternate_password: None,
        direct_login: None,
        get_started: None,
        initial_dialog: None,
        no_password_set: PatternSpec::new(r"assword required, but none set").unwrap(),
        subsystem_markers: vec![],
        credential_terminator: "\n".into(),
        budget: LoginBudget {
            passes: 1,
            max_loops: usize::MAX,
            deadline: Some(Duration::from_secs(10)),
            reset_between_passes: false,
            return_each_iteration: true,
        },
        timing: LoginTiming {
            last_try_delay: Duration::from_secs(5),
            ..LoginTiming::default()
        },
    }
}

/// Create the Cisco BSP platform definition.
pub fn platform() -> PlatformDefinition {
    PlatformDefinition::new(
        PLATFORM_NAME,
        Arc::new(BspPrompt {
            config: config_mode(),
        }),
        Arc::new(BspLogin {
            rules: login_rules(),
        }),
    )
}
