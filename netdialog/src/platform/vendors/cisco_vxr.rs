//! Cisco IOS-XR (virtual router) platform definition.
//!
//! Same CLI as [`cisco_xr`](super::cisco_xr), reached over SSH. Config mode
//! is entered with `config term` and the commit dialog asks no
//! confirmation question.

use std::sync::Arc;

use super::cisco_xr::{self, XrCommit, XrLogin, XrPrompt};
use crate::channel::PatternSpec;
use crate::driver::ConfigModeProfile;
use crate::platform::PlatformDefinition;

pub const PLATFORM_NAME: &str = "cisco_vxr";

fn config_mode() -> ConfigModeProfile {
    ConfigModeProfile {
        enter_command: "config term".into(),
        enter_suffix: "config".into(),
        exit_pattern: PatternSpec::new(r"(Uncommitted|#$)").unwrap(),
        after_discard_pattern: PatternSpec::new(r"#$").unwrap(),
        ..cisco_xr::config_mode()
    }
}

/// Create the Cisco IOS-XR virtual router platform definition.
pub fn platform() -> PlatformDefinition {
    PlatformDefinition::new(
        PLATFORM_NAME,
        Arc::new(XrPrompt {
            config: config_mode(),
        }),
        Arc::new(XrLogin {
            rules: cisco_xr::login_rules(),
        }),
    )
    .with_commit(Arc::new(XrCommit {
        profile: cisco_xr::commit_profile(),
    }))
    .with_on_open_command("terminal width 511")
    .with_on_open_command("terminal length 0")
}
