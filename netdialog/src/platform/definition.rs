//! Platform definition and the built-in platform catalog.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::vendors::{cisco_bsp, cisco_vxr, cisco_xr};
use super::{CommitStrategy, LoginStrategy, PromptStrategy};
use crate::error::PlatformError;

/// Composed behavior for one device family.
#[derive(Clone)]
pub struct PlatformDefinition {
    /// Platform name (e.g., "cisco_xr").
    pub name: String,

    /// Prompt and config mode behavior.
    pub prompt: Arc<dyn PromptStrategy>,

    /// Console login negotiation.
    pub login: Arc<dyn LoginStrategy>,

    /// Commit dialog; `None` when the platform has no commit.
    pub commit: Option<Arc<dyn CommitStrategy>>,

    /// Commands run once the base prompt is known.
    pub on_open_commands: Vec<String>,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,
}

impl PlatformDefinition {
    /// Create a definition from its prompt and login strategies.
    pub fn new(
        name: impl Into<String>,
        prompt: Arc<dyn PromptStrategy>,
        login: Arc<dyn LoginStrategy>,
    ) -> Self {
        Self {
            name: name.into(),
            prompt,
            login,
            commit: None,
            on_open_commands: vec![],
            terminal_width: 511,
            terminal_height: 24,
        }
    }

    /// Set the commit strategy.
    pub fn with_commit(mut self, commit: Arc<dyn CommitStrategy>) -> Self {
        self.commit = Some(commit);
        self
    }

    /// Add an on_open command.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Set terminal dimensions.
    pub fn with_terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }
}

impl fmt::Debug for PlatformDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformDefinition")
            .field("name", &self.name)
            .field("config_mode", self.prompt.config_mode())
            .field("commit", &self.commit.as_ref().map(|c| c.profile()))
            .field("on_open_commands", &self.on_open_commands)
            .field("terminal_width", &self.terminal_width)
            .field("terminal_height", &self.terminal_height)
            .finish_non_exhaustive()
    }
}

/// Built-in platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// IOS-XR over SSH or console.
    CiscoXr,
    /// Virtual XR router reached over a console server.
    CiscoVxr,
    /// Linux BSP shell behind a BMC console.
    CiscoBsp,
}

impl Platform {
    /// All built-in platforms.
    pub const ALL: [Platform; 3] = [Platform::CiscoXr, Platform::CiscoVxr, Platform::CiscoBsp];

    /// Registered name.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::CiscoXr => cisco_xr::PLATFORM_NAME,
            Platform::CiscoVxr => cisco_vxr::PLATFORM_NAME,
            Platform::CiscoBsp => cisco_bsp::PLATFORM_NAME,
        }
    }

    /// Build the platform definition.
    pub fn definition(&self) -> PlatformDefinition {
        match self {
            Platform::CiscoXr => cisco_xr::platform(),
            Platform::CiscoVxr => cisco_vxr::platform(),
            Platform::CiscoBsp => cisco_bsp::platform(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| PlatformError::UnknownPlatform {
                name: s.to_string(),
            })
    }
}

impl From<Platform> for PlatformDefinition {
    fn from(platform: Platform) -> Self {
        platform.definition()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_names_round_trip() {
        for platform in Platform::ALL {
            assert_eq!(platform.name().parse::<Platform>().unwrap(), platform);
            assert_eq!(platform.definition().name, platform.name());
        }
        assert!("cisco_ios".parse::<Platform>().is_err());
    }

    #[test]
    fn test_bsp_has_no_commit() {
        assert!(Platform::CiscoBsp.definition().commit.is_none());
        assert!(Platform::CiscoXr.definition().commit.is_some());
    }
}
