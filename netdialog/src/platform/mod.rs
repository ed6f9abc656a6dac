//! Platform definitions for the supported Cisco families.
//!
//! A platform is a composition of three strategies: how prompts and
//! config mode look, how a console login dialog is negotiated, and how a
//! commit is built and answered. Each strategy is plain data behind a
//! trait so a vendor can override a single behavior without touching the
//! dialog engine.

mod definition;
pub mod vendors;

pub use definition::{Platform, PlatformDefinition};

use crate::driver::{CommitProfile, CommitRequest, ConfigModeProfile, LoginRules};
use crate::error::Result;

/// Banners that may arrive asynchronously and must never be taken for a prompt.
pub const DEFAULT_TRANSIENT_BANNERS: &[&str] =
    &["last login", "executing autocommand", "last switch-over"];

/// Prompt shape and config mode behavior.
pub trait PromptStrategy: Send + Sync {
    /// Characters a stable prompt may end with.
    fn terminators(&self) -> &[char] {
        &['#', '>']
    }

    /// Case-insensitive markers of asynchronous banners.
    fn transient_banners(&self) -> &[&str] {
        DEFAULT_TRANSIENT_BANNERS
    }

    /// Marker of a standby route processor that refuses logins.
    ///
    /// A prompt containing it is accepted verbatim as the base prompt.
    fn standby_marker(&self) -> Option<&str> {
        None
    }

    /// Pattern matching any usable prompt, used to sync after connecting.
    fn ready_pattern(&self) -> &str {
        r"[>#]"
    }

    /// Config mode dialog details.
    fn config_mode(&self) -> &ConfigModeProfile;
}

/// Console login negotiation.
pub trait LoginStrategy: Send + Sync {
    /// The ordered login rule set.
    fn rules(&self) -> &LoginRules;
}

/// Commit command construction and dialog.
pub trait CommitStrategy: Send + Sync {
    /// Dialog markers and replies.
    fn profile(&self) -> &CommitProfile;

    /// Build the commit command, rejecting contradictory options.
    fn build_command(&self, request: &CommitRequest) -> Result<String> {
        request.command()
    }
}
