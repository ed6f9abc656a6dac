//! Dialog engine for interactive device CLIs.
//!
//! Every operation lives on [`Session`] and is split by concern:
//!
//! - [`prompt`]: idle prompt detection and the base prompt
//! - [`command`]: sending a command and reading to its completion pattern
//! - [`config_mode`]: entering and leaving configuration mode
//! - [`commit`]: building and answering the commit dialog
//! - [`login`]: console login negotiation
//! - [`subsystem`]: management controller shells on BSP consoles

mod builder;
pub mod command;
pub mod commit;
pub mod config_mode;
mod legacy;
pub mod login;
mod md5;
pub mod prompt;
pub(crate) mod response;
pub mod sanitize;
mod session;
pub mod subsystem;

pub use builder::SessionBuilder;
pub use command::{CommandOptions, LARGE_CONFIG_BANNER};
pub use commit::{CommitProfile, CommitRequest};
pub use config_mode::{ConfigModeProfile, ConfigSetOptions};
pub use legacy::LegacyTiming;
pub use login::{
    LoginBudget, LoginContext, LoginReport, LoginRule, LoginRules, LoginState, LoginTiming,
    ModeSwitch,
};
pub use md5::process_md5;
pub use prompt::{PromptDetector, last_line};
pub use response::Response;
pub use sanitize::{normalize_linefeeds, strip_command, strip_prompt};
pub use session::{Credentials, Session, SessionSettings};
pub use subsystem::SubsystemLogin;
