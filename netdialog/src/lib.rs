//! # netdialog
//!
//! Async prompt synchronization and dialog automation for Cisco IOS-XR,
//! XR virtual router, and BSP command lines.
//!
//! A [`Session`] drives one interactive CLI over a [`channel::Channel`]:
//! it finds the idle prompt while ignoring asynchronous banners, sends
//! commands and reads to a completion pattern, moves in and out of
//! configuration mode, runs the commit dialog, and negotiates console
//! logins that may start on a management controller or host shell.
//!
//! ## Features
//!
//! - Async SSH shells via russh, or any [`channel::Channel`]
//! - Prompt detection robust to `Last login`, autocommand and switch-over banners
//! - Commit with confirm, label, comment, replace, and conflict dialogs
//! - Console login rules for route processors, BMC and x86 host shells
//! - Scripted channel for testing dialogs without a device
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netdialog::{CommitRequest, ConfigSetOptions, Platform, SessionBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netdialog::Error> {
//!     let mut session = SessionBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .platform(Platform::CiscoXr)
//!         .connect()
//!         .await?;
//!
//!     session
//!         .send_config_set(
//!             &["interface Loopback0", "description managed"],
//!             ConfigSetOptions::default(),
//!         )
//!         .await?;
//!     session.commit(&CommitRequest::new().comment("netdialog")).await?;
//!     session.cleanup("exit").await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod platform;
pub mod transport;

pub use driver::{
    CommandOptions, CommitRequest, ConfigSetOptions, Credentials, LegacyTiming, LoginReport,
    Response, Session, SessionBuilder, SessionSettings,
};
pub use error::{Error, Result};
pub use platform::{Platform, PlatformDefinition};
pub use transport::{AuthMethod, HostKeyVerification, SshChannel, SshConfig};
