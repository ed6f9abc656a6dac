//! SSH transport layer wrapping russh.
//!
//! [`SshTransport`] owns the connection and authentication;
//! [`SshChannel`] turns an interactive shell on it into a [`Channel`].
//!
//! [`Channel`]: crate::channel::Channel

pub mod config;
mod shell;
mod ssh;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use shell::SshChannel;
pub use ssh::SshTransport;
