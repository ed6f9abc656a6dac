//! Error types for netdialog.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for netdialog operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel waiting and matching errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Dialog-level errors (login, config mode, commit)
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Platform/vendor errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

impl Error {
    /// The channel closed while an operation was waiting on it.
    pub fn is_session_down(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::SessionDown { .. }))
    }

    /// A wait ran out of time before its pattern appeared.
    pub fn is_pattern_not_found(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::PatternNotFound { .. }))
    }

    /// No stable prompt could be detected.
    pub fn is_prompt_not_found(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::PromptNotFound { .. }))
    }

    /// Login negotiation gave up.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Error::Driver(DriverError::AuthenticationFailed { .. })
                | Error::Transport(TransportError::AuthenticationFailed { .. })
        )
    }

    /// The device rejected or refused a commit.
    pub fn is_commit_error(&self) -> bool {
        matches!(self, Error::Driver(DriverError::ConfigCommit { .. }))
    }

    /// Caller-supplied options contradict each other.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::Driver(DriverError::InvalidArgument { .. }))
    }

    /// Rename what the caller was doing on wait errors.
    pub(crate) fn in_context(mut self, what: &str) -> Self {
        if let Error::Channel(
            ChannelError::SessionDown { context } | ChannelError::PatternNotFound { context, .. },
        ) = &mut self
        {
            *context = what.to_string();
        }
        self
    }
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// SSH-level authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key is not in known_hosts and strict checking is on
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection setup timed out
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors raised by pattern and prompt waits.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The channel closed while waiting for a prompt or pattern.
    #[error("Session went down while {context}")]
    SessionDown { context: String },

    /// No stable, non-transient prompt within the read timeout.
    #[error("Prompt not found after waiting {waited:?} (last seen: {last_seen:?})")]
    PromptNotFound { waited: Duration, last_seen: String },

    /// The expected pattern never appeared.
    #[error(
        "Search pattern not found while {context} after waiting {waited:?}. Expected pattern: {pattern}. Output: {output}"
    )]
    PatternNotFound {
        context: String,
        pattern: String,
        output: String,
        waited: Duration,
    },

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Dialog-level errors (login, config mode transitions, commit).
#[derive(Error, Debug)]
pub enum DriverError {
    /// Login dialog exhausted, password missing, or end-of-stream during login.
    #[error("Login failed for {host}: {reason}")]
    AuthenticationFailed { host: String, reason: String },

    /// Config prompt matched but the mode check still reports exec mode.
    #[error("Failed to enter configuration mode")]
    ConfigModeEnter,

    /// Exit prompt matched but the mode check still reports config mode.
    #[error("Failed to exit configuration mode")]
    ConfigModeExit,

    /// Device-reported commit failure or unresolved cross-session conflict.
    #[error("{message}:\n\n{output}")]
    ConfigCommit { message: String, output: String },

    /// Self-contradictory caller options, detected before any I/O.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Switching between sub-system shells did not reach the target prompt.
    #[error("{from} to {to} switch failed, last prompt {prompt:?}")]
    ModeSwitchFailed {
        from: String,
        to: String,
        prompt: String,
    },

    /// Output did not have the shape an operation needs.
    #[error("Unexpected output from '{command}': {output}")]
    UnexpectedOutput { command: String, output: String },
}

impl DriverError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        DriverError::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Platform/vendor definition errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Platform name is not known
    #[error("Unknown platform: {name}")]
    UnknownPlatform { name: String },

    /// Invalid platform definition
    #[error("Invalid platform definition: {message}")]
    InvalidDefinition { message: String },

    /// The platform has no dialog for this operation
    #[error("{platform} does not support {operation}")]
    Unsupported { platform: String, operation: String },
}

/// Result type alias using netdialog's Error.
pub type Result<T> = std::result::Result<T, Error>;
