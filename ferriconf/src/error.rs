//! Error types for ferriconf.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::session::Mode;

/// Main error type for ferriconf operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Byte-stream transport errors (Telnet socket, SSH shell channel)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session engine errors (prompt waits, mode transitions, device output)
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Config tree errors (feature sets, attachment state, node values)
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether this error means the device is unreachable or stopped answering.
    ///
    /// These are the errors `suppress_connection_errors` turns into a
    /// failed response instead of an `Err`.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Session(err) => matches!(
                err,
                SessionError::PromptNotFound { .. } | SessionError::CommandTimeout { .. }
            ),
            Error::Config(_) => false,
        }
    }

    /// Whether this error is an in-band error reported by the device itself.
    pub fn is_device_error(&self) -> bool {
        matches!(self, Error::Session(SessionError::Device { .. }))
    }
}

/// Transport layer errors (connection, authentication, stream state).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key not present in known_hosts (strict verification)
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Transport used before `open()`
    #[error("Transport is not open")]
    NotOpen,

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Session engine errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Session used before `start()`
    #[error("Session not started - call start() first")]
    NotStarted,

    /// `start()` called twice
    #[error("Session already started")]
    AlreadyStarted,

    /// The prompt-wait retry budget ran out without a recognizable prompt
    #[error("No device prompt recognized after {attempts} attempts")]
    PromptNotFound { attempts: u32 },

    /// The expected terminator never arrived
    #[error("Command '{command}' got no expected response within {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    /// A mode-convergence loop exhausted its retry budget
    #[error("Failed to reach {target} mode (last observed: {last})")]
    ModeTransition { target: Mode, last: Mode },

    /// The device answered with an in-band error marker
    #[error("Device rejected '{command}': {}", first_error_line(.response))]
    Device { command: String, response: String },
}

/// Config tree errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A "no <feature>" mutation named a feature that is not enabled
    #[error("Feature '{feature}' is not present")]
    FeatureNotPresent { feature: String },

    /// A feature line that is empty after normalization
    #[error("Empty feature string")]
    EmptyFeature,

    /// The operation requires the node to be applied to a session first
    #[error("{node} is not attached to a device")]
    NotAttached { node: String },

    /// The node is materialized against a different session
    #[error("{node} is attached to another session")]
    ForeignSession { node: String },

    /// A node attribute failed validation
    #[error("Invalid {field}: '{value}'")]
    InvalidValue { field: &'static str, value: String },

    /// The device family has no command for this configuration
    #[error("Unsupported: {what}")]
    Unsupported { what: String },
}

fn first_error_line(response: &str) -> &str {
    response
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with('%'))
        .unwrap_or("syntax error")
}

/// Result type alias using ferriconf's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_display_uses_marker_line() {
        let err = SessionError::Device {
            command: "router bgp x".to_string(),
            response: "router bgp x\r\n        ^\r\n% Invalid input detected at '^' marker.\r\nR1(config)#"
                .to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Device rejected 'router bgp x': % Invalid input detected at '^' marker."
        );
    }

    #[test]
    fn test_connectivity_classification() {
        let err: Error = TransportError::Disconnected.into();
        assert!(err.is_connectivity());

        let err: Error = SessionError::PromptNotFound { attempts: 3 }.into();
        assert!(err.is_connectivity());

        let err: Error = SessionError::ModeTransition {
            target: Mode::Config,
            last: Mode::Exec,
        }
        .into();
        assert!(!err.is_connectivity());

        let err: Error = ConfigError::EmptyFeature.into();
        assert!(!err.is_connectivity());
        assert!(!err.is_device_error());
    }
}
