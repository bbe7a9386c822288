//! Builder for creating sessions.

use std::time::Duration;

use secrecy::SecretString;

use super::audit::{AuditSink, LogAudit};
use super::engine::Session;
use super::options::SessionOptions;
use crate::platform::{PlatformDefinition, vendors::cisco_ios};
use crate::transport::{SshConfig, SshShellTransport, TelnetConfig, TelnetTransport, Transport};

/// Builder for constructing device sessions.
///
/// # Example
///
/// ```rust,no_run
/// use ferriconf::{SessionBuilder, TelnetConfig};
///
/// # async fn example() -> Result<(), ferriconf::Error> {
/// let mut session = SessionBuilder::new()
///     .enable_password("secret")
///     .retry_count(5)
///     .telnet(TelnetConfig::new("192.0.2.10"));
///
/// session.start().await?;
/// session.to_config().await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    platform: PlatformDefinition,
    options: SessionOptions,
    enable_password: Option<SecretString>,
    audit: Option<Box<dyn AuditSink>>,
}

impl SessionBuilder {
    /// Create a builder for a Cisco IOS device with default options.
    pub fn new() -> Self {
        Self {
            platform: cisco_ios::platform(),
            options: SessionOptions::default(),
            enable_password: None,
            audit: None,
        }
    }

    /// Set a custom platform definition.
    pub fn platform(mut self, platform: PlatformDefinition) -> Self {
        self.platform = platform;
        self
    }

    /// Replace all options at once (e.g. loaded from a config file).
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the retry budget of prompt waits and mode transitions.
    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.options.retry_count = retry_count;
        self
    }

    /// Set the read granularity.
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.options.poll_interval = poll_interval;
        self
    }

    /// Set the per-command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.options.command_timeout = timeout;
        self
    }

    /// Report device error markers in responses instead of failing.
    pub fn suppress_syntax_errors(mut self, suppress: bool) -> Self {
        self.options.suppress_syntax_errors = suppress;
        self
    }

    /// Log connectivity failures and keep going.
    pub fn suppress_connection_errors(mut self, suppress: bool) -> Self {
        self.options.suppress_connection_errors = suppress;
        self
    }

    /// Set the password answered to the escalation prompt.
    pub fn enable_password(mut self, password: impl Into<String>) -> Self {
        self.enable_password = Some(SecretString::new(password.into().into_boxed_str()));
        self
    }

    /// Set the audit sink (default: [`LogAudit`]).
    pub fn audit(mut self, audit: impl AuditSink + 'static) -> Self {
        self.audit = Some(Box::new(audit));
        self
    }

    /// Build a session over any transport.
    ///
    /// The session is not connected; call [`Session::start`].
    pub fn build<T: Transport>(self, transport: T) -> Session<T> {
        Session::new(
            transport,
            self.platform,
            self.options,
            self.enable_password,
            self.audit.unwrap_or_else(|| Box::new(LogAudit)),
        )
    }

    /// Build a Telnet session.
    pub fn telnet(self, config: TelnetConfig) -> Session<TelnetTransport> {
        self.build(TelnetTransport::new(config))
    }

    /// Build an SSH shell session.
    pub fn ssh(self, config: SshConfig) -> Session<SshShellTransport> {
        self.build(SshShellTransport::new(config))
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
