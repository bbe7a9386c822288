//! Byte-stream transports to the device.
//!
//! A [`Transport`] is nothing more than a bidirectional character stream:
//! the session engine above it owns prompt detection, mode tracking and
//! pagination. Telnet and SSH shell channels are interchangeable.

pub mod config;
#[cfg(test)]
pub(crate) mod mock;
mod ssh;
mod telnet;

pub use config::{AuthMethod, HostKeyVerification, SshConfig, TelnetConfig};
pub use ssh::SshShellTransport;
pub use telnet::TelnetTransport;

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// A bidirectional byte stream to a device CLI.
pub trait Transport: Send {
    /// Establish the connection.
    fn open(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Write raw bytes to the device.
    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Read whatever the device has sent, waiting at most `wait`.
    ///
    /// Returns an empty vector when nothing arrived in time. A closed
    /// stream is an error, never an empty read.
    fn recv(&mut self, wait: Duration) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Whether the stream was closed by either side.
    fn is_closed(&self) -> bool;

    /// Close the connection.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}
