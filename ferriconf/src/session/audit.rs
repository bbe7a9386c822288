//! Audit sinks: a write-only record of everything sent to and received
//! from a device.
//!
//! The audit trail is separate from diagnostics. Commands and responses are
//! recorded verbatim, except hidden inputs such as the enable password,
//! which are masked before they reach the sink.

use std::sync::{Arc, Mutex};

use log::{debug, info};

use super::SessionId;

/// Masked stand-in for hidden inputs.
pub const MASK: &str = "********";

/// Receives every raw command sent and every raw response received.
pub trait AuditSink: Send {
    /// A command line (or control sequence) was written to the device.
    fn command(&mut self, session: SessionId, command: &str);

    /// A complete response was read from the device.
    fn response(&mut self, session: SessionId, response: &str);
}

/// Writes the audit trail to the `device` log target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAudit;

impl AuditSink for LogAudit {
    fn command(&mut self, session: SessionId, command: &str) {
        info!(target: "device", "{} >>> {}", session, command);
    }

    fn response(&mut self, session: SessionId, response: &str) {
        debug!(target: "device", "{} <<< {}", session, response);
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEntry {
    Command(SessionId, String),
    Response(SessionId, String),
}

/// In-memory audit capture; clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MemoryAudit {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Only the commands, in order.
    pub fn commands(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                AuditEntry::Command(_, command) => Some(command),
                AuditEntry::Response(..) => None,
            })
            .collect()
    }

    fn push(&self, entry: AuditEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

impl AuditSink for MemoryAudit {
    fn command(&mut self, session: SessionId, command: &str) {
        self.push(AuditEntry::Command(session, command.to_string()));
    }

    fn response(&mut self, session: SessionId, response: &str) {
        self.push(AuditEntry::Response(session, response.to_string()));
    }
}
