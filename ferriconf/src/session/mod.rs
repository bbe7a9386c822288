//! Session engine: drives one device CLI over a [`Transport`](crate::transport::Transport).
//!
//! The session tracks which CLI [`Mode`] the device is in purely from the
//! prompts it prints, moves between modes with convergent retry loops and
//! exposes the command/response primitive every config node builds on.

mod audit;
mod builder;
mod engine;
mod mode;
mod options;
mod response;

pub use audit::{AuditEntry, AuditSink, LogAudit, MASK, MemoryAudit};
pub use builder::SessionBuilder;
pub use engine::Session;
pub use mode::{Mode, ModeStep};
pub use options::SessionOptions;
pub use response::Response;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a session.
///
/// Config nodes remember the id of the session they were applied through
/// instead of holding a reference to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SessionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}
