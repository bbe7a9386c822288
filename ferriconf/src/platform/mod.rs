//! Platform definitions: the CLI dialect of a device family.
//!
//! The session engine is vendor-neutral; everything dialect-specific
//! (mode-changing commands, the hard-exit sequence, the error sigil, the
//! pager marker) lives in a [`PlatformDefinition`].

mod definition;
pub mod vendors;

pub use definition::PlatformDefinition;
