//! Channel layer: response accumulation and prompt recognition.
//!
//! This module turns raw device bytes into text the session engine can
//! reason about: escape stripping, echo suppression, pager detection and
//! prompt classification.

mod buffer;
mod patterns;
mod prompt;

pub use buffer::{ResponseBuffer, strip_escapes};
pub use patterns::{compile_tail_pattern, ends_with_terminator, error_line};
pub use prompt::{parse_response, printable_text};
