//! Prompt classification.
//!
//! The device's only signal about its state is the prompt text it prints
//! after each command. [`parse_response`] turns the tail of a response into
//! a [`Mode`] and the device's self-reported name:
//!
//! ```text
//! R1>                       User
//! R1#                       Exec
//! R1(config)#               Config
//! R1(config-router-af)#     ConfigDeep
//! Password:                 None
//! ```

use std::sync::LazyLock;

use regex::Regex;

use super::buffer::strip_escapes;
use crate::session::Mode;

/// Marker that opens every configuration-mode prompt suffix.
const CONFIG_MARKER: &str = "(config";

/// Last prompt on a line: anything up to an earlier `#`/`>`, then the
/// name segment, then the terminal mode character.
static PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:.*[#>])?(.+)([#>])$").expect("static prompt regex"));

/// Classify device output by its trailing prompt.
///
/// Returns `(Mode::None, "")` when the output does not end in a prompt.
/// The returned name never includes the `(config...)` suffix, so it can be
/// used to build the terminator of later commands in any mode.
pub fn parse_response(text: &str) -> (Mode, String) {
    let clean = printable_text(text);
    let line = last_line(&clean);

    let Some(caps) = PROMPT.captures(line) else {
        return (Mode::None, String::new());
    };
    let segment = &caps[1];

    if &caps[2] == ">" {
        return (Mode::User, segment.trim().to_string());
    }

    match segment.rfind(CONFIG_MARKER) {
        Some(pos) => {
            let mode = if &segment[pos + CONFIG_MARKER.len()..] == ")" {
                Mode::Config
            } else {
                Mode::ConfigDeep
            };
            (mode, segment[..pos].trim().to_string())
        }
        None => (Mode::Exec, segment.trim().to_string()),
    }
}

/// The text with escape sequences and control characters removed.
///
/// Line breaks survive so that the last line can still be located.
pub fn printable_text(text: &str) -> String {
    let stripped = strip_escapes(text.as_bytes());
    String::from_utf8_lossy(&stripped)
        .chars()
        .filter(|c| matches!(c, '\r' | '\n') || !c.is_control())
        .collect()
}

fn last_line(text: &str) -> &str {
    text.trim_end()
        .rsplit(['\r', '\n'])
        .next()
        .unwrap_or_default()
}
