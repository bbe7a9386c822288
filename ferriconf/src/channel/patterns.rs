//! Pattern helpers for response completion and in-band error detection.

use regex::bytes::Regex;

/// Compile a pattern that must match at the very end of the output.
///
/// Appends `\s*$` unless the pattern is already anchored, so trailing
/// blanks after a pager marker or a prompt do not defeat the match.
pub fn compile_tail_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = if pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("{}\\s*$", pattern)
    };

    Regex::new(&pattern)
}

/// Check whether output ends with a literal terminator such as `(config-if)#`.
///
/// Trailing whitespace on either side is ignored.
pub fn ends_with_terminator(output: &str, terminator: &str) -> bool {
    let terminator = terminator.trim_end();
    !terminator.is_empty() && output.trim_end().ends_with(terminator)
}

/// Find the first line that starts with the device's error sigil.
pub fn error_line<'a>(output: &'a str, sigil: &str) -> Option<&'a str> {
    output.lines().find(|line| line.starts_with(sigil))
}
