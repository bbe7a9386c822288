//! Response type for command execution results.

use std::time::Duration;

use crate::channel::parse_response;
use crate::session::Mode;

/// Response from a command execution.
#[derive(Debug, Clone)]
pub struct Response {
    /// The command that was executed.
    pub command: String,

    /// The command output (echo and trailing prompt removed).
    pub result: String,

    /// The raw output, escape sequences stripped.
    pub raw_result: String,

    /// The prompt that was matched at the end.
    pub prompt: String,

    /// Mode of the session after the command.
    pub mode: Mode,

    /// Time taken to execute the command.
    pub elapsed: Duration,

    /// Device error line or connectivity failure, if the command failed.
    pub failure_message: Option<String>,
}

impl Response {
    /// Build a successful response from the raw exchange output.
    pub fn new(command: impl Into<String>, raw_result: impl Into<String>, mode: Mode, elapsed: Duration) -> Self {
        let raw_result = raw_result.into();
        let (result, prompt) = split_prompt(&raw_result);
        Self {
            command: command.into(),
            result,
            raw_result,
            prompt,
            mode,
            elapsed,
            failure_message: None,
        }
    }

    /// Build a failed response.
    pub fn failed(
        command: impl Into<String>,
        raw_result: impl Into<String>,
        mode: Mode,
        elapsed: Duration,
        failure_message: impl Into<String>,
    ) -> Self {
        Self {
            failure_message: Some(failure_message.into()),
            ..Self::new(command, raw_result, mode, elapsed)
        }
    }

    /// Check if the response indicates success.
    pub fn is_success(&self) -> bool {
        self.failure_message.is_none()
    }

    /// Get the result lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.result.lines()
    }

    /// Check if the result contains a substring.
    pub fn contains(&self, pattern: &str) -> bool {
        self.result.contains(pattern)
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.result)
    }
}

/// Split raw output into the body and the trailing prompt line.
fn split_prompt(raw: &str) -> (String, String) {
    let trimmed = raw.trim_end();
    let (body, last) = trimmed.rsplit_once('\n').unwrap_or(("", trimmed));

    if parse_response(last).0 == Mode::None {
        return (trimmed.trim_matches(['\r', '\n']).to_string(), String::new());
    }
    (body.trim_matches(['\r', '\n']).to_string(), last.trim().to_string())
}
