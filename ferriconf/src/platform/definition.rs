//! Platform definition: the CLI dialect constants of a device family.

use regex::bytes::Regex;

use crate::channel::compile_tail_pattern;

/// Everything the session engine needs to know about a device family's CLI.
///
/// These strings are wire-format constants for the device, never shown to
/// callers. Only the prompt grammar is fixed (see
/// [`parse_response`](crate::channel::parse_response)); the commands that
/// move between modes are defined here.
#[derive(Debug, Clone)]
pub struct PlatformDefinition {
    /// Platform name (e.g., "cisco_ios").
    pub name: String,

    /// Command that escalates from User to Exec.
    pub escalate_command: String,

    /// Terminator of the password prompt printed by the escalation command.
    pub escalate_password_prompt: String,

    /// Command that drops from Exec to User.
    pub deescalate_command: String,

    /// Command that enters global configuration from Exec.
    pub config_command: String,

    /// Terminator of the global configuration prompt.
    pub config_prompt: String,

    /// Command that pops one configuration level.
    pub exit_command: String,

    /// Control sequence that returns to Exec from any configuration depth.
    pub hard_exit: Vec<u8>,

    /// Line terminator appended to every command.
    pub newline: String,

    /// Line prefix marking an in-band error (e.g. "% Invalid input").
    pub error_sigil: String,

    /// Trailing pager marker (e.g. " --More-- ").
    pub pager_pattern: Regex,

    /// What to send to advance the pager by one page.
    pub pager_advance: Vec<u8>,

    /// Commands to run once the first prompt is recognized.
    pub on_open_commands: Vec<String>,
}

impl PlatformDefinition {
    /// Create a platform with the given name and Cisco-style defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            escalate_command: "enable".to_string(),
            escalate_password_prompt: "assword:".to_string(),
            deescalate_command: "disable".to_string(),
            config_command: "config term".to_string(),
            config_prompt: "(config)#".to_string(),
            exit_command: "exit".to_string(),
            hard_exit: vec![0x1a],
            newline: "\n".to_string(),
            error_sigil: "%".to_string(),
            pager_pattern: compile_tail_pattern(r"-{2,}\s*More\s*-{2,}")
                .expect("static pager pattern"),
            pager_advance: b" ".to_vec(),
            on_open_commands: vec![],
        }
    }

    /// Add an on_open command.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }
}
