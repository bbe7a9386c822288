//! Cisco IOS / IOS-XE platform definition.
//!
//! # Prompt Examples
//!
//! ```text
//! R1>                        # user mode
//! R1#                        # exec (privileged) mode
//! R1(config)#                # global configuration
//! R1(config-router-af)#      # configuration sub-mode
//! ```
//!
//! # Mode Graph
//!
//! ```text
//! ┌──────┐   enable    ┌──────┐  config term   ┌──────────┐  router bgp ..  ┌──────────────┐
//! │ user ├─────────────► exec ├────────────────► config   ├─────────────────► config-deep  │
//! │  >   │   disable   │  #   │     Ctrl-Z     │(config)# │      exit       │(config-xxx)# │
//! └──────┘◄────────────┴──────┘◄───────────────┴──────────┘◄────────────────┴──────────────┘
//! ```

use crate::platform::PlatformDefinition;

/// Platform name used in logs.
pub const PLATFORM_NAME: &str = "cisco_ios";

/// Create the Cisco IOS platform definition.
pub fn platform() -> PlatformDefinition {
    PlatformDefinition::new(PLATFORM_NAME)
}

/// Same as [`platform`], with paging disabled right after login.
///
/// With `terminal length 0` the device never prints `--More--`; the pager
/// handling in the session stays in place for devices that ignore it.
pub fn platform_without_paging() -> PlatformDefinition {
    platform().with_on_open_command("terminal length 0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cisco_platform() {
        let platform = platform();
        assert_eq!(platform.name, "cisco_ios");
        assert_eq!(platform.escalate_command, "enable");
        assert_eq!(platform.config_command, "config term");
        assert_eq!(platform.config_prompt, "(config)#");
        assert_eq!(platform.hard_exit, vec![0x1a]);
        assert!(platform.on_open_commands.is_empty());
    }

    #[test]
    fn test_pager_pattern() {
        let platform = platform();
        assert!(platform.pager_pattern.is_match(b"interface Gi1\r\n --More-- "));
        assert!(platform.pager_pattern.is_match(b"line\r\n--More--"));
        assert!(!platform.pager_pattern.is_match(b" --More-- \r\nmore output\r\nR1#"));
    }

    #[test]
    fn test_without_paging() {
        let platform = platform_without_paging();
        assert_eq!(platform.on_open_commands, vec!["terminal length 0".to_string()]);
    }
}
