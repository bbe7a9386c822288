//! CLI modes and the navigation table between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The CLI nesting context of a device, inferred from its prompt.
///
/// A session never asserts its mode; it is always the classification of
/// the last recognized prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// No prompt recognized yet (or the last wait failed).
    #[default]
    None,
    /// `R1>`
    User,
    /// `R1#`
    Exec,
    /// `R1(config)#`
    Config,
    /// `R1(config-router)#` and every other configuration sub-mode.
    ConfigDeep,
}

impl Mode {
    /// Name used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::None => "none",
            Mode::User => "user",
            Mode::Exec => "exec",
            Mode::Config => "config",
            Mode::ConfigDeep => "config-deep",
        }
    }

    /// Whether this is any configuration mode.
    pub fn is_config(&self) -> bool {
        matches!(self, Mode::Config | Mode::ConfigDeep)
    }

    /// Next step of a convergence loop from `self` toward `target`.
    ///
    /// Returns `None` once `self` is the target. The navigable targets are
    /// `User`, `Exec` and `Config`; asking for `None` or `ConfigDeep` never
    /// yields a step.
    ///
    /// ```text
    ///          enable             config term
    ///  User ────────────► Exec ───────────────► Config ◄──── ConfigDeep
    ///       ◄────────────      ◄───────────────         exit
    ///          disable             Ctrl-Z (from any config depth)
    /// ```
    pub fn step_toward(self, target: Mode) -> Option<ModeStep> {
        if self == target {
            return None;
        }

        match (target, self) {
            (Mode::User | Mode::Exec | Mode::Config, Mode::None) => Some(ModeStep::WaitPrompt),

            (Mode::User, Mode::Exec) => Some(ModeStep::Deescalate),
            (Mode::User | Mode::Exec, Mode::Config | Mode::ConfigDeep) => Some(ModeStep::HardExit),

            (Mode::Exec, Mode::User) => Some(ModeStep::Escalate),

            (Mode::Config, Mode::User) => Some(ModeStep::ReachExec),
            (Mode::Config, Mode::Exec) => Some(ModeStep::EnterConfig),
            (Mode::Config, Mode::ConfigDeep) => Some(ModeStep::ExitLevel),

            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single action of a mode-convergence loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeStep {
    /// Send a bare newline and classify whatever prompt comes back.
    WaitPrompt,
    /// Privilege escalation (`enable`), answering the password prompt if any.
    Escalate,
    /// Drop privileges (`disable`).
    Deescalate,
    /// Hard-exit control sequence straight back to Exec from any depth.
    HardExit,
    /// Pop one configuration level (`exit`).
    ExitLevel,
    /// Enter global configuration (`config term`).
    EnterConfig,
    /// Run the whole Exec convergence loop first.
    ReachExec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_toward_exec() {
        assert_eq!(Mode::None.step_toward(Mode::Exec), Some(ModeStep::WaitPrompt));
        assert_eq!(Mode::User.step_toward(Mode::Exec), Some(ModeStep::Escalate));
        assert_eq!(Mode::Exec.step_toward(Mode::Exec), None);
        assert_eq!(Mode::Config.step_toward(Mode::Exec), Some(ModeStep::HardExit));
        assert_eq!(Mode::ConfigDeep.step_toward(Mode::Exec), Some(ModeStep::HardExit));
    }

    #[test]
    fn test_steps_toward_config() {
        assert_eq!(Mode::None.step_toward(Mode::Config), Some(ModeStep::WaitPrompt));
        assert_eq!(Mode::User.step_toward(Mode::Config), Some(ModeStep::ReachExec));
        assert_eq!(Mode::Exec.step_toward(Mode::Config), Some(ModeStep::EnterConfig));
        assert_eq!(Mode::Config.step_toward(Mode::Config), None);
        assert_eq!(Mode::ConfigDeep.step_toward(Mode::Config), Some(ModeStep::ExitLevel));
    }

    #[test]
    fn test_steps_toward_user() {
        assert_eq!(Mode::Exec.step_toward(Mode::User), Some(ModeStep::Deescalate));
        assert_eq!(Mode::ConfigDeep.step_toward(Mode::User), Some(ModeStep::HardExit));
        assert_eq!(Mode::User.step_toward(Mode::User), None);
    }

    #[test]
    fn test_unnavigable_targets() {
        assert_eq!(Mode::Exec.step_toward(Mode::ConfigDeep), None);
        assert_eq!(Mode::Exec.step_toward(Mode::None), None);
    }

    #[test]
    fn test_mode_serde_names() {
        let json = serde_json::to_string(&Mode::ConfigDeep).unwrap();
        assert_eq!(json, "\"config_deep\"");
        let mode: Mode = serde_json::from_str("\"exec\"").unwrap();
        assert_eq!(mode, Mode::Exec);
    }
}
