//! Audible cues emitted by the sentry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sound cue identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    /// Power-on
    Init,
    /// Armed after the startup delay
    Activate,
    /// Periodic ping while armed or warning
    Ping,
    /// Motion detected, entering the warning period
    Warn,
    /// First firing sound
    ShootPrimary,
    /// Alternate firing sound
    ShootSecondary,
    /// Out of ammunition
    Empty,
}

impl Cue {
    pub const ALL: &'static [Cue] = &[
        Cue::Init,
        Cue::Activate,
        Cue::Ping,
        Cue::Warn,
        Cue::ShootPrimary,
        Cue::ShootSecondary,
        Cue::Empty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cue::Init => "init",
            Cue::Activate => "activate",
            Cue::Ping => "ping",
            Cue::Warn => "warn",
            Cue::ShootPrimary => "shoot_1",
            Cue::ShootSecondary => "shoot_2",
            Cue::Empty => "empty",
        }
    }

    /// Sound file name inside the cue directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Cue::Init => "turret_init.wav",
            Cue::Activate => "turret_activate.wav",
            Cue::Ping => "turret_ping.wav",
            Cue::Warn => "turret_warning.wav",
            Cue::ShootPrimary => "turret_shoot_1.wav",
            Cue::ShootSecondary => "turret_shoot_2.wav",
            Cue::Empty => "turret_out_of_ammo.wav",
        }
    }

    /// Returns true for the two firing sounds.
    pub fn is_shot(&self) -> bool {
        matches!(self, Cue::ShootPrimary | Cue::ShootSecondary)
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_cue_files_are_distinct() {
        let files: HashSet<_> = Cue::ALL.iter().map(|c| c.file_name()).collect();
        assert_eq!(files.len(), Cue::ALL.len());
    }

    #[test]
    fn test_shot_cues() {
        assert!(Cue::ShootPrimary.is_shot());
        assert!(Cue::ShootSecondary.is_shot());
        assert!(!Cue::Ping.is_shot());
    }
}
