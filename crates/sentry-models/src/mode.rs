//! Controller mode definitions.
//!
//! The sentry moves forward through these modes:
//!
//! - `Init`: warming up, tracker disabled
//! - `Armed`: watching for motion, periodic ping
//! - `Warning`: motion seen, warning period running
//! - `Engaging`: target confirmed, firing on the shot timer
//! - `Depleted`: out of ammunition (sink)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Mode of the sentry state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SentryMode {
    /// Startup delay before arming.
    #[default]
    Init,

    /// Armed and scanning for motion.
    Armed,

    /// Motion detected, warning before engagement.
    Warning,

    /// Target confirmed, firing.
    Engaging,

    /// Ammunition exhausted. No transitions leave this mode.
    Depleted,
}

impl SentryMode {
    /// All modes in lifecycle order.
    pub const ALL: &'static [SentryMode] = &[
        SentryMode::Init,
        SentryMode::Armed,
        SentryMode::Warning,
        SentryMode::Engaging,
        SentryMode::Depleted,
    ];

    /// Returns the mode name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SentryMode::Init => "init",
            SentryMode::Armed => "armed",
            SentryMode::Warning => "warning",
            SentryMode::Engaging => "engaging",
            SentryMode::Depleted => "depleted",
        }
    }

    /// Operator-facing status label.
    pub fn label(&self) -> &'static str {
        match self {
            SentryMode::Init => "INITIALIZING",
            SentryMode::Armed => "ACTIVATED",
            SentryMode::Warning => "WARNING",
            SentryMode::Engaging => "DETECTED",
            SentryMode::Depleted => "OUT OF AMMO",
        }
    }

    /// Returns true once no further transitions are possible.
    pub fn is_sink(&self) -> bool {
        matches!(self, SentryMode::Depleted)
    }
}

impl fmt::Display for SentryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SentryMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "init" | "initializing" => Ok(SentryMode::Init),
            "armed" | "activated" => Ok(SentryMode::Armed),
            "warning" => Ok(SentryMode::Warning),
            "engaging" | "detected" => Ok(SentryMode::Engaging),
            "depleted" | "out_of_ammo" => Ok(SentryMode::Depleted),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown sentry mode: {0}")]
pub struct ParseModeError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("armed".parse::<SentryMode>().unwrap(), SentryMode::Armed);
        assert_eq!("ACTIVATED".parse::<SentryMode>().unwrap(), SentryMode::Armed);
        assert_eq!("out_of_ammo".parse::<SentryMode>().unwrap(), SentryMode::Depleted);
        assert!("firing".parse::<SentryMode>().is_err());
    }

    #[test]
    fn test_mode_display_round_trips() {
        for mode in SentryMode::ALL {
            assert_eq!(mode.to_string().parse::<SentryMode>().unwrap(), *mode);
        }
    }

    #[test]
    fn test_only_depleted_is_sink() {
        let sinks: Vec<_> = SentryMode::ALL.iter().filter(|m| m.is_sink()).collect();
        assert_eq!(sinks, vec![&SentryMode::Depleted]);
    }
}
