//! Turret axes and angle setpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Actuated axis of the turret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Yaw,
    Pitch,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Yaw => "yaw",
            Axis::Pitch => "pitch",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Commanded turret orientation in degrees.
///
/// This is the last setpoint sent, not the actuator's measured position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TurretCommand {
    pub yaw: f64,
    pub pitch: f64,
}

impl TurretCommand {
    pub fn new(yaw: f64, pitch: f64) -> Self {
        Self { yaw, pitch }
    }

    /// Angle for one axis.
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Yaw => self.yaw,
            Axis::Pitch => self.pitch,
        }
    }

    /// Clamp both axes to the given limits.
    pub fn clamped(&self, yaw_range: (f64, f64), pitch_range: (f64, f64)) -> TurretCommand {
        TurretCommand {
            yaw: self.yaw.clamp(yaw_range.0, yaw_range.1),
            pitch: self.pitch.clamp(pitch_range.0, pitch_range.1),
        }
    }
}

impl fmt::Display for TurretCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "yaw {:.1}° pitch {:.1}°", self.yaw, self.pitch)
    }
}
