//! Controller error types.
//!
//! Only configuration and acquisition failures may end a run. Actuator and
//! cue failures are logged where they happen and never propagate.

use sentry_models::Axis;
use sentry_vision::VisionError;
use std::path::PathBuf;
use thiserror::Error;

pub type SentryResult<T> = Result<T, SentryError>;

#[derive(Debug, Error)]
pub enum SentryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Configuration source error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Acquisition error: {0}")]
    Acquisition(#[from] VisionError),
}

impl SentryError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Returns true for errors raised before the control loop starts.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Config(_))
    }
}

/// Failure to deliver an angle command.
#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("Actuator not connected")]
    Disconnected,

    #[error("Failed to command {axis}: {message}")]
    Write { axis: Axis, message: String },

    #[error("Actuator IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ActuatorError {
    pub fn write(axis: Axis, message: impl Into<String>) -> Self {
        Self::Write {
            axis,
            message: message.into(),
        }
    }
}

/// Failure to play a sound cue.
#[derive(Debug, Error)]
pub enum CueError {
    #[error("Cue player not found: {0}")]
    PlayerNotFound(String),

    #[error("Cue file missing: {0}")]
    MissingFile(PathBuf),

    #[error("Failed to start cue player: {0}")]
    Spawn(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(SentryError::configuration("yaw_min >= yaw_max").is_configuration());
        assert!(!SentryError::Acquisition(VisionError::NoFrame).is_configuration());
    }

    #[test]
    fn test_error_messages() {
        let err = ActuatorError::write(Axis::Pitch, "broken pipe");
        assert_eq!(err.to_string(), "Failed to command pitch: broken pipe");
        let err = CueError::PlayerNotFound("aplay".to_string());
        assert_eq!(err.to_string(), "Cue player not found: aplay");
    }
}
