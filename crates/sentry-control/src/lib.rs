//! Sentry turret controller.
//!
//! This crate provides:
//! - Configuration loading and validation
//! - The targeting and firing state machine
//! - Target-to-angle mapping and actuator command delivery
//! - Non-blocking sound cue playback
//! - The tick loop tying frame acquisition, tracking and actuation together

pub mod actuator;
pub mod config;
pub mod controller;
pub mod cues;
pub mod error;
pub mod state_machine;

pub use actuator::{ActuatorBus, AngleLimits, RecordingActuator, SerialLineActuator, TurretActuationMapper};
pub use config::{CameraConfig, DetectorConfig, SentryConfig, SoundConfig, TurretConfig};
pub use controller::{is_end_of_stream, SentryController, Status, StopSignal};
pub use cues::{cue_player_from_config, CuePlayer, ProcessCuePlayer, RecordingCuePlayer, SilentCuePlayer};
pub use error::{ActuatorError, CueError, SentryError, SentryResult};
pub use state_machine::{SentryStateMachine, SentryTimings};

pub use sentry_vision::{Clock, ComponentLogger, ManualClock, SystemClock};
