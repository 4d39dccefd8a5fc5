//! Shared data models for the sentry turret.
//!
//! This crate provides Serde-serializable types for:
//! - Frame-space geometry (points, boxes, detected regions)
//! - Per-tick target samples and the bounded target path
//! - Controller modes and audible cues
//! - Turret axes and angle commands

pub mod cue;
pub mod geometry;
pub mod mode;
pub mod target;
pub mod turret;

// Re-export common types
pub use cue::Cue;
pub use geometry::{BoundingBox, Vector2};
pub use mode::{ParseModeError, SentryMode};
pub use target::{Region, TargetPath, TargetSample, TARGET_PATH_LEN};
pub use turret::{Axis, TurretCommand};
