//! Vision front end for the sentry turret.
//!
//! This crate provides:
//! - Frame source and image-op collaborator traits
//! - A pure-Rust image backend and an optional OpenCV backend
//! - A single-slot latest-frame buffer with a background grabber
//! - Frame-difference motion tracking with a fading target trail
//! - Clock and component logger capabilities shared with the controller

pub mod clock;
pub mod error;
pub mod latest;
pub mod logging;
pub mod native;
pub mod ops;
pub mod source;
pub mod tracker;

#[cfg(feature = "opencv")]
pub mod opencv_backend;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{VisionError, VisionResult};
pub use latest::{FrameGrabber, LatestFrameSlot};
pub use logging::ComponentLogger;
pub use native::NativeImageOps;
pub use ops::ImageOps;
pub use source::{FrameSource, ImageSequenceSource};
pub use tracker::{MotionTracker, TargetSource, TrackerSettings};

#[cfg(feature = "opencv")]
pub use opencv_backend::{OpenCvCamera, OpenCvImageOps};
