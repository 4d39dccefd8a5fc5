//! Frame-difference motion tracker.
//!
//! Compares each processed frame against a stored reference frame, keeps the
//! regions large enough to be real motion and reduces them to a single
//! aimpoint. The aimpoint is held when motion disappears while the trail of
//! recent aimpoints fades out one point per tick.

use crate::clock::Clock;
use crate::error::VisionResult;
use crate::logging::ComponentLogger;
use crate::ops::ImageOps;
use sentry_models::{Region, TargetPath, TargetSample, Vector2};
use std::sync::Arc;

/// Read/control surface of a target tracker, as seen by the state machine.
pub trait TargetSource {
    /// Whether the last processed frame contained qualifying motion.
    fn is_detected(&self) -> bool;

    /// Current aimpoint (origin before any detection).
    fn target(&self) -> Vector2;

    /// Clock time of the last qualifying motion.
    fn last_motion_time(&self) -> u64;

    fn set_active(&mut self, active: bool);

    fn is_active(&self) -> bool;

    /// Forget the reference frame so the next active frame becomes the new baseline.
    fn reset(&mut self);

    /// Dimensions of the last processed frame, if any.
    fn frame_dimensions(&self) -> Option<(u32, u32)>;
}

/// Detection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    /// Regions smaller than this (pixels) are ignored
    pub min_area: f64,
    /// Follow only the largest region instead of the mean of all regions
    pub max_object_only: bool,
    /// Difference level above which a pixel counts as changed
    pub threshold: u8,
    /// Dilation passes applied to the motion mask
    pub dilate_iterations: u32,
    /// Log every accepted region
    pub debug: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            min_area: 2000.0,
            max_object_only: true,
            threshold: 50,
            dilate_iterations: 2,
            debug: false,
        }
    }
}

/// Motion tracker over an [`ImageOps`] backend.
pub struct MotionTracker<O: ImageOps> {
    ops: O,
    settings: TrackerSettings,
    clock: Arc<dyn Clock>,
    logger: ComponentLogger,
    reference: Option<O::Gray>,
    active: bool,
    detected: bool,
    last_motion_time: u64,
    target: Vector2,
    speed: Vector2,
    path: TargetPath,
    frame_dimensions: Option<(u32, u32)>,
}

impl<O: ImageOps> MotionTracker<O> {
    /// Create an inactive tracker.
    pub fn new(ops: O, settings: TrackerSettings, clock: Arc<dyn Clock>, logger: ComponentLogger) -> Self {
        let last_motion_time = clock.now_ms();
        logger.info(&format!(
            "Initialize: min_area={} max_object_only={} threshold={}",
            settings.min_area, settings.max_object_only, settings.threshold
        ));

        Self {
            ops,
            settings,
            clock,
            logger,
            reference: None,
            active: false,
            detected: false,
            last_motion_time,
            target: Vector2::ORIGIN,
            speed: Vector2::ORIGIN,
            path: TargetPath::default(),
            frame_dimensions: None,
        }
    }

    /// Process one frame.
    ///
    /// Inactive trackers accept and discard the frame. The first active frame
    /// after construction or [`reset`](TargetSource::reset) only becomes the
    /// reference and never reports motion.
    pub fn update(&mut self, frame: &O::Frame) -> VisionResult<TargetSample> {
        self.detected = false;

        if !self.active {
            return Ok(TargetSample::none());
        }

        let gray = self.ops.to_gray_smoothed(frame)?;
        self.frame_dimensions = Some(self.ops.dimensions(&gray));

        let delta = match &self.reference {
            Some(reference) if self.ops.dimensions(reference) == self.ops.dimensions(&gray) => {
                self.ops.abs_diff(reference, &gray)?
            }
            Some(reference) => {
                let (w, h) = self.ops.dimensions(reference);
                let (nw, nh) = self.ops.dimensions(&gray);
                self.logger
                    .warn(&format!("Frame size changed from {w}x{h} to {nw}x{nh}, re-capturing reference"));
                self.reference = Some(gray);
                return Ok(TargetSample::none());
            }
            None => {
                self.logger.debug("Reference frame captured");
                self.reference = Some(gray);
                return Ok(TargetSample::none());
            }
        };

        let mask = self.ops.threshold(&delta, self.settings.threshold)?;
        let mask = self.ops.dilate(mask, self.settings.dilate_iterations)?;
        let regions = self.ops.find_regions(&mask)?;

        let sample = self.aggregate(&regions);
        if sample.detected {
            self.detected = true;
            self.last_motion_time = self.clock.now_ms();
        }

        self.update_path(&sample);
        Ok(sample)
    }

    /// Reduce the frame's regions to one sample according to the filtering policy.
    fn aggregate(&self, regions: &[Region]) -> TargetSample {
        let min_area = self.settings.min_area;

        let accepted: Vec<&Region> = if self.settings.max_object_only {
            regions
                .iter()
                .max_by(|a, b| a.area.total_cmp(&b.area))
                .filter(|largest| largest.area >= min_area)
                .into_iter()
                .collect()
        } else {
            regions.iter().filter(|r| r.area >= min_area).collect()
        };

        if accepted.is_empty() {
            return TargetSample::none();
        }

        let mut sum = Vector2::default();
        for region in &accepted {
            if self.settings.debug {
                self.logger.debug(&format!(
                    "Region at {} area {:.0} bbox {:.0}x{:.0}",
                    region.centroid, region.area, region.bbox.width, region.bbox.height
                ));
            }
            sum.add(region.centroid.x, region.centroid.y);
        }

        TargetSample {
            centroid: sum.scaled_down(accepted.len() as f64),
            detected: true,
            count: accepted.len(),
        }
    }

    /// Move the aimpoint and trail. With no detection the aimpoint is held and
    /// the trail loses its oldest point.
    fn update_path(&mut self, sample: &TargetSample) {
        let previous = self.target;

        if sample.count > 0 {
            self.target = sample.centroid;
            self.path.push(self.target);
        } else {
            self.path.fade();
        }

        self.speed = self.target - previous;
    }

    /// Per-tick displacement of the aimpoint (not normalized by elapsed time).
    pub fn speed(&self) -> Vector2 {
        self.speed
    }

    /// Trail of recent aimpoints, oldest first.
    pub fn path(&self) -> &TargetPath {
        &self.path
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Whether a reference frame is currently stored.
    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }
}

impl<O: ImageOps> TargetSource for MotionTracker<O> {
    fn is_detected(&self) -> bool {
        self.detected
    }

    fn target(&self) -> Vector2 {
        self.target
    }

    fn last_motion_time(&self) -> u64 {
        self.last_motion_time
    }

    fn set_active(&mut self, active: bool) {
        if self.active != active {
            self.logger.debug(if active { "Activated" } else { "Deactivated" });
        }
        self.active = active;
        if !active {
            self.detected = false;
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn reset(&mut self) {
        self.logger.info("Reset");
        self.reference = None;
        self.path.clear();
    }

    fn frame_dimensions(&self) -> Option<(u32, u32)> {
        self.frame_dimensions
    }
}
