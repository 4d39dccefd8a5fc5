//! Per-frame detections and the target trail.

use crate::geometry::{BoundingBox, Vector2};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of positions kept in a [`TargetPath`].
pub const TARGET_PATH_LEN: usize = 20;

/// A connected set of foreground pixels in a binarized motion mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Bounding box of the region
    pub bbox: BoundingBox,
    /// Area in pixels
    pub area: f64,
    /// Representative point (bounding box center)
    pub centroid: Vector2,
}

impl Region {
    /// Build a region whose centroid is the center of its bounding box.
    pub fn from_bbox(bbox: BoundingBox, area: f64) -> Self {
        Self {
            bbox,
            area,
            centroid: bbox.center(),
        }
    }
}

/// Aggregated detection result for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSample {
    /// Mean of the contributing regions' centroids (origin when none)
    pub centroid: Vector2,
    /// Whether at least one region qualified
    pub detected: bool,
    /// Number of contributing regions
    pub count: usize,
}

impl TargetSample {
    /// A sample with no qualifying regions.
    pub fn none() -> Self {
        Self {
            centroid: Vector2::ORIGIN,
            detected: false,
            count: 0,
        }
    }
}

impl Default for TargetSample {
    fn default() -> Self {
        Self::none()
    }
}

/// Bounded FIFO of recent target positions, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPath {
    points: VecDeque<Vector2>,
    capacity: usize,
}

impl TargetPath {
    /// Create an empty path holding at most `capacity` points.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a position, evicting the oldest one when full.
    pub fn push(&mut self, point: Vector2) {
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    /// Drop the oldest position, if any. Called on ticks without detection so
    /// the trail fades out instead of vanishing.
    pub fn fade(&mut self) -> Option<Vector2> {
        self.points.pop_front()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest position still in the trail.
    pub fn oldest(&self) -> Option<&Vector2> {
        self.points.front()
    }
}

impl Default for TargetPath {
    fn default() -> Self {
        Self::with_capacity(TARGET_PATH_LEN)
    }
}
