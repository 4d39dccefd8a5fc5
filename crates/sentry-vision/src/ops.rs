//! Image-processing collaborator interface.

use crate::error::VisionResult;
use sentry_models::Region;

/// Image operations used by the motion tracker.
///
/// Backends choose their own frame representations; the tracker only moves
/// values between these calls.
pub trait ImageOps {
    /// Raw frame as delivered by the frame source.
    type Frame;
    /// Single-channel intensity image (also used for difference images).
    type Gray;
    /// Binary foreground mask.
    type Binary;

    /// Resize to the processing resolution, convert to grayscale and blur.
    fn to_gray_smoothed(&self, frame: &Self::Frame) -> VisionResult<Self::Gray>;

    /// Per-pixel absolute difference of two gray images of equal size.
    fn abs_diff(&self, reference: &Self::Gray, current: &Self::Gray) -> VisionResult<Self::Gray>;

    /// Pixels strictly above `level` become foreground.
    fn threshold(&self, delta: &Self::Gray, level: u8) -> VisionResult<Self::Binary>;

    /// Grow foreground with a 3x3 structuring element, `iterations` times.
    fn dilate(&self, mask: Self::Binary, iterations: u32) -> VisionResult<Self::Binary>;

    /// Extract connected foreground regions.
    fn find_regions(&self, mask: &Self::Binary) -> VisionResult<Vec<Region>>;

    /// Width and height of a gray image.
    fn dimensions(&self, gray: &Self::Gray) -> (u32, u32);
}
