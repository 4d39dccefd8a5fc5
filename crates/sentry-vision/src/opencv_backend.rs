//! OpenCV camera capture and image ops.

use opencv::{
    core::{self, Mat, Point, Size, Vector},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use sentry_models::{BoundingBox, Region};
use tracing::info;

use crate::error::{VisionError, VisionResult};
use crate::ops::ImageOps;
use crate::source::FrameSource;

/// Gaussian kernel applied after grayscale conversion.
const BLUR_KERNEL: i32 = 21;

/// Image ops over BGR `Mat` frames.
pub struct OpenCvImageOps {
    processing_width: Option<i32>,
}

impl OpenCvImageOps {
    pub fn new(processing_width: Option<u32>) -> Self {
        Self {
            processing_width: processing_width.map(|w| w as i32),
        }
    }

    fn resized(&self, frame: &Mat) -> VisionResult<Mat> {
        let width = frame.cols();
        let height = frame.rows();
        match self.processing_width {
            Some(target) if target != width && width > 0 => {
                let scaled_height = ((height as f64 * target as f64 / width as f64).round() as i32).max(1);
                let mut small = Mat::default();
                imgproc::resize(
                    frame,
                    &mut small,
                    Size::new(target, scaled_height),
                    0.0,
                    0.0,
                    imgproc::INTER_AREA,
                )
                .map_err(|e| VisionError::image_op(format!("resize: {e}")))?;
                Ok(small)
            }
            _ => Ok(frame.clone()),
        }
    }
}

impl ImageOps for OpenCvImageOps {
    type Frame = Mat;
    type Gray = Mat;
    type Binary = Mat;

    fn to_gray_smoothed(&self, frame: &Mat) -> VisionResult<Mat> {
        if frame.empty() {
            return Err(VisionError::invalid_frame("empty frame"));
        }

        let small = self.resized(frame)?;

        let gray = if small.channels() == 3 {
            let mut gray = Mat::default();
            imgproc::cvt_color_def(&small, &mut gray, imgproc::COLOR_BGR2GRAY)
                .map_err(|e| VisionError::image_op(format!("bgr2gray: {e}")))?;
            gray
        } else {
            small
        };

        let mut blurred = Mat::default();
        imgproc::gaussian_blur_def(&gray, &mut blurred, Size::new(BLUR_KERNEL, BLUR_KERNEL), 0.0)
            .map_err(|e| VisionError::image_op(format!("gaussian blur: {e}")))?;
        Ok(blurred)
    }

    fn abs_diff(&self, reference: &Mat, current: &Mat) -> VisionResult<Mat> {
        if reference.size().ok() != current.size().ok() {
            return Err(VisionError::invalid_frame("reference and current frame sizes differ"));
        }
        let mut diff = Mat::default();
        core::absdiff(reference, current, &mut diff)
            .map_err(|e| VisionError::image_op(format!("absdiff: {e}")))?;
        Ok(diff)
    }

    fn threshold(&self, delta: &Mat, level: u8) -> VisionResult<Mat> {
        let mut thresh = Mat::default();
        imgproc::threshold(delta, &mut thresh, level as f64, 255.0, imgproc::THRESH_BINARY)
            .map_err(|e| VisionError::image_op(format!("threshold: {e}")))?;
        Ok(thresh)
    }

    fn dilate(&self, mask: Mat, iterations: u32) -> VisionResult<Mat> {
        if iterations == 0 {
            return Ok(mask);
        }
        let border_value = imgproc::morphology_default_border_value()
            .map_err(|e| VisionError::image_op(format!("dilate border: {e}")))?;
        let mut dilated = Mat::default();
        imgproc::dilate(
            &mask,
            &mut dilated,
            &Mat::default(),
            Point::new(-1, -1),
            iterations as i32,
            core::BORDER_CONSTANT,
            border_value,
        )
        .map_err(|e| VisionError::image_op(format!("dilate: {e}")))?;
        Ok(dilated)
    }

    fn find_regions(&self, mask: &Mat) -> VisionResult<Vec<Region>> {
        let mut contours: Vector<Vector<Point>> = Vector::new();
        imgproc::find_contours_def(
            mask,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
        )
        .map_err(|e| VisionError::image_op(format!("find contours: {e}")))?;

        let mut regions = Vec::with_capacity(contours.len());
        for contour in contours.iter() {
            let area = imgproc::contour_area_def(&contour)
                .map_err(|e| VisionError::image_op(format!("contour area: {e}")))?;
            let rect = imgproc::bounding_rect(&contour)
                .map_err(|e| VisionError::image_op(format!("bounding rect: {e}")))?;
            let bbox = BoundingBox::new(rect.x as f64, rect.y as f64, rect.width as f64, rect.height as f64);
            regions.push(Region::from_bbox(bbox, area));
        }
        Ok(regions)
    }

    fn dimensions(&self, gray: &Mat) -> (u32, u32) {
        (gray.cols().max(0) as u32, gray.rows().max(0) as u32)
    }
}

/// Camera or video file frame source.
pub struct OpenCvCamera {
    capture: VideoCapture,
    dimensions: (u32, u32),
    /// A live device never runs out; a missing frame is a failure.
    live: bool,
}

impl OpenCvCamera {
    /// Open camera `index` with the default backend.
    pub fn open(index: i32) -> VisionResult<Self> {
        let capture = VideoCapture::new(index, videoio::CAP_ANY)
            .map_err(|e| VisionError::acquisition(format!("open camera {index}: {e}")))?;
        Self::from_capture(capture, &format!("camera {index}"), true)
    }

    /// Open a video file.
    pub fn open_file(path: &str) -> VisionResult<Self> {
        let capture = VideoCapture::from_file(path, videoio::CAP_ANY)
            .map_err(|e| VisionError::acquisition(format!("open video {path}: {e}")))?;
        Self::from_capture(capture, path, false)
    }

    fn from_capture(capture: VideoCapture, name: &str, live: bool) -> VisionResult<Self> {
        if !capture.is_opened().unwrap_or(false) {
            return Err(VisionError::acquisition(format!("{name} could not be opened")));
        }

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as u32;
        info!("Capture dimensions for {}: {} x {}", name, width, height);

        Ok(Self {
            capture,
            dimensions: (width, height),
            live,
        })
    }
}

impl FrameSource for OpenCvCamera {
    type Frame = Mat;

    fn next_frame(&mut self) -> VisionResult<Mat> {
        let mut frame = Mat::default();
        let grabbed = self
            .capture
            .read(&mut frame)
            .map_err(|e| VisionError::acquisition(format!("read: {e}")))?;
        if !grabbed || frame.empty() {
            if self.live {
                return Err(VisionError::acquisition("camera returned no frame"));
            }
            return Err(VisionError::NoFrame);
        }
        Ok(frame)
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn release(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!("Failed to release capture: {}", e);
        }
    }
}
