//! Pure-Rust image backend built on the `image` crate.

use crate::error::{VisionError, VisionResult};
use crate::ops::ImageOps;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use sentry_models::{BoundingBox, Region};

const FOREGROUND: u8 = 255;

/// Image ops over `image::DynamicImage` frames.
#[derive(Debug, Clone)]
pub struct NativeImageOps {
    /// Frames are resized to this width (aspect preserved) before processing.
    processing_width: Option<u32>,
    /// Gaussian blur sigma applied after grayscale conversion.
    blur_sigma: f32,
}

impl NativeImageOps {
    /// Create a backend that resizes to `processing_width` and blurs with `blur_sigma`.
    pub fn new(processing_width: Option<u32>, blur_sigma: f32) -> Self {
        Self {
            processing_width,
            blur_sigma,
        }
    }

    fn processing_size(&self, width: u32, height: u32) -> (u32, u32) {
        match self.processing_width {
            Some(target) if target != width && width > 0 => {
                let scale = target as f64 / width as f64;
                let scaled_height = ((height as f64 * scale).round() as u32).max(1);
                (target, scaled_height)
            }
            _ => (width, height),
        }
    }
}

impl Default for NativeImageOps {
    fn default() -> Self {
        // Equivalent of a 21x21 Gaussian kernel at 500px width.
        Self::new(Some(500), 3.5)
    }
}

impl ImageOps for NativeImageOps {
    type Frame = DynamicImage;
    type Gray = GrayImage;
    type Binary = GrayImage;

    fn to_gray_smoothed(&self, frame: &DynamicImage) -> VisionResult<GrayImage> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(VisionError::invalid_frame("empty frame"));
        }

        let (width, height) = self.processing_size(frame.width(), frame.height());
        let gray = if (width, height) == (frame.width(), frame.height()) {
            frame.to_luma8()
        } else {
            frame.resize_exact(width, height, FilterType::Triangle).to_luma8()
        };

        if self.blur_sigma > 0.0 {
            Ok(imageops::blur(&gray, self.blur_sigma))
        } else {
            Ok(gray)
        }
    }

    fn abs_diff(&self, reference: &GrayImage, current: &GrayImage) -> VisionResult<GrayImage> {
        if reference.dimensions() != current.dimensions() {
            return Err(VisionError::invalid_frame(format!(
                "size mismatch: reference {:?}, current {:?}",
                reference.dimensions(),
                current.dimensions()
            )));
        }

        let (width, height) = current.dimensions();
        Ok(GrayImage::from_fn(width, height, |x, y| {
            let a = reference.get_pixel(x, y)[0];
            let b = current.get_pixel(x, y)[0];
            Luma([a.abs_diff(b)])
        }))
    }

    fn threshold(&self, delta: &GrayImage, level: u8) -> VisionResult<GrayImage> {
        let (width, height) = delta.dimensions();
        Ok(GrayImage::from_fn(width, height, |x, y| {
            if delta.get_pixel(x, y)[0] > level {
                Luma([FOREGROUND])
            } else {
                Luma([0])
            }
        }))
    }

    fn dilate(&self, mask: GrayImage, iterations: u32) -> VisionResult<GrayImage> {
        let mut current = mask;
        for _ in 0..iterations {
            current = dilate_once(&current);
        }
        Ok(current)
    }

    fn find_regions(&self, mask: &GrayImage) -> VisionResult<Vec<Region>> {
        Ok(label_regions(mask))
    }

    fn dimensions(&self, gray: &GrayImage) -> (u32, u32) {
        gray.dimensions()
    }
}

/// One pass of 3x3 max filtering.
fn dilate_once(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let x0 = x.saturating_sub(1);
        let y0 = y.saturating_sub(1);
        let x1 = (x + 1).min(width - 1);
        let y1 = (y + 1).min(height - 1);
        for ny in y0..=y1 {
            for nx in x0..=x1 {
                if mask.get_pixel(nx, ny)[0] != 0 {
                    return Luma([FOREGROUND]);
                }
            }
        }
        Luma([0])
    })
}

/// 8-connected component labelling.
fn label_regions(mask: &GrayImage) -> Vec<Region> {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);
    let mut visited = vec![false; w * h];
    let mut regions = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for start_y in 0..h {
        for start_x in 0..w {
            let start = start_y * w + start_x;
            if visited[start] || mask.get_pixel(start_x as u32, start_y as u32)[0] == 0 {
                continue;
            }

            visited[start] = true;
            stack.push((start_x, start_y));

            let (mut min_x, mut min_y, mut max_x, mut max_y) = (start_x, start_y, start_x, start_y);
            let mut pixels = 0usize;

            while let Some((x, y)) = stack.pop() {
                pixels += 1;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);

                for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                        let idx = ny * w + nx;
                        if !visited[idx] && mask.get_pixel(nx as u32, ny as u32)[0] != 0 {
                            visited[idx] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }

            let bbox = BoundingBox::new(
                min_x as f64,
                min_y as f64,
                (max_x - min_x + 1) as f64,
                (max_y - min_y + 1) as f64,
            );
            regions.push(Region::from_bbox(bbox, pixels as f64));
        }
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn mask_with_rects(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let inside = rects
                .iter()
                .any(|&(rx, ry, rw, rh)| x >= rx && x < rx + rw && y >= ry && y < ry + rh);
            Luma([if inside { FOREGROUND } else { 0 }])
        })
    }

    #[test]
    fn test_find_regions_separates_components() {
        let ops = NativeImageOps::new(None, 0.0);
        let mask = mask_with_rects(50, 50, &[(2, 2, 5, 4), (30, 30, 10, 10)]);

        let mut regions = ops.find_regions(&mask).unwrap();
        regions.sort_by(|a, b| a.area.partial_cmp(&b.area).unwrap());

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].area, 20.0);
        assert_eq!(regions[0].bbox, BoundingBox::new(2.0, 2.0, 5.0, 4.0));
        assert_eq!(regions[1].area, 100.0);
        assert_eq!(regions[1].centroid.x, 35.0);
    }

    #[test]
    fn test_diagonal_pixels_are_connected() {
        let ops = NativeImageOps::new(None, 0.0);
        let mut mask = GrayImage::new(4, 4);
        mask.put_pixel(0, 0, Luma([FOREGROUND]));
        mask.put_pixel(1, 1, Luma([FOREGROUND]));
        mask.put_pixel(2, 2, Luma([FOREGROUND]));

        let regions = ops.find_regions(&mask).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 3.0);
    }

    #[test]
    fn test_dilate_merges_nearby_regions() {
        let ops = NativeImageOps::new(None, 0.0);
        let mask = mask_with_rects(40, 20, &[(5, 5, 4, 4), (12, 5, 4, 4)]);
        assert_eq!(ops.find_regions(&mask).unwrap().len(), 2);

        let dilated = ops.dilate(mask, 2).unwrap();
        assert_eq!(ops.find_regions(&dilated).unwrap().len(), 1);
    }

    #[test]
    fn test_threshold_is_strict() {
        let ops = NativeImageOps::new(None, 0.0);
        let delta = GrayImage::from_fn(3, 1, |x, _| Luma([[49, 50, 51][x as usize]]));
        let mask = ops.threshold(&delta, 50).unwrap();
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(1, 0)[0], 0);
        assert_eq!(mask.get_pixel(2, 0)[0], FOREGROUND);
    }

    #[test]
    fn test_abs_diff_rejects_size_mismatch() {
        let ops = NativeImageOps::new(None, 0.0);
        let a = GrayImage::new(4, 4);
        let b = GrayImage::new(5, 4);
        assert!(matches!(ops.abs_diff(&a, &b), Err(VisionError::InvalidFrame(_))));
    }

    #[test]
    fn test_to_gray_resizes_to_processing_width() {
        let ops = NativeImageOps::new(Some(100), 1.0);
        let frame = DynamicImage::ImageRgb8(RgbImage::new(200, 150));
        let gray = ops.to_gray_smoothed(&frame).unwrap();
        assert_eq!(ops.dimensions(&gray), (100, 75));
    }

    #[test]
    fn test_to_gray_rejects_empty_frame() {
        let ops = NativeImageOps::default();
        let frame = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(ops.to_gray_smoothed(&frame).is_err());
    }
}
