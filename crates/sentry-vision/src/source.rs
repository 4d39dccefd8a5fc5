//! Frame sources.

use crate::error::{VisionError, VisionResult};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Image file extensions picked up by [`ImageSequenceSource`].
const SEQUENCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "pgm", "ppm"];

/// Producer of raw video frames.
pub trait FrameSource {
    type Frame;

    /// Block until the next frame is available.
    ///
    /// Any error is fatal to the tick that requested the frame.
    fn next_frame(&mut self) -> VisionResult<Self::Frame>;

    /// Native capture dimensions (width, height).
    fn dimensions(&self) -> (u32, u32);

    /// Release the underlying device. Further frames are not expected.
    fn release(&mut self) {}
}

/// Replays a directory of still images in lexical file-name order.
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    position: usize,
    dimensions: (u32, u32),
}

impl ImageSequenceSource {
    /// Open a directory of frames.
    ///
    /// The first frame is decoded eagerly to learn the capture dimensions.
    pub fn open<P: AsRef<Path>>(dir: P) -> VisionResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(VisionError::SourceNotFound(dir.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_frame = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| SEQUENCE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false);
            if is_frame {
                files.push(path);
            }
        }
        files.sort();

        let first = files
            .first()
            .ok_or_else(|| VisionError::acquisition(format!("no frames in {}", dir.display())))?;
        let first = image::open(first)?;
        let dimensions = (first.width(), first.height());

        info!(
            "Opened image sequence {:?}: {} frames, {}x{}",
            dir,
            files.len(),
            dimensions.0,
            dimensions.1
        );

        Ok(Self {
            files,
            position: 0,
            dimensions,
        })
    }

    /// Number of frames not yet delivered.
    pub fn remaining(&self) -> usize {
        self.files.len().saturating_sub(self.position)
    }
}

impl FrameSource for ImageSequenceSource {
    type Frame = DynamicImage;

    fn next_frame(&mut self) -> VisionResult<DynamicImage> {
        let path = self.files.get(self.position).ok_or(VisionError::NoFrame)?;
        self.position += 1;
        debug!("Reading frame {:?}", path);
        Ok(image::open(path)?)
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn release(&mut self) {
        self.position = self.files.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_sequence_replays_in_order_then_runs_dry() {
        let dir = tempfile::tempdir().unwrap();
        for (i, shade) in [10u8, 20, 30].iter().enumerate() {
            let img = GrayImage::from_pixel(8, 6, Luma([*shade]));
            img.save(dir.path().join(format!("frame_{i:03}.png"))).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ImageSequenceSource::open(dir.path()).unwrap();
        assert_eq!(source.dimensions(), (8, 6));
        assert_eq!(source.remaining(), 3);

        for shade in [10u8, 20, 30] {
            let frame = source.next_frame().unwrap().to_luma8();
            assert_eq!(frame.get_pixel(0, 0)[0], shade);
        }
        assert!(matches!(source.next_frame(), Err(VisionError::NoFrame)));
    }

    #[test]
    fn test_missing_directory() {
        let result = ImageSequenceSource::open("/definitely/not/here");
        assert!(matches!(result, Err(VisionError::SourceNotFound(_))));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path()),
            Err(VisionError::Acquisition(_))
        ));
    }

    #[test]
    fn test_release_stops_delivery() {
        let dir = tempfile::tempdir().unwrap();
        GrayImage::new(2, 2).save(dir.path().join("a.png")).unwrap();
        let mut source = ImageSequenceSource::open(dir.path()).unwrap();
        source.release();
        assert!(source.next_frame().is_err());
    }
}
