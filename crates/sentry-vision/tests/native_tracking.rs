//! End-to-end tracking over real images with the pure-Rust backend.

use image::{DynamicImage, Rgb, RgbImage};
use sentry_models::Vector2;
use sentry_vision::{
    ComponentLogger, FrameSource, ImageSequenceSource, ManualClock, MotionTracker, NativeImageOps,
    TargetSource, TrackerSettings,
};
use std::sync::Arc;

const WIDTH: u32 = 200;
const HEIGHT: u32 = 160;

fn scene(squares: &[(u32, u32, u32)]) -> DynamicImage {
    sized_scene(WIDTH, HEIGHT, squares)
}

fn sized_scene(width: u32, height: u32, squares: &[(u32, u32, u32)]) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let lit = squares
            .iter()
            .any(|&(sx, sy, size)| x >= sx && x < sx + size && y >= sy && y < sy + size);
        if lit {
            Rgb([255, 255, 255])
        } else {
            Rgb([20, 20, 20])
        }
    });
    DynamicImage::ImageRgb8(img)
}

fn tracker(max_object_only: bool, min_area: f64) -> MotionTracker<NativeImageOps> {
    let mut tracker = MotionTracker::new(
        NativeImageOps::new(None, 0.0),
        TrackerSettings {
            min_area,
            max_object_only,
            threshold: 50,
            dilate_iterations: 2,
            debug: true,
        },
        Arc::new(ManualClock::new(0)),
        ComponentLogger::new("tracker"),
    );
    tracker.set_active(true);
    tracker
}

#[test]
fn static_scene_never_detects() {
    let mut tracker = tracker(true, 50.0);
    let background = scene(&[]);
    for _ in 0..5 {
        let sample = tracker.update(&background).unwrap();
        assert!(!sample.detected);
    }
    assert_eq!(tracker.target(), Vector2::ORIGIN);
    assert_eq!(tracker.frame_dimensions(), Some((WIDTH, HEIGHT)));
}

#[test]
fn appearing_square_is_located() {
    let mut tracker = tracker(true, 50.0);
    tracker.update(&scene(&[])).unwrap();

    let sample = tracker.update(&scene(&[(100, 60, 20)])).unwrap();
    assert!(sample.detected);
    assert_eq!(sample.count, 1);
    // Dilation grows the 20px square by two pixels on each side; the centre is unchanged.
    assert!((sample.centroid.x - 110.0).abs() <= 1.0, "x = {}", sample.centroid.x);
    assert!((sample.centroid.y - 70.0).abs() <= 1.0, "y = {}", sample.centroid.y);
}

#[test]
fn all_objects_mode_averages_two_squares() {
    let mut tracker = tracker(false, 50.0);
    tracker.update(&scene(&[])).unwrap();

    let sample = tracker.update(&scene(&[(20, 20, 20), (140, 100, 20)])).unwrap();
    assert!(sample.detected);
    assert_eq!(sample.count, 2);
    assert!((sample.centroid.x - 90.0).abs() <= 1.0);
    assert!((sample.centroid.y - 70.0).abs() <= 1.0);
}

#[test]
fn tracks_sequence_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    scene(&[]).save(dir.path().join("000.png")).unwrap();
    scene(&[(40, 40, 16)]).save(dir.path().join("001.png")).unwrap();
    scene(&[(60, 40, 16)]).save(dir.path().join("002.png")).unwrap();

    let mut source = ImageSequenceSource::open(dir.path()).unwrap();
    let mut tracker = tracker(true, 50.0);

    let mut detections = 0;
    while let Ok(frame) = source.next_frame() {
        if tracker.update(&frame).unwrap().detected {
            detections += 1;
        }
    }

    assert_eq!(detections, 2);
    assert_eq!(tracker.path().len(), 2);
    assert!(tracker.speed().x > 0.0);
}

#[test]
fn frame_size_change_recaptures_reference() {
    let mut tracker = tracker(true, 50.0);
    for _ in 0..5 {
        tracker.update(&scene(&[])).unwrap();
    }

    let resized = tracker.update(&sized_scene(WIDTH, 120, &[])).unwrap();
    assert!(!resized.detected);
    assert_eq!(tracker.frame_dimensions(), Some((WIDTH, 120)));
    assert!(tracker.has_reference());

    assert!(!tracker.update(&sized_scene(WIDTH, 120, &[])).unwrap().detected);
    let sample = tracker.update(&sized_scene(WIDTH, 120, &[(100, 60, 20)])).unwrap();
    assert!(sample.detected);
    assert!((sample.centroid.y - 70.0).abs() <= 1.0, "y = {}", sample.centroid.y);
}
