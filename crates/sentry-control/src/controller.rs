//! The sentry control loop.
//!
//! One tick = acquire frame -> update tracker -> evaluate the state machine
//! -> aim and command the turret. The loop is single threaded; the only
//! blocking point is frame acquisition.

use crate::actuator::TurretActuationMapper;
use crate::config::SentryConfig;
use crate::cues::{cue_player_from_config, CuePlayer};
use crate::error::{SentryError, SentryResult};
use crate::state_machine::{SentryStateMachine, SentryTimings};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sentry_models::{SentryMode, TurretCommand, Vector2};
use sentry_vision::{
    Clock, ComponentLogger, FrameSource, ImageOps, MotionTracker, SystemClock, TargetSource, VisionError,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Cooperative stop request, checked once per tick. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Snapshot of the loop for an external renderer or the debug log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub mode: SentryMode,
    pub label: &'static str,
    pub ammo: u32,
    pub target: Vector2,
    pub detected: bool,
    pub commanded: Option<TurretCommand>,
    pub read_back_yaw: Option<f64>,
    pub read_back_pitch: Option<f64>,
    pub path_len: usize,
    pub ticks: u64,
}

/// Owns every collaborator of one sentry run.
pub struct SentryController<S, O>
where
    S: FrameSource,
    O: ImageOps<Frame = S::Frame>,
{
    source: S,
    tracker: MotionTracker<O>,
    machine: SentryStateMachine,
    mapper: TurretActuationMapper,
    clock: Arc<dyn Clock>,
    stop: StopSignal,
    tick_interval: Duration,
    debug: bool,
    logger: ComponentLogger,
    last_tick_time: u64,
    ticks: u64,
    shut_down: bool,
}

impl<S, O> SentryController<S, O>
where
    S: FrameSource,
    O: ImageOps<Frame = S::Frame>,
{
    /// Assemble a controller from explicit collaborators.
    pub fn new(
        config: &SentryConfig,
        source: S,
        ops: O,
        clock: Arc<dyn Clock>,
        cues: Box<dyn CuePlayer>,
        mapper: TurretActuationMapper,
        rng: StdRng,
    ) -> Self {
        let mut tracker = MotionTracker::new(
            ops,
            config.tracker_settings(),
            Arc::clone(&clock),
            ComponentLogger::new("tracker"),
        );
        let machine = SentryStateMachine::new(
            SentryTimings::from_config(config),
            config.starting_ammo,
            Arc::clone(&clock),
            cues,
            rng,
            ComponentLogger::new("sentry"),
            &mut tracker,
        );
        let last_tick_time = clock.now_ms();

        Self {
            source,
            tracker,
            machine,
            mapper,
            clock,
            stop: StopSignal::new(),
            tick_interval: config.tick_interval(),
            debug: config.debug,
            logger: ComponentLogger::new("controller"),
            last_tick_time,
            ticks: 0,
            shut_down: false,
        }
    }

    /// Assemble a controller with the system clock, configured cue player
    /// and actuator, and an OS-seeded random source.
    pub fn from_config(config: &SentryConfig, source: S, ops: O) -> Self {
        let cues = cue_player_from_config(config.sound_enabled, &config.sound, ComponentLogger::new("cues"));
        let mapper = TurretActuationMapper::from_config(config, ComponentLogger::new("turret"));
        Self::new(
            config,
            source,
            ops,
            Arc::new(SystemClock::new()),
            cues,
            mapper,
            StdRng::from_os_rng(),
        )
    }

    /// Handle that stops [`run`](Self::run) at the next tick boundary.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn mode(&self) -> SentryMode {
        self.machine.mode()
    }

    pub fn ammo(&self) -> u32 {
        self.machine.ammo()
    }

    pub fn tracker(&self) -> &MotionTracker<O> {
        &self.tracker
    }

    pub fn mapper(&self) -> &TurretActuationMapper {
        &self.mapper
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Drop the motion reference; the next active frame becomes the new one.
    pub fn reset_detector(&mut self) {
        self.logger.info("Resetting motion detector");
        self.tracker.reset();
    }

    /// Run one tick.
    ///
    /// Acquisition errors are returned to the caller; nothing else fails. A
    /// frame the tracker cannot process counts as a tick without detection.
    pub fn tick_once(&mut self) -> SentryResult<SentryMode> {
        let now = self.clock.now_ms();
        let delta = now.saturating_sub(self.last_tick_time);
        self.last_tick_time = now;

        let frame = self.source.next_frame()?;
        match self.tracker.update(&frame) {
            Ok(_) => {}
            Err(e) if e.is_acquisition() => return Err(e.into()),
            Err(e) => warn!(component = self.logger.component(), "Skipping frame: {}", e),
        }
        let mode = self.machine.tick(delta, &mut self.tracker, &mut self.mapper);
        self.ticks += 1;

        if self.debug {
            match serde_json::to_string(&self.status()) {
                Ok(json) => debug!(component = self.logger.component(), status = %json, "Tick"),
                Err(e) => debug!(component = self.logger.component(), "Failed to serialize status: {}", e),
            }
        }

        Ok(mode)
    }

    /// Tick until stopped or acquisition fails, then shut down.
    ///
    /// Returns the number of ticks run.
    pub fn run(&mut self) -> SentryResult<u64> {
        let _span = self.logger.create_span().entered();
        self.logger.info(&format!(
            "Control loop started (tick interval {} ms)",
            self.tick_interval.as_millis()
        ));

        while !self.stop.is_triggered() {
            let started = Instant::now();

            if let Err(e) = self.tick_once() {
                if is_end_of_stream(&e) {
                    self.logger.info("Frame source exhausted");
                } else {
                    error!(component = self.logger.component(), "Frame acquisition failed: {}", e);
                }
                self.shutdown();
                return Err(e);
            }

            let spent = started.elapsed();
            if spent < self.tick_interval {
                std::thread::sleep(self.tick_interval - spent);
            }
        }

        info!(component = self.logger.component(), ticks = self.ticks, "Stop requested");
        self.shutdown();
        Ok(self.ticks)
    }

    /// Release the frame source and the actuator. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.source.release();
        self.mapper.disconnect();
        info!(
            component = self.logger.component(),
            ticks = self.ticks,
            ammo = self.machine.ammo(),
            mode = self.machine.mode().as_str(),
            "Sentry shut down"
        );
    }

    pub fn status(&mut self) -> Status {
        let (read_back_yaw, read_back_pitch) = self.mapper.read_back();
        let mode = self.machine.mode();
        Status {
            mode,
            label: mode.label(),
            ammo: self.machine.ammo(),
            target: self.tracker.target(),
            detected: self.tracker.is_detected(),
            commanded: self.mapper.commanded(),
            read_back_yaw,
            read_back_pitch,
            path_len: self.tracker.path().len(),
            ticks: self.ticks,
        }
    }
}

/// True when a run ended because a finite frame source ran out of frames.
pub fn is_end_of_stream(err: &SentryError) -> bool {
    matches!(err, SentryError::Acquisition(VisionError::NoFrame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{AngleLimits, RecordingActuator};
    use crate::cues::RecordingCuePlayer;
    use sentry_models::{BoundingBox, Cue, Region};
    use sentry_vision::{ManualClock, VisionResult};
    use std::collections::VecDeque;

    /// Frames are the regions the backend should report.
    struct RegionOps;

    impl ImageOps for RegionOps {
        type Frame = Vec<Region>;
        type Gray = Vec<Region>;
        type Binary = Vec<Region>;

        fn to_gray_smoothed(&self, frame: &Vec<Region>) -> VisionResult<Vec<Region>> {
            if frame.iter().any(|r| r.area < 0.0) {
                return Err(VisionError::image_op("unreadable frame"));
            }
            Ok(frame.clone())
        }

        fn abs_diff(&self, _reference: &Vec<Region>, current: &Vec<Region>) -> VisionResult<Vec<Region>> {
            Ok(current.clone())
        }

        fn threshold(&self, delta: &Vec<Region>, _level: u8) -> VisionResult<Vec<Region>> {
            Ok(delta.clone())
        }

        fn dilate(&self, mask: Vec<Region>, _iterations: u32) -> VisionResult<Vec<Region>> {
            Ok(mask)
        }

        fn find_regions(&self, mask: &Vec<Region>) -> VisionResult<Vec<Region>> {
            Ok(mask.clone())
        }

        fn dimensions(&self, _gray: &Vec<Region>) -> (u32, u32) {
            (500, 400)
        }
    }

    /// Frame source that advances the clock by a fixed step per frame.
    struct ScriptedSource {
        frames: VecDeque<Vec<Region>>,
        clock: ManualClock,
        step_ms: u64,
        released: Arc<AtomicBool>,
    }

    impl FrameSource for ScriptedSource {
        type Frame = Vec<Region>;

        fn next_frame(&mut self) -> VisionResult<Vec<Region>> {
            self.clock.advance(self.step_ms);
            self.frames.pop_front().ok_or(VisionError::NoFrame)
        }

        fn dimensions(&self) -> (u32, u32) {
            (500, 400)
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn intruder() -> Vec<Region> {
        vec![Region::from_bbox(BoundingBox::new(450.0, 0.0, 50.0, 50.0), 2500.0)]
    }

    fn corrupt() -> Vec<Region> {
        vec![Region::from_bbox(BoundingBox::new(0.0, 0.0, 1.0, 1.0), -1.0)]
    }

    struct Rig {
        controller: SentryController<ScriptedSource, RegionOps>,
        cues: RecordingCuePlayer,
        actuator: RecordingActuator,
        released: Arc<AtomicBool>,
    }

    fn rig(frames: Vec<Vec<Region>>, ammo: u32) -> Rig {
        let config = SentryConfig {
            init_time: 100,
            warning_time: 200,
            shoot_interval: 300,
            starting_ammo: ammo,
            ..SentryConfig::default()
        };
        let clock = ManualClock::new(0);
        let released = Arc::new(AtomicBool::new(false));
        let source = ScriptedSource {
            frames: frames.into(),
            clock: clock.clone(),
            step_ms: 50,
            released: Arc::clone(&released),
        };
        let cues = RecordingCuePlayer::new();
        let actuator = RecordingActuator::new();
        let mapper = TurretActuationMapper::new(
            AngleLimits::from_config(&config),
            Some(Box::new(actuator.clone())),
            ComponentLogger::new("turret"),
        );
        let controller = SentryController::new(
            &config,
            source,
            RegionOps,
            Arc::new(clock),
            Box::new(cues.clone()),
            mapper,
            StdRng::seed_from_u64(3),
        );
        Rig {
            controller,
            cues,
            actuator,
            released,
        }
    }

    #[test]
    fn test_intruder_is_engaged_until_magazine_is_empty() {
        let mut frames = vec![Vec::new(); 4];
        frames.extend(std::iter::repeat(intruder()).take(40));
        let mut rig = rig(frames, 2);

        let err = rig.controller.run().unwrap_err();
        assert!(is_end_of_stream(&err));

        assert_eq!(rig.controller.mode(), SentryMode::Depleted);
        assert_eq!(rig.controller.ammo(), 0);
        assert_eq!(rig.cues.count(Cue::Warn), 1);
        assert_eq!(rig.cues.count(Cue::Empty), 1);
        let shots = rig.cues.played().iter().filter(|c| c.is_shot()).count();
        assert_eq!(shots, 2);

        // Aimed at the intruder in the top-right corner.
        let commanded = rig.controller.mapper().commanded().unwrap();
        assert!((commanded.yaw - 40.5).abs() < 1e-9);
        assert!((commanded.pitch - 26.25).abs() < 1e-9);
        assert!(!rig.actuator.commands().is_empty());
        assert!(rig.released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_quiet_scene_stays_armed() {
        let mut rig = rig(vec![Vec::new(); 20], 5);
        for _ in 0..20 {
            rig.controller.tick_once().unwrap();
        }
        assert_eq!(rig.controller.mode(), SentryMode::Armed);
        assert_eq!(rig.cues.count(Cue::Activate), 1);
        assert!(!rig.controller.tracker().is_detected());

        let status = rig.controller.status();
        assert_eq!(status.ammo, 5);
        assert_eq!(status.path_len, 0);
        assert_eq!(status.ticks, 20);
    }

    #[test]
    fn test_stop_signal_ends_run_and_releases() {
        let mut rig = rig(vec![Vec::new(); 5], 5);
        rig.controller.stop_signal().trigger();

        assert_eq!(rig.controller.run().unwrap(), 0);
        assert!(rig.released.load(Ordering::SeqCst));
        assert!(!rig.controller.mapper().is_connected());

        // Second shutdown is a no-op.
        rig.controller.shutdown();
    }

    #[test]
    fn test_status_serializes() {
        let mut rig = rig(vec![Vec::new()], 5);
        rig.controller.tick_once().unwrap();
        let json = serde_json::to_value(rig.controller.status()).unwrap();
        assert_eq!(json["mode"], "init");
        assert_eq!(json["label"], "INITIALIZING");
        assert_eq!(json["ammo"], 5);
    }

    #[test]
    fn test_unprocessable_frame_is_a_quiet_tick() {
        let mut frames = vec![Vec::new(); 4];
        frames.push(corrupt());
        frames.extend(std::iter::repeat(Vec::new()).take(3));
        let mut rig = rig(frames, 5);

        let err = rig.controller.run().unwrap_err();
        assert!(is_end_of_stream(&err));
        assert_eq!(rig.controller.ticks(), 8);
        assert_eq!(rig.controller.mode(), SentryMode::Armed);
        assert_eq!(rig.cues.count(Cue::Warn), 0);
    }
}
