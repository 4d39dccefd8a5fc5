//! Sentry behaviour state machine.
//!
//! One evaluation pass runs per tick. Within a pass, self-transitions (pings,
//! shots) are applied first and a change of mode ends the pass, so a single
//! tick never chains Init -> Armed -> Warning.

use crate::actuator::TurretActuationMapper;
use crate::config::SentryConfig;
use crate::cues::CuePlayer;
use rand::rngs::StdRng;
use rand::Rng;
use sentry_models::{Cue, SentryMode};
use sentry_vision::{Clock, ComponentLogger, TargetSource};
use std::sync::Arc;
use tracing::info;

/// Timer settings of the state machine, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentryTimings {
    pub init_time: u64,
    pub warning_time: u64,
    pub armed_ping_interval: u64,
    pub warning_ping_interval: u64,
    pub shoot_interval: u64,
}

impl SentryTimings {
    pub fn from_config(config: &SentryConfig) -> Self {
        Self {
            init_time: config.init_time,
            warning_time: config.warning_time,
            armed_ping_interval: config.armed_ping_interval,
            warning_ping_interval: config.warning_ping_interval,
            shoot_interval: config.shoot_interval,
        }
    }
}

pub struct SentryStateMachine {
    mode: SentryMode,
    timings: SentryTimings,
    ammo: u32,
    clock: Arc<dyn Clock>,
    cues: Box<dyn CuePlayer>,
    rng: StdRng,
    logger: ComponentLogger,
    start_time: u64,
    last_ping_time: u64,
    warning_start_time: u64,
    /// May lie in the future: firing adds a random delay on top of the interval.
    last_shot_time: u64,
    shots_fired: u32,
}

impl SentryStateMachine {
    /// Create the state machine in `Init`. Plays the init cue and disables
    /// the tracker until arming.
    pub fn new(
        timings: SentryTimings,
        starting_ammo: u32,
        clock: Arc<dyn Clock>,
        cues: Box<dyn CuePlayer>,
        rng: StdRng,
        logger: ComponentLogger,
        tracker: &mut dyn TargetSource,
    ) -> Self {
        let now = clock.now_ms();

        logger.info(&format!(
            "Switching to state {} (ammo: {})",
            SentryMode::Init.label(),
            starting_ammo
        ));
        cues.play(Cue::Init);
        tracker.set_active(false);

        Self {
            mode: SentryMode::Init,
            timings,
            ammo: starting_ammo,
            clock,
            cues,
            rng,
            logger,
            start_time: now,
            last_ping_time: now,
            warning_start_time: now,
            last_shot_time: now,
            shots_fired: 0,
        }
    }

    pub fn mode(&self) -> SentryMode {
        self.mode
    }

    pub fn ammo(&self) -> u32 {
        self.ammo
    }

    pub fn shots_fired(&self) -> u32 {
        self.shots_fired
    }

    /// Earliest time at which the next shot may be fired.
    pub fn next_shot_time(&self) -> u64 {
        self.last_shot_time.saturating_add(self.timings.shoot_interval)
    }

    fn elapsed_since(&self, now: u64, since: u64) -> u64 {
        now.saturating_sub(since)
    }

    /// Move to `next`, running its entry effects once.
    ///
    /// Returns `false` for a no-op: same mode, or leaving `Depleted`.
    pub fn set_state(&mut self, next: SentryMode, tracker: &mut dyn TargetSource) -> bool {
        if self.mode == next || self.mode.is_sink() {
            return false;
        }

        let previous = self.mode;
        info!(
            component = self.logger.component(),
            from = previous.as_str(),
            to = next.as_str(),
            "Switching to state {}",
            next.label()
        );

        if previous == SentryMode::Init && next == SentryMode::Armed {
            tracker.set_active(true);
        }

        match next {
            SentryMode::Init => {
                self.cues.play(Cue::Init);
                tracker.set_active(false);
            }
            SentryMode::Armed if previous == SentryMode::Init => {
                self.cues.play(Cue::Activate);
            }
            SentryMode::Warning => {
                self.warning_start_time = self.clock.now_ms();
                self.cues.play(Cue::Warn);
            }
            SentryMode::Depleted => {
                self.logger.info("Out of ammo");
                self.cues.play(Cue::Empty);
            }
            SentryMode::Armed | SentryMode::Engaging => {}
        }

        self.mode = next;
        true
    }

    /// Run one evaluation pass, then aim the turret at the tracker's target
    /// and forward `delta_ms` to the mapper.
    pub fn tick(
        &mut self,
        delta_ms: u64,
        tracker: &mut dyn TargetSource,
        mapper: &mut TurretActuationMapper,
    ) -> SentryMode {
        self.evaluate(tracker);

        if let Some((width, height)) = tracker.frame_dimensions() {
            mapper.aim_at(tracker.target(), width, height);
        }
        mapper.update(delta_ms);

        self.mode
    }

    fn evaluate(&mut self, tracker: &mut dyn TargetSource) {
        let now = self.clock.now_ms();

        match self.mode {
            SentryMode::Init => {
                if self.elapsed_since(now, self.start_time) > self.timings.init_time {
                    self.set_state(SentryMode::Armed, tracker);
                }
            }
            SentryMode::Armed => {
                if self.elapsed_since(now, self.last_ping_time) > self.timings.armed_ping_interval {
                    self.ping(now);
                }
                if tracker.is_detected() {
                    self.set_state(SentryMode::Warning, tracker);
                }
            }
            SentryMode::Warning => {
                if self.elapsed_since(now, self.last_ping_time) > self.timings.warning_ping_interval {
                    self.ping(now);
                }
                if self.elapsed_since(now, self.warning_start_time) > self.timings.warning_time {
                    let next = if tracker.is_detected() {
                        SentryMode::Engaging
                    } else {
                        SentryMode::Armed
                    };
                    self.set_state(next, tracker);
                }
            }
            SentryMode::Engaging => {
                if !tracker.is_detected() {
                    self.set_state(SentryMode::Armed, tracker);
                } else if self.elapsed_since(now, self.last_shot_time) > self.timings.shoot_interval {
                    if self.ammo == 0 {
                        self.set_state(SentryMode::Depleted, tracker);
                    } else {
                        self.fire();
                    }
                }
            }
            SentryMode::Depleted => {}
        }
    }

    fn ping(&mut self, now: u64) {
        self.cues.play(Cue::Ping);
        self.last_ping_time = now;
    }

    /// Fire one shot: random shot cue, one round spent, next shot scheduled
    /// `shoot_interval` plus up to a quarter interval of jitter from now.
    ///
    /// Returns `false` without effect when out of ammo.
    pub fn fire(&mut self) -> bool {
        if self.ammo == 0 {
            return false;
        }

        let cue = if self.rng.random_bool(0.5) {
            Cue::ShootPrimary
        } else {
            Cue::ShootSecondary
        };
        self.cues.play(cue);
        self.ammo -= 1;
        self.shots_fired += 1;

        let max_jitter = self.timings.shoot_interval / 4;
        let jitter = if max_jitter == 0 {
            0
        } else {
            self.rng.random_range(0..max_jitter)
        };
        self.last_shot_time = self.clock.now_ms().saturating_add(jitter);

        info!(
            component = self.logger.component(),
            ammo = self.ammo,
            next_shot = self.next_shot_time(),
            "Shot fired"
        );
        true
    }
}
