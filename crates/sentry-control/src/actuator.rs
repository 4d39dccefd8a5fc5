//! Turret actuation.
//!
//! The actuator is open loop: commands are issued and forgotten. A missing or
//! failing actuator never stalls the control loop; the mapper keeps tracking
//! what it *would* have commanded.

use crate::config::{SentryConfig, TurretConfig};
use crate::error::ActuatorError;
use sentry_models::{Axis, TurretCommand, Vector2};
use sentry_vision::{ComponentLogger, LatestFrameSlot};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Logical command interface of the actuator hardware.
pub trait ActuatorBus: Send {
    /// Drive one axis to `degrees`.
    fn set_angle(&mut self, axis: Axis, degrees: f64) -> Result<(), ActuatorError>;

    /// Best-effort readback of the axis position; may be the last known value.
    fn read_angle(&mut self, axis: Axis) -> Option<f64>;
}

/// Latest requested angle per axis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct AxisSetpoints {
    yaw: Option<f64>,
    pitch: Option<f64>,
}

impl AxisSetpoints {
    fn get(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::Yaw => self.yaw,
            Axis::Pitch => self.pitch,
        }
    }

    fn set(&mut self, axis: Axis, degrees: f64) {
        match axis {
            Axis::Yaw => self.yaw = Some(degrees),
            Axis::Pitch => self.pitch = Some(degrees),
        }
    }
}

/// How long the writer thread waits for a setpoint before rechecking the slot.
const WRITER_POLL: Duration = Duration::from_millis(100);

/// Writes one ASCII line per command, `"<pin>:<degrees>\n"`, to a device
/// such as a USB serial port.
///
/// Writes happen on a dedicated thread fed through a [`LatestFrameSlot`], so
/// `set_angle` never waits on the device. A device that stops draining holds
/// up only the writer thread; newer setpoints replace the pending ones.
pub struct SerialLineActuator {
    slot: LatestFrameSlot<AxisSetpoints>,
    requested: AxisSetpoints,
    written: Arc<Mutex<AxisSetpoints>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl SerialLineActuator {
    /// Open the configured device for writing.
    pub fn open(config: &TurretConfig) -> Result<Self, ActuatorError> {
        let port = config.port.as_ref().ok_or(ActuatorError::Disconnected)?;
        let device = OpenOptions::new().write(true).open(port)?;
        Self::from_writer(Box::new(device), config.yaw_pin, config.pitch_pin)
    }

    /// Start the writer thread over `writer`.
    pub fn from_writer(writer: Box<dyn Write + Send>, yaw_pin: u8, pitch_pin: u8) -> Result<Self, ActuatorError> {
        let slot: LatestFrameSlot<AxisSetpoints> = LatestFrameSlot::new();
        let written = Arc::new(Mutex::new(AxisSetpoints::default()));
        let failure = Arc::new(Mutex::new(None));

        let writer_slot = slot.clone();
        let writer_written = Arc::clone(&written);
        let writer_failure = Arc::clone(&failure);
        std::thread::Builder::new()
            .name("actuator-writer".to_string())
            .spawn(move || {
                write_setpoints(writer, yaw_pin, pitch_pin, writer_slot, writer_written, writer_failure)
            })?;

        Ok(Self {
            slot,
            requested: AxisSetpoints::default(),
            written,
            failure,
        })
    }
}

/// Writer thread body: write each axis whose setpoint changed since the last
/// successful write, until the slot is closed.
fn write_setpoints(
    mut writer: Box<dyn Write + Send>,
    yaw_pin: u8,
    pitch_pin: u8,
    slot: LatestFrameSlot<AxisSetpoints>,
    written: Arc<Mutex<AxisSetpoints>>,
    failure: Arc<Mutex<Option<String>>>,
) {
    let mut last = AxisSetpoints::default();
    loop {
        let Some(setpoints) = slot.take(WRITER_POLL) else {
            if slot.is_closed() {
                break;
            }
            continue;
        };

        for (axis, pin) in [(Axis::Yaw, yaw_pin), (Axis::Pitch, pitch_pin)] {
            let Some(degrees) = setpoints.get(axis) else {
                continue;
            };
            if last.get(axis) == Some(degrees) {
                continue;
            }

            let line = format!("{}:{:.1}\n", pin, degrees);
            match writer.write_all(line.as_bytes()).and_then(|_| writer.flush()) {
                Ok(()) => {
                    last.set(axis, degrees);
                    if let Ok(mut written) = written.lock() {
                        written.set(axis, degrees);
                    }
                }
                Err(e) => {
                    warn!(axis = %axis, "Actuator write failed: {}", e);
                    if let Ok(mut failure) = failure.lock() {
                        *failure = Some(e.to_string());
                    }
                }
            }
        }
    }
    debug!("Actuator writer thread exited");
}

impl ActuatorBus for SerialLineActuator {
    fn set_angle(&mut self, axis: Axis, degrees: f64) -> Result<(), ActuatorError> {
        if self.slot.is_closed() {
            return Err(ActuatorError::Disconnected);
        }

        self.requested.set(axis, degrees);
        self.slot.publish(self.requested);

        // Report a failure from an earlier write once.
        match self.failure.lock().ok().and_then(|mut f| f.take()) {
            Some(message) => Err(ActuatorError::write(axis, message)),
            None => Ok(()),
        }
    }

    fn read_angle(&mut self, axis: Axis) -> Option<f64> {
        self.written.lock().ok()?.get(axis)
    }
}

impl Drop for SerialLineActuator {
    fn drop(&mut self) {
        // The writer thread is detached; it exits once any write in progress returns.
        self.slot.close();
    }
}

/// In-memory actuator that records every command. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    commands: Arc<Mutex<Vec<(Axis, f64)>>>,
    failing: bool,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An actuator whose every command fails after being recorded.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn commands(&self) -> Vec<(Axis, f64)> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ActuatorBus for RecordingActuator {
    fn set_angle(&mut self, axis: Axis, degrees: f64) -> Result<(), ActuatorError> {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push((axis, degrees));
        }
        if self.failing {
            return Err(ActuatorError::write(axis, "simulated failure"));
        }
        Ok(())
    }

    fn read_angle(&mut self, axis: Axis) -> Option<f64> {
        if self.failing {
            return None;
        }
        self.commands
            .lock()
            .ok()?
            .iter()
            .rev()
            .find(|(a, _)| *a == axis)
            .map(|(_, degrees)| *degrees)
    }
}

/// Mechanical angle limits of the turret in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleLimits {
    pub yaw_min: f64,
    pub yaw_max: f64,
    pub pitch_min: f64,
    pub pitch_max: f64,
}

impl AngleLimits {
    pub fn from_config(config: &SentryConfig) -> Self {
        Self {
            yaw_min: config.yaw_min,
            yaw_max: config.yaw_max,
            pitch_min: config.pitch_min,
            pitch_max: config.pitch_max,
        }
    }

    /// Linear map from frame coordinates to turret angles.
    ///
    /// Image Y grows downward, so the top of the frame maps to `pitch_max`.
    /// Results are clamped to the limits for targets outside the frame.
    pub fn map_target_to_angles(&self, target: Vector2, frame_width: f64, frame_height: f64) -> TurretCommand {
        let yaw = self.yaw_min + (self.yaw_max - self.yaw_min) / frame_width * target.x;
        let pitch =
            self.pitch_min + (self.pitch_max - self.pitch_min) / -frame_height * (target.y - frame_height);

        TurretCommand::new(yaw, pitch).clamped((self.yaw_min, self.yaw_max), (self.pitch_min, self.pitch_max))
    }
}

/// Maps targets to angles and forwards changed setpoints to the actuator.
pub struct TurretActuationMapper {
    limits: AngleLimits,
    bus: Option<Box<dyn ActuatorBus>>,
    logger: ComponentLogger,
    requested: Option<TurretCommand>,
    commanded_yaw: Option<f64>,
    commanded_pitch: Option<f64>,
    commands_sent: u64,
}

impl TurretActuationMapper {
    /// Create a mapper. `bus = None` runs without hardware: commands are
    /// tracked but not delivered.
    pub fn new(limits: AngleLimits, bus: Option<Box<dyn ActuatorBus>>, logger: ComponentLogger) -> Self {
        if bus.is_none() {
            logger.warn("No actuator connected, turret commands will not be delivered");
        }

        Self {
            limits,
            bus,
            logger,
            requested: None,
            commanded_yaw: None,
            commanded_pitch: None,
            commands_sent: 0,
        }
    }

    /// Connect to the configured actuator, falling back to no actuator when
    /// the port is absent or cannot be opened.
    pub fn from_config(config: &SentryConfig, logger: ComponentLogger) -> Self {
        let bus: Option<Box<dyn ActuatorBus>> = match &config.turret.port {
            None => None,
            Some(port) => match SerialLineActuator::open(&config.turret) {
                Ok(actuator) => {
                    logger.info(&format!("Connected to actuator on {}", port.display()));
                    Some(Box::new(actuator))
                }
                Err(e) => {
                    logger.error(&format!("Failed to connect to actuator on {}: {e}", port.display()));
                    None
                }
            },
        };
        Self::new(AngleLimits::from_config(config), bus, logger)
    }

    pub fn limits(&self) -> &AngleLimits {
        &self.limits
    }

    pub fn is_connected(&self) -> bool {
        self.bus.is_some()
    }

    /// Map `target` within a frame of the given size and request those angles.
    ///
    /// Returns the requested command, or `None` when the frame size is unusable.
    pub fn aim_at(&mut self, target: Vector2, frame_width: u32, frame_height: u32) -> Option<TurretCommand> {
        if frame_width == 0 || frame_height == 0 {
            return None;
        }
        let command = self
            .limits
            .map_target_to_angles(target, frame_width as f64, frame_height as f64);
        self.requested = Some(command);
        Some(command)
    }

    /// Issue commands for axes whose requested angle changed since the last
    /// command. Returns the number of axis commands issued.
    ///
    /// Delivery is open loop, so the tick duration does not affect it.
    pub fn update(&mut self, _delta_ms: u64) -> usize {
        let Some(requested) = self.requested else {
            return 0;
        };

        let mut issued = 0;
        for axis in [Axis::Yaw, Axis::Pitch] {
            let angle = requested.get(axis);
            let last = match axis {
                Axis::Yaw => self.commanded_yaw,
                Axis::Pitch => self.commanded_pitch,
            };
            if last == Some(angle) {
                continue;
            }

            if let Some(bus) = self.bus.as_mut() {
                if let Err(e) = bus.set_angle(axis, angle) {
                    warn!(component = self.logger.component(), axis = %axis, "Actuator command failed: {}", e);
                }
            }
            match axis {
                Axis::Yaw => self.commanded_yaw = Some(angle),
                Axis::Pitch => self.commanded_pitch = Some(angle),
            }
            issued += 1;
        }

        if issued > 0 {
            self.commands_sent += issued as u64;
            debug!(component = self.logger.component(), yaw = requested.yaw, pitch = requested.pitch, "Turret commanded");
        }
        issued
    }

    /// Last commanded setpoint, once both axes have been commanded.
    pub fn commanded(&self) -> Option<TurretCommand> {
        match (self.commanded_yaw, self.commanded_pitch) {
            (Some(yaw), Some(pitch)) => Some(TurretCommand::new(yaw, pitch)),
            _ => None,
        }
    }

    /// Actuator-reported angles (yaw, pitch); `None` when unavailable.
    pub fn read_back(&mut self) -> (Option<f64>, Option<f64>) {
        match self.bus.as_mut() {
            Some(bus) => (bus.read_angle(Axis::Yaw), bus.read_angle(Axis::Pitch)),
            None => (None, None),
        }
    }

    /// Total axis commands issued.
    pub fn commands_sent(&self) -> u64 {
        self.commands_sent
    }

    /// Drop the actuator connection.
    pub fn disconnect(&mut self) {
        if self.bus.take().is_some() {
            self.logger.info("Actuator disconnected");
        }
    }
}
