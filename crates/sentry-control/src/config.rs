//! Sentry configuration.
//!
//! Settings come from a TOML file, optionally overridden by `SENTRY__*`
//! environment variables (e.g. `SENTRY__STARTING_AMMO=50`,
//! `SENTRY__TURRET__PORT=/dev/ttyACM0`). The top-level control fields are all
//! required; missing or malformed values abort startup.

use crate::error::{SentryError, SentryResult};
use config::{Config, Environment, File, FileFormat};
use sentry_vision::TrackerSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Full sentry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentryConfig {
    /// Verbose per-tick and per-region logging
    pub debug: bool,

    // === Timing (milliseconds) ===
    /// Delay after startup before arming
    pub init_time: u64,
    /// Length of the warning period before engaging
    pub warning_time: u64,
    /// Ping period while armed
    pub armed_ping_interval: u64,
    /// Ping period during the warning period
    pub warning_ping_interval: u64,
    /// Minimum time between shots
    pub shoot_interval: u64,

    // === Detection ===
    /// Regions below this pixel area are treated as noise
    pub detector_min_area: f64,
    /// Follow only the largest moving region
    pub trace_max_object_only: bool,

    // === Ammunition ===
    pub starting_ammo: u32,

    // === Turret limits (degrees) ===
    pub yaw_min: f64,
    pub yaw_max: f64,
    pub pitch_min: f64,
    pub pitch_max: f64,

    // === Sound ===
    pub sound_enabled: bool,

    /// Minimum tick period in milliseconds (0 = run as fast as frames arrive)
    #[serde(default)]
    pub tick_interval_ms: u64,

    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub turret: TurretConfig,

    #[serde(default)]
    pub sound: SoundConfig,
}

/// Frame acquisition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Capture device index (OpenCV builds)
    pub device_index: i32,
    /// Replay frames from this path instead of a live device
    pub video_path: Option<PathBuf>,
    /// Frames are resized to this width before detection
    pub processing_width: u32,
    /// Capture on a background thread and always process the newest frame
    pub threaded: bool,
    /// How long a tick waits for a frame from the capture thread
    pub frame_timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            video_path: None,
            processing_width: 500,
            threaded: false,
            frame_timeout_ms: 2000,
        }
    }
}

/// Low-level motion detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Per-pixel difference level counted as motion (0-255)
    pub threshold: u8,
    /// Dilation passes over the motion mask
    pub dilate_iterations: u32,
    /// Gaussian blur sigma for the pure-Rust backend
    pub blur_sigma: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 50,
            dilate_iterations: 2,
            blur_sigma: 3.5,
        }
    }
}

/// Actuator connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurretConfig {
    /// Device path of the actuator controller; absent means run without one
    pub port: Option<PathBuf>,
    pub yaw_pin: u8,
    pub pitch_pin: u8,
}

impl Default for TurretConfig {
    fn default() -> Self {
        Self {
            port: None,
            yaw_pin: 0,
            pitch_pin: 1,
        }
    }
}

/// Cue playback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    /// Directory holding the cue sound files
    pub cue_dir: PathBuf,
    /// External player executable, looked up on PATH
    pub player: String,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            cue_dir: PathBuf::from("data"),
            player: "aplay".to_string(),
        }
    }
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            debug: false,
            init_time: 0,
            warning_time: 0,
            armed_ping_interval: 2000,
            warning_ping_interval: 500,
            shoot_interval: 1000,
            detector_min_area: 2000.0,
            trace_max_object_only: true,
            starting_ammo: 100,
            yaw_min: -45.0,
            yaw_max: 45.0,
            pitch_min: -30.0,
            pitch_max: 30.0,
            sound_enabled: false,
            tick_interval_ms: 0,
            camera: CameraConfig::default(),
            detector: DetectorConfig::default(),
            turret: TurretConfig::default(),
            sound: SoundConfig::default(),
        }
    }
}

impl SentryConfig {
    /// Load from a TOML file plus `SENTRY__*` environment overrides, then validate.
    pub fn load<P: AsRef<Path>>(path: P) -> SentryResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SentryError::configuration(format!(
                "settings file not found: {}",
                path.display()
            )));
        }

        let config: SentryConfig = Config::builder()
            .add_source(File::new(&path.to_string_lossy(), FileFormat::Toml).required(true))
            .add_source(
                Environment::with_prefix("SENTRY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text without consulting the environment, then validate.
    pub fn from_toml_str(text: &str) -> SentryResult<Self> {
        let config: SentryConfig = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the control loop cannot run with.
    pub fn validate(&self) -> SentryResult<()> {
        let angles = [
            ("yaw_min", self.yaw_min),
            ("yaw_max", self.yaw_max),
            ("pitch_min", self.pitch_min),
            ("pitch_max", self.pitch_max),
        ];
        for (name, value) in angles {
            if !value.is_finite() {
                return Err(SentryError::configuration(format!("{name} must be finite")));
            }
        }

        if self.yaw_min >= self.yaw_max {
            return Err(SentryError::configuration(format!(
                "yaw_min ({}) must be below yaw_max ({})",
                self.yaw_min, self.yaw_max
            )));
        }
        if self.pitch_min >= self.pitch_max {
            return Err(SentryError::configuration(format!(
                "pitch_min ({}) must be below pitch_max ({})",
                self.pitch_min, self.pitch_max
            )));
        }
        if !(self.detector_min_area >= 0.0) {
            return Err(SentryError::configuration(
                "detector_min_area must be a non-negative number",
            ));
        }
        if self.shoot_interval == 0 {
            return Err(SentryError::configuration("shoot_interval must be positive"));
        }
        if self.camera.processing_width == 0 {
            return Err(SentryError::configuration("camera.processing_width must be positive"));
        }
        if self.detector.threshold == 0 {
            return Err(SentryError::configuration("detector.threshold must be positive"));
        }
        if !(self.detector.blur_sigma >= 0.0) {
            return Err(SentryError::configuration("detector.blur_sigma must be non-negative"));
        }

        Ok(())
    }

    /// Motion tracker parameters.
    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            min_area: self.detector_min_area,
            max_object_only: self.trace_max_object_only,
            threshold: self.detector.threshold,
            dilate_iterations: self.detector.dilate_iterations,
            debug: self.debug,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.camera.frame_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        debug = false
        init_time = 3000
        warning_time = 2000
        detector_min_area = 1500.0
        trace_max_object_only = false
        armed_ping_interval = 2000
        warning_ping_interval = 500
        shoot_interval = 800
        starting_ammo = 40
        yaw_min = -45.0
        yaw_max = 45.0
        pitch_min = -30.0
        pitch_max = 30.0
        sound_enabled = true

        [turret]
        port = "/dev/ttyACM0"
        yaw_pin = 9

        [detector]
        threshold = 40
    "#;

    #[test]
    fn test_parse_full_settings() {
        let config = SentryConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.init_time, 3000);
        assert_eq!(config.starting_ammo, 40);
        assert!(!config.trace_max_object_only);
        assert_eq!(config.turret.port, Some(PathBuf::from("/dev/ttyACM0")));
        assert_eq!(config.turret.yaw_pin, 9);
        assert_eq!(config.turret.pitch_pin, 1);
        assert_eq!(config.detector.threshold, 40);
        assert_eq!(config.detector.dilate_iterations, 2);
        assert_eq!(config.camera.processing_width, 500);
    }

    #[test]
    fn test_missing_required_field_is_fatal() {
        let text = FULL.replace("starting_ammo = 40", "");
        let err = SentryConfig::from_toml_str(&text).unwrap_err();
        assert!(err.is_configuration(), "unexpected error: {err}");
    }

    #[test]
    fn test_wrong_type_is_fatal() {
        let text = FULL.replace("shoot_interval = 800", "shoot_interval = \"fast\"");
        assert!(SentryConfig::from_toml_str(&text).unwrap_err().is_configuration());
    }

    #[test]
    fn test_inverted_limits_rejected() {
        let text = FULL.replace("yaw_min = -45.0", "yaw_min = 50.0");
        let err = SentryConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, SentryError::Configuration(ref msg) if msg.contains("yaw_min")));
    }

    #[test]
    fn test_zero_shoot_interval_rejected() {
        let text = FULL.replace("shoot_interval = 800", "shoot_interval = 0");
        assert!(SentryConfig::from_toml_str(&text).is_err());
    }

    #[test]
    fn test_default_is_valid() {
        SentryConfig::default().validate().unwrap();
        let settings = SentryConfig::default().tracker_settings();
        assert_eq!(settings.min_area, 2000.0);
        assert!(settings.max_object_only);
    }

    #[test]
    fn test_load_missing_file() {
        let err = SentryConfig::load("/no/such/Settings.toml").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Settings.toml");
        std::fs::write(&path, FULL).unwrap();

        let config = SentryConfig::load(&path).unwrap();
        assert_eq!(config.shoot_interval, 800);
        assert_eq!(config.warning_time, 2000);
    }
}
