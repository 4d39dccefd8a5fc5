//! Sound cue playback.
//!
//! Playback is fire-and-forget: a cue starts an external player process and
//! returns immediately. Failures are logged and never reach the caller.

use crate::config::SoundConfig;
use crate::error::CueError;
use sentry_models::Cue;
use sentry_vision::ComponentLogger;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Plays sound cues without blocking.
pub trait CuePlayer: Send {
    fn play(&self, cue: Cue);
}

/// Plays cue files through an external command-line player.
pub struct ProcessCuePlayer {
    player: PathBuf,
    cue_dir: PathBuf,
    logger: ComponentLogger,
}

impl ProcessCuePlayer {
    /// Resolve the player executable on PATH.
    pub fn new(config: &SoundConfig, logger: ComponentLogger) -> Result<Self, CueError> {
        let player = which::which(&config.player)
            .map_err(|_| CueError::PlayerNotFound(config.player.clone()))?;
        logger.info(&format!("Using cue player {}", player.display()));

        Ok(Self {
            player,
            cue_dir: config.cue_dir.clone(),
            logger,
        })
    }

    /// Path of the sound file for `cue`.
    pub fn cue_path(&self, cue: Cue) -> PathBuf {
        self.cue_dir.join(cue.file_name())
    }

    /// Start the player for `cue` without waiting for it to finish.
    pub fn try_play(&self, cue: Cue) -> Result<(), CueError> {
        let path = self.cue_path(cue);
        if !path.is_file() {
            return Err(CueError::MissingFile(path));
        }

        let mut child = Command::new(&self.player)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        // Reap the child off the control thread.
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

impl CuePlayer for ProcessCuePlayer {
    fn play(&self, cue: Cue) {
        if let Err(e) = self.try_play(cue) {
            warn!(component = self.logger.component(), cue = %cue, "Cue playback failed: {}", e);
        }
    }
}

/// Discards every cue. Used when sound is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentCuePlayer;

impl CuePlayer for SilentCuePlayer {
    fn play(&self, _cue: Cue) {}
}

/// Records cues in order. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingCuePlayer {
    played: Arc<Mutex<Vec<Cue>>>,
}

impl RecordingCuePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cues played so far.
    pub fn played(&self) -> Vec<Cue> {
        self.played.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of times `cue` was played.
    pub fn count(&self, cue: Cue) -> usize {
        self.played().iter().filter(|c| **c == cue).count()
    }

    pub fn clear(&self) {
        if let Ok(mut played) = self.played.lock() {
            played.clear();
        }
    }
}

impl CuePlayer for RecordingCuePlayer {
    fn play(&self, cue: Cue) {
        if let Ok(mut played) = self.played.lock() {
            played.push(cue);
        }
    }
}

/// Build the cue player for the configuration.
///
/// A missing player executable downgrades to silence rather than failing.
pub fn cue_player_from_config(
    sound_enabled: bool,
    config: &SoundConfig,
    logger: ComponentLogger,
) -> Box<dyn CuePlayer> {
    if !sound_enabled {
        logger.info("Sound disabled");
        return Box::new(SilentCuePlayer);
    }

    match ProcessCuePlayer::new(config, logger) {
        Ok(player) => Box::new(player),
        Err(e) => {
            logger.warn(&format!("Sound unavailable, continuing silently: {e}"));
            Box::new(SilentCuePlayer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_player_shares_record() {
        let recorder = RecordingCuePlayer::new();
        let handle = recorder.clone();
        recorder.play(Cue::Ping);
        recorder.play(Cue::Warn);
        recorder.play(Cue::Ping);

        assert_eq!(handle.played(), vec![Cue::Ping, Cue::Warn, Cue::Ping]);
        assert_eq!(handle.count(Cue::Ping), 2);
        handle.clear();
        assert!(recorder.played().is_empty());
    }

    #[test]
    fn test_unknown_player_is_not_found() {
        let config = SoundConfig {
            cue_dir: PathBuf::from("data"),
            player: "definitely-not-a-real-player-binary".to_string(),
        };
        let result = ProcessCuePlayer::new(&config, ComponentLogger::new("cues"));
        assert!(matches!(result, Err(CueError::PlayerNotFound(_))));
    }

    #[test]
    fn test_missing_cue_file_reported() {
        let player = ProcessCuePlayer {
            player: PathBuf::from("/bin/true"),
            cue_dir: PathBuf::from("/nonexistent/cues"),
            logger: ComponentLogger::new("cues"),
        };
        assert!(matches!(player.try_play(Cue::Ping), Err(CueError::MissingFile(_))));
        // Logged, never propagated.
        player.play(Cue::Ping);
    }

    #[test]
    fn test_disabled_sound_is_silent() {
        let player = cue_player_from_config(false, &SoundConfig::default(), ComponentLogger::new("cues"));
        player.play(Cue::Init);
    }
}
