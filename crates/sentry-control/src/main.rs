//! Sentry turret binary.

use anyhow::Context;
use clap::Parser;
use sentry_control::{is_end_of_stream, SentryConfig, SentryController};
use sentry_vision::{FrameGrabber, FrameSource, ImageOps};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "sentry-turret", version, about = "Motion-tracking sentry turret")]
struct Args {
    /// Path to the TOML settings file
    #[arg(long, default_value = "Settings.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config_path = args.config;

    info!("Starting sentry-turret");

    let config = match SentryConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration from {}: {}", config_path.display(), e);
            std::process::exit(1);
        }
    };
    info!("Sentry config: {:?}", config);

    if let Err(e) = run(config).await {
        error!("Sentry stopped: {:#}", e);
        std::process::exit(1);
    }

    info!("Sentry shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sentry=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .with(env_filter)
            .init();
    }
}

#[cfg(not(feature = "opencv"))]
async fn run(config: SentryConfig) -> anyhow::Result<()> {
    use sentry_control::SentryError;
    use sentry_vision::{ImageSequenceSource, NativeImageOps};

    let dir = config.camera.video_path.clone().ok_or_else(|| {
        SentryError::configuration("camera.video_path is required without the opencv feature")
    })?;
    let source = ImageSequenceSource::open(&dir)
        .with_context(|| format!("failed to open frame sequence {}", dir.display()))?;
    let ops = NativeImageOps::new(Some(config.camera.processing_width), config.detector.blur_sigma);

    run_with_source(config, source, ops).await
}

#[cfg(feature = "opencv")]
async fn run(config: SentryConfig) -> anyhow::Result<()> {
    use sentry_vision::{OpenCvCamera, OpenCvImageOps};

    let source = match &config.camera.video_path {
        Some(path) => OpenCvCamera::open_file(&path.to_string_lossy()),
        None => OpenCvCamera::open(config.camera.device_index),
    }
    .context("failed to open camera")?;
    let ops = OpenCvImageOps::new(Some(config.camera.processing_width));

    run_with_source(config, source, ops).await
}

async fn run_with_source<S, O>(config: SentryConfig, source: S, ops: O) -> anyhow::Result<()>
where
    S: FrameSource + Send + 'static,
    S::Frame: Send + 'static,
    O: ImageOps<Frame = S::Frame> + Send + 'static,
    O::Gray: Send + 'static,
{
    if config.camera.threaded {
        info!("Capturing frames on a background thread");
        let grabber = FrameGrabber::spawn(source, config.frame_timeout())?;
        drive(SentryController::from_config(&config, grabber, ops)).await
    } else {
        drive(SentryController::from_config(&config, source, ops)).await
    }
}

/// Run the blocking control loop off the async runtime, stopping it on Ctrl-C.
async fn drive<S, O>(mut controller: SentryController<S, O>) -> anyhow::Result<()>
where
    S: FrameSource + Send + 'static,
    O: ImageOps<Frame = S::Frame> + Send + 'static,
    O::Gray: Send + 'static,
{
    let stop = controller.stop_signal();
    let mut loop_handle = tokio::task::spawn_blocking(move || controller.run());

    let result = tokio::select! {
        joined = &mut loop_handle => joined,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            stop.trigger();
            loop_handle.await
        }
    };

    match result.context("control loop panicked")? {
        Ok(ticks) => {
            info!(ticks, "Control loop finished");
            Ok(())
        }
        Err(e) if is_end_of_stream(&e) => {
            info!("Frame source exhausted");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_to_settings_toml() {
        let args = Args::try_parse_from(["sentry-turret"]).unwrap();
        assert_eq!(args.config, PathBuf::from("Settings.toml"));
    }

    #[test]
    fn test_config_flag_forms() {
        let args = Args::try_parse_from(["sentry-turret", "--config", "/etc/sentry.toml"]).unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/sentry.toml"));
        let args = Args::try_parse_from(["sentry-turret", "--config=a.toml"]).unwrap();
        assert_eq!(args.config, PathBuf::from("a.toml"));
    }

    #[test]
    fn test_bad_args_are_rejected() {
        assert!(Args::try_parse_from(["sentry-turret", "--config"]).is_err());
        assert!(Args::try_parse_from(["sentry-turret", "--verbose"]).is_err());
    }
}
