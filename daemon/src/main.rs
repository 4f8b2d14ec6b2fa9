mod calibrate;
mod capture;
mod classifier;
mod config;
mod detector;
mod display;
mod error;
mod paths;
mod similarity;
mod state;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::capture::MonitorSource;
use crate::classifier::ReferenceIcons;
use crate::config::Config;
use crate::detector::StateDetector;
use crate::display::{DisplayUpdater, FileTextSink};
use crate::state::PlayerState;

#[derive(Parser)]
#[command(name = "aimp-state-daemon")]
#[command(about = "Mirrors AIMP's playback state into a text file for stream overlays")]
#[command(version)]
struct Args {
    /// Config file. Defaults to config.toml in the app data directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the taskbar icon and write state changes (default)
    Run,
    /// Copy the now-playing file into the overlay label file
    Display,
    /// Save the configured screen region as a PNG
    Calibrate {
        /// Output file. Defaults to monitor_<index>_offset_<w>x<h>.png
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("aimp_state_daemon=info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_detector(config).await,
        Command::Display => run_display(config).await,
        Command::Calibrate { out } => run_calibrate(config, out),
    }
}

/// An explicitly given config must parse; the default one falls back to
/// built-in values with a warning.
fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                warn!("Config file {} not found, using defaults", path.display());
            }
            config::load_or_default(path)
        }
        None => {
            let path = paths::config_file_path();
            Ok(config::load_or_default(&path).unwrap_or_else(|e| {
                warn!("{e:#}, using defaults");
                Config::default()
            }))
        }
    }
}

async fn run_detector(config: Config) -> Result<()> {
    info!("aimp-state-daemon v{} started", env!("CARGO_PKG_VERSION"));

    let icon_dir = paths::resource_path(&config.detector.icon_dir);
    let icons = ReferenceIcons::load(&icon_dir, &config.detector.icons);
    if icons.is_empty() {
        warn!(
            "No reference icons found in {}; every poll will report {}",
            icon_dir.display(),
            PlayerState::Stopped
        );
    } else {
        info!("{} reference icons loaded", icons.len());
    }

    let source = MonitorSource::new(config.capture.monitor);
    let detector = StateDetector::new(source, icons, config.capture.region(), &config.detector);
    let last = detector.run(stop_on_ctrl_c()).await;

    // Nobody is watching the icon any more; don't leave a stale state behind.
    if last != PlayerState::Stopped {
        state::write_state(&config.detector.state_file, PlayerState::Stopped);
    }
    info!("Shutting down");
    Ok(())
}

async fn run_display(config: Config) -> Result<()> {
    let sink = FileTextSink::new(config.display.output_file.clone());
    let updater = DisplayUpdater::new(&config.display, sink);
    info!(
        "Display updater started ('{}' <- {})",
        updater.source_name(),
        updater.input().display()
    );
    updater
        .run(config.display.refresh_interval(), stop_on_ctrl_c())
        .await;
    info!("Shutting down");
    Ok(())
}

fn run_calibrate(config: Config, out: Option<PathBuf>) -> Result<()> {
    let region = config.capture.region();
    let mut source = MonitorSource::new(config.capture.monitor);
    let out = out.unwrap_or_else(|| calibrate::default_output_name(source.index(), &region));
    info!("Capturing monitor {}...", source.index());
    calibrate::capture_to_file(&mut source, &region, &out)?;
    Ok(())
}

/// Returns a receiver that turns `true` on Ctrl+C.
fn stop_on_ctrl_c() -> watch::Receiver<bool> {
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = stop_tx.send(true);
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {e}");
                // Keep the sender alive so the loop keeps running.
                std::future::pending::<()>().await;
            }
        }
    });
    stop_rx
}
