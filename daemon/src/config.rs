use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::Region;
use crate::paths;

pub const DEFAULT_MONITOR: usize = 1;
pub const DEFAULT_OFFSET_X: u32 = 935;
pub const DEFAULT_OFFSET_Y: u32 = 1034;
pub const DEFAULT_ICON_SIZE: u32 = 37;
pub const DEFAULT_THRESHOLD: u8 = 87;
pub const MAX_THRESHOLD: u8 = 100;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 50;
pub const DEFAULT_ICON_DIR: &str = "resources/img";
pub const DEFAULT_STOPPED_ICON: &str = "default_idle_icon.png";
pub const DEFAULT_PAUSED_ICON: &str = "paused_icon.png";
pub const DEFAULT_PLAYING_ICON: &str = "playing_icon.png";
pub const DEFAULT_SOURCE_NAME: &str = "AIMP: Now Playing";
pub const DEFAULT_REFRESH_MS: u64 = 500;

/// Root configuration structure. Deserialized from `config.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Where on screen the AIMP taskbar icon lives.
#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    /// 1-based monitor index in enumeration order.
    #[serde(default = "default_monitor")]
    pub monitor: usize,
    #[serde(default = "default_offset_x")]
    pub offset_x: u32,
    #[serde(default = "default_offset_y")]
    pub offset_y: u32,
    #[serde(default = "default_icon_size")]
    pub width: u32,
    #[serde(default = "default_icon_size")]
    pub height: u32,
    /// Size the crop is resized to. Defaults to the crop size.
    pub output_width: Option<u32>,
    pub output_height: Option<u32>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            monitor: DEFAULT_MONITOR,
            offset_x: DEFAULT_OFFSET_X,
            offset_y: DEFAULT_OFFSET_Y,
            width: DEFAULT_ICON_SIZE,
            height: DEFAULT_ICON_SIZE,
            output_width: None,
            output_height: None,
        }
    }
}

impl CaptureConfig {
    /// The crop window described by this config.
    pub fn region(&self) -> Region {
        Region {
            x: self.offset_x,
            y: self.offset_y,
            width: self.width,
            height: self.height,
            output_width: self.output_width.unwrap_or(self.width),
            output_height: self.output_height.unwrap_or(self.height),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    /// Minimum similarity score (0–100) for an icon to count as a match.
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Pause before each capture so the icon can finish its transition.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "paths::state_file_path")]
    pub state_file: PathBuf,
    /// Directory holding the reference icons. Relative paths are resolved
    /// next to the executable, then against the working directory.
    #[serde(default = "default_icon_dir")]
    pub icon_dir: PathBuf,
    #[serde(default)]
    pub icons: IconFiles,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            state_file: paths::state_file_path(),
            icon_dir: default_icon_dir(),
            icons: IconFiles::default(),
        }
    }
}

impl DetectorConfig {
    /// Returns the match threshold, clamped to [0, 100].
    pub fn effective_threshold(&self) -> u8 {
        self.threshold.min(MAX_THRESHOLD)
    }

    /// Poll interval; never zero so the ticker cannot spin.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Reference icon file names, relative to `icon_dir`.
#[derive(Debug, Deserialize, Clone)]
pub struct IconFiles {
    #[serde(default = "default_stopped_icon")]
    pub stopped: String,
    #[serde(default = "default_paused_icon")]
    pub paused: String,
    #[serde(default = "default_playing_icon")]
    pub playing: String,
}

impl Default for IconFiles {
    fn default() -> Self {
        Self {
            stopped: DEFAULT_STOPPED_ICON.to_string(),
            paused: DEFAULT_PAUSED_ICON.to_string(),
            playing: DEFAULT_PLAYING_ICON.to_string(),
        }
    }
}

/// Settings for the display updater (`display` subcommand).
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    /// Name of the overlay text source that receives the text.
    #[serde(default = "default_source_name")]
    pub source_name: String,
    /// File the updater reads (the state file or a now-playing title file).
    #[serde(default = "paths::now_playing_file_path")]
    pub input_file: PathBuf,
    /// File the sanitized label text is written to.
    #[serde(default = "paths::label_file_path")]
    pub output_file: PathBuf,
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            source_name: DEFAULT_SOURCE_NAME.to_string(),
            input_file: paths::now_playing_file_path(),
            output_file: paths::label_file_path(),
            refresh_ms: DEFAULT_REFRESH_MS,
        }
    }
}

impl DisplayConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.max(1))
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn default_monitor() -> usize {
    DEFAULT_MONITOR
}

fn default_offset_x() -> u32 {
    DEFAULT_OFFSET_X
}

fn default_offset_y() -> u32 {
    DEFAULT_OFFSET_Y
}

fn default_icon_size() -> u32 {
    DEFAULT_ICON_SIZE
}

fn default_threshold() -> u8 {
    DEFAULT_THRESHOLD
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_icon_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ICON_DIR)
}

fn default_stopped_icon() -> String {
    DEFAULT_STOPPED_ICON.to_string()
}

fn default_paused_icon() -> String {
    DEFAULT_PAUSED_ICON.to_string()
}

fn default_playing_icon() -> String {
    DEFAULT_PLAYING_ICON.to_string()
}

fn default_source_name() -> String {
    DEFAULT_SOURCE_NAME.to_string()
}

fn default_refresh_ms() -> u64 {
    DEFAULT_REFRESH_MS
}
