/// Display side of the file mailbox.
///
/// Reads the state/title file on a timer and hands sanitized text to a
/// [`TextSink`], which stands in for the overlay's on-screen label. Every
/// failure degrades to [`FALLBACK_TEXT`] so the label always shows something.
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{DisplayConfig, DEFAULT_SOURCE_NAME};
use crate::paths;

pub const FALLBACK_TEXT: &str = "No song playing";

/// Text sources the updater is allowed to drive.
pub const TRUSTED_SOURCES: [&str; 2] = [DEFAULT_SOURCE_NAME, "Another Trusted Source"];

/// Path prefixes the updater refuses to read from.
const SENSITIVE_PATHS: [&str; 5] = ["C:/Windows", "C:/Windows/System32", "/etc", "/bin", "/usr"];

/// Characters stripped from titles before they reach the label.
const UNSAFE_CHARS: [char; 5] = ['<', '>', '"', '\'', '\\'];

static SOURCE_NAME_REGEX: OnceLock<Regex> = OnceLock::new();
static FILE_PATH_REGEX: OnceLock<Regex> = OnceLock::new();

/// Reads the now-playing file, trimmed.
///
/// An empty file, or any I/O failure, yields [`FALLBACK_TEXT`].
pub fn read_now_playing(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let content = content.trim();
            if content.is_empty() {
                info!("The file is empty. No song is currently playing.");
                FALLBACK_TEXT.to_string()
            } else {
                content.to_string()
            }
        }
        Err(e) => {
            match e.kind() {
                ErrorKind::NotFound => {
                    warn!("File {} was not found. Please check the file path.", path.display())
                }
                ErrorKind::PermissionDenied => error!(
                    "Permission denied when reading {}. Please check file permissions.",
                    path.display()
                ),
                ErrorKind::IsADirectory => error!(
                    "Expected a file but {} is a directory. Please provide a valid file path.",
                    path.display()
                ),
                _ => error!("Failed to read {}: {e}", path.display()),
            }
            FALLBACK_TEXT.to_string()
        }
    }
}

/// Removes characters that could be interpreted as markup or escapes.
pub fn sanitize_title(title: &str) -> String {
    title.chars().filter(|c| !UNSAFE_CHARS.contains(c)).collect()
}

/// Returns `name` if it is well-formed and trusted, otherwise the default
/// source name.
pub fn validate_source_name(name: &str) -> String {
    let pattern = SOURCE_NAME_REGEX.get_or_init(|| Regex::new(r"^[\w\s:]+$").unwrap());
    if !pattern.is_match(name) {
        warn!("Invalid text source name {name:?}. Defaulting to '{DEFAULT_SOURCE_NAME}'.");
        return DEFAULT_SOURCE_NAME.to_string();
    }
    if !TRUSTED_SOURCES.contains(&name) {
        warn!("Text source name {name:?} is not trusted. Defaulting to '{DEFAULT_SOURCE_NAME}'.");
        return DEFAULT_SOURCE_NAME.to_string();
    }
    name.to_string()
}

/// Returns `path` if it names an existing file with a plain path that does
/// not point into a system directory, otherwise `default`.
///
/// Only forward slashes are accepted as separators.
pub fn validate_input_path(path: &Path, default: &Path) -> PathBuf {
    let pattern = FILE_PATH_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-/:\.]+$").unwrap());
    let acceptable = path.is_file()
        && path
            .to_str()
            .is_some_and(|s| pattern.is_match(s) && !is_sensitive_path(s));
    if acceptable {
        path.to_path_buf()
    } else {
        warn!(
            "Invalid or sensitive file path {}. Defaulting to {}.",
            path.display(),
            default.display()
        );
        default.to_path_buf()
    }
}

/// Case-insensitive prefix check against [`SENSITIVE_PATHS`] after
/// normalizing separators and `.`/`..` segments.
pub fn is_sensitive_path(path: &str) -> bool {
    let normalized = normalize(path);
    SENSITIVE_PATHS
        .iter()
        .any(|sensitive| normalized.starts_with(&normalize(sensitive)))
}

fn normalize(path: &str) -> String {
    let lowered = path.replace('\\', "/").to_lowercase();
    let mut parts: Vec<&str> = Vec::new();
    for part in lowered.split('/') {
        match part {
            "" | "." if !parts.is_empty() => continue,
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    parts.join("/")
}

/// The label the updater writes into.
pub trait TextSink {
    fn set_text(&mut self, source_name: &str, text: &str) -> Result<()>;
}

/// Writes label text to a file, for overlay text sources that read from disk.
#[derive(Debug, Clone)]
pub struct FileTextSink {
    path: PathBuf,
}

impl FileTextSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TextSink for FileTextSink {
    fn set_text(&mut self, source_name: &str, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        std::fs::write(&self.path, text).with_context(|| {
            format!("Failed to update '{source_name}' at {}", self.path.display())
        })
    }
}

pub struct DisplayUpdater<K> {
    source_name: String,
    input: PathBuf,
    sink: K,
    last_text: Option<String>,
}

impl<K: TextSink> DisplayUpdater<K> {
    /// Validates the configured source name and input path, falling back to
    /// the defaults when either is rejected.
    pub fn new(config: &DisplayConfig, sink: K) -> Self {
        Self {
            source_name: validate_source_name(&config.source_name),
            input: validate_input_path(&config.input_file, &paths::now_playing_file_path()),
            sink,
            last_text: None,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Reads the input and pushes it to the sink when it changed.
    /// Returns whether the sink was updated.
    pub fn tick(&mut self) -> bool {
        let text = sanitize_title(&read_now_playing(&self.input));
        if self.last_text.as_deref() == Some(text.as_str()) {
            return false;
        }
        match self.sink.set_text(&self.source_name, &text) {
            Ok(()) => {
                debug!("Updated '{}': {text}", self.source_name);
                self.last_text = Some(text);
                true
            }
            Err(e) => {
                warn!("Text source '{}' could not be updated: {e:#}", self.source_name);
                false
            }
        }
    }

    /// Ticks every `period` until `stop_rx` turns `true` or its sender is
    /// dropped.
    pub async fn run(mut self, period: Duration, mut stop_rx: watch::Receiver<bool>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *stop_rx.borrow_and_update() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }
}
