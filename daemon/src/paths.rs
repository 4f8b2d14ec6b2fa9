/// Canonical file paths for the daemon's data files.
///
/// Everything lives under the per-user config directory, e.g. on Windows
/// %APPDATA%\AIMP State\:
///   - config.toml       Read by the daemon at startup.
///   - state.txt         Written by the detector, read by the overlay.
///   - now_playing.txt   Written by AIMP, read by the display updater.
///   - label.txt         Written by the display updater.
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "AIMP State";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATE_FILE_NAME: &str = "state.txt";
pub const NOW_PLAYING_FILE_NAME: &str = "now_playing.txt";
pub const LABEL_FILE_NAME: &str = "label.txt";

/// Returns the application data directory.
///
/// Falls back to the working directory on platforms without a config dir.
pub fn app_data_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

pub fn config_file_path() -> PathBuf {
    app_data_dir().join(CONFIG_FILE_NAME)
}

pub fn state_file_path() -> PathBuf {
    app_data_dir().join(STATE_FILE_NAME)
}

pub fn now_playing_file_path() -> PathBuf {
    app_data_dir().join(NOW_PLAYING_FILE_NAME)
}

pub fn label_file_path() -> PathBuf {
    app_data_dir().join(LABEL_FILE_NAME)
}

/// Resolves a bundled resource such as `resources/img`.
///
/// Absolute paths are returned as-is. Relative paths are looked up next to the
/// running executable first and then in the working directory.
pub fn resource_path(relative: &Path) -> PathBuf {
    if relative.is_absolute() {
        return relative.to_path_buf();
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let candidate = exe_dir.join(relative);
        if candidate.exists() {
            return candidate;
        }
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(relative)
}
