use std::fmt;
use std::path::Path;

use tracing::{debug, error};

/// Playback state of AIMP as seen on its taskbar icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlayerState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

/// Order in which reference icons are compared. When more than one icon
/// scores above the threshold the earliest entry wins.
pub const CLASSIFY_ORDER: [PlayerState; 3] = [
    PlayerState::Stopped,
    PlayerState::Paused,
    PlayerState::Playing,
];

impl PlayerState {
    /// The word written to the state file.
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerState::Stopped => "Stopped",
            PlayerState::Paused => "Paused",
            PlayerState::Playing => "Playing",
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overwrites `path` with the state word.
/// Creates the parent directory if it does not exist.
/// Logs errors rather than returning them; a failed write must never stop
/// the detector.
pub fn write_state(path: &Path, state: PlayerState) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("Failed to create directory {}: {e}", parent.display());
            return;
        }
    }
    match std::fs::write(path, state.as_str()) {
        Ok(()) => debug!("State file updated: {state}"),
        Err(e) => error!("Failed to write state file {}: {e}", path.display()),
    }
}
