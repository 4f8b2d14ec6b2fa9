use std::path::Path;

use image::{GrayImage, RgbaImage};
use tracing::{debug, error, info};

use crate::config::IconFiles;
use crate::error::{Error, Result};
use crate::similarity::{self, grayscale};
use crate::state::{PlayerState, CLASSIFY_ORDER};

/// Reference icons, one per state, kept in [`CLASSIFY_ORDER`].
///
/// Icons are converted to grayscale once at load time and never change.
#[derive(Debug, Default)]
pub struct ReferenceIcons {
    icons: Vec<(PlayerState, GrayImage)>,
}

impl ReferenceIcons {
    /// Loads the configured icon files from `dir`.
    ///
    /// An icon that cannot be loaded is logged and left out; its state can
    /// then never be detected.
    pub fn load(dir: &Path, files: &IconFiles) -> Self {
        let mut icons = Vec::with_capacity(CLASSIFY_ORDER.len());
        for state in CLASSIFY_ORDER {
            let path = dir.join(file_for(files, state));
            match load_icon(&path) {
                Ok(icon) => {
                    info!(
                        "Loaded {state} icon {} ({}x{})",
                        path.display(),
                        icon.width(),
                        icon.height()
                    );
                    icons.push((state, icon));
                }
                Err(e) if e.is_not_found() => {
                    error!("Icon {} not found, {state} cannot be detected", path.display())
                }
                Err(e) => error!("{e}"),
            }
        }
        Self { icons }
    }

    /// Builds the set from already-decoded images, sorted into
    /// [`CLASSIFY_ORDER`] regardless of input order.
    #[cfg(test)]
    pub fn from_images(images: impl IntoIterator<Item = (PlayerState, RgbaImage)>) -> Self {
        let mut icons: Vec<(PlayerState, GrayImage)> = images
            .into_iter()
            .map(|(state, img)| (state, grayscale(&img)))
            .collect();
        icons.sort_by_key(|(state, _)| order_of(*state));
        Self { icons }
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    /// Returns the first state, in [`CLASSIFY_ORDER`], whose icon scores at or
    /// above `threshold`. A failed capture or no match yields `Stopped`.
    pub fn classify(&self, captured: Option<&RgbaImage>, threshold: u8) -> PlayerState {
        let Some(captured) = captured else {
            return PlayerState::Stopped;
        };
        let captured = grayscale(captured);

        for (state, icon) in &self.icons {
            let score = similarity::similarity(&captured, icon);
            debug!("{state} icon similarity: {score}%");
            if similarity::is_match(score, threshold) {
                return *state;
            }
        }
        PlayerState::Stopped
    }
}

fn file_for(files: &IconFiles, state: PlayerState) -> &str {
    match state {
        PlayerState::Stopped => &files.stopped,
        PlayerState::Paused => &files.paused,
        PlayerState::Playing => &files.playing,
    }
}

#[cfg(test)]
fn order_of(state: PlayerState) -> usize {
    CLASSIFY_ORDER
        .iter()
        .position(|s| *s == state)
        .unwrap_or(CLASSIFY_ORDER.len())
}

fn load_icon(path: &Path) -> Result<GrayImage> {
    let img = image::open(path).map_err(|source| Error::IconLoad {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(grayscale(&img.to_rgba8()))
}
