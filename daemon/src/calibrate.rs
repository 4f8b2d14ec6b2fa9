/// One-shot capture of the configured region, saved as PNG.
///
/// Used to produce reference icons and to check the configured offsets
/// against the real taskbar.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbaImage;
use tracing::info;

use crate::capture::{crop_region, Region, ScreenSource};
use crate::error::Error;

/// Default output name, e.g. `monitor_1_offset_37x37.png`.
pub fn default_output_name(monitor: usize, region: &Region) -> PathBuf {
    PathBuf::from(format!(
        "monitor_{monitor}_offset_{}x{}.png",
        region.output_width, region.output_height
    ))
}

/// Grabs one frame, crops `region` and writes it to `out`.
pub fn capture_to_file<S: ScreenSource>(
    source: &mut S,
    region: &Region,
    out: &Path,
) -> Result<RgbaImage> {
    let frame = source.grab().context("Failed to capture screenshot")?;
    let (width, height) = frame.dimensions();
    info!("Captured image dimensions: {width}x{height}");
    info!(
        "Cropping from ({}, {}) to ({}, {})",
        region.x,
        region.y,
        region.x.saturating_add(region.width),
        region.y.saturating_add(region.height)
    );

    let icon = crop_region(&frame, region).ok_or(Error::CropOutOfBounds {
        x: region.x,
        y: region.y,
        width: region.width,
        height: region.height,
        image_width: width,
        image_height: height,
    })?;

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    icon.save(out)
        .with_context(|| format!("Failed to save {}", out.display()))?;
    info!(
        "Saved {}x{} region to {}",
        icon.width(),
        icon.height(),
        out.display()
    );
    Ok(icon)
}
