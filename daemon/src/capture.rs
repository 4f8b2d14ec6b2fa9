/// Screen capture of the taskbar region that holds the AIMP icon.
///
/// A [`ScreenSource`] produces one full-monitor RGBA image per call; the crop
/// and resize step is pure so it can be tested without a display.
use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Crop window in monitor pixels, plus the canonical size it is scaled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub output_width: u32,
    pub output_height: u32,
}

impl Region {
    /// Returns `true` when the window lies completely inside an image of the
    /// given size.
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!((right, bottom), (Some(r), Some(b)) if r <= image_width && b <= image_height)
    }
}

/// Anything that can grab a full monitor image.
pub trait ScreenSource {
    fn grab(&mut self) -> Result<RgbaImage>;
}

/// Captures one monitor through `xcap`.
#[derive(Debug, Clone)]
pub struct MonitorSource {
    /// 1-based index into the monitor list.
    index: usize,
}

impl MonitorSource {
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl ScreenSource for MonitorSource {
    fn grab(&mut self) -> Result<RgbaImage> {
        // Monitors are re-enumerated on every grab so hot-plugging a display
        // does not leave a stale handle behind.
        let monitors =
            xcap::Monitor::all().map_err(|e| Error::MonitorEnumeration(e.to_string()))?;
        let available = monitors.len();
        let monitor = self
            .index
            .checked_sub(1)
            .and_then(|i| monitors.into_iter().nth(i))
            .ok_or(Error::MonitorNotFound {
                index: self.index,
                available,
            })?;
        monitor
            .capture_image()
            .map_err(|e| Error::CaptureFailed(e.to_string()))
    }
}

/// Crops `region` out of `image` and scales it to the region's output size.
///
/// Returns `None` when the window exceeds the image bounds or is empty.
pub fn crop_region(image: &RgbaImage, region: &Region) -> Option<RgbaImage> {
    if region.width == 0 || region.height == 0 {
        return None;
    }
    if !region.fits_within(image.width(), image.height()) {
        return None;
    }

    let cropped = imageops::crop_imm(image, region.x, region.y, region.width, region.height)
        .to_image();

    if (region.output_width, region.output_height) == (region.width, region.height) {
        return Some(cropped);
    }
    if region.output_width == 0 || region.output_height == 0 {
        return None;
    }
    Some(imageops::resize(
        &cropped,
        region.output_width,
        region.output_height,
        FilterType::CatmullRom,
    ))
}

/// Grabs a frame from `source` and crops `region` out of it.
///
/// Capture failures and out-of-bounds windows are logged and yield `None`,
/// which the classifier treats as "Stopped".
pub fn capture_region<S: ScreenSource + ?Sized>(
    source: &mut S,
    region: &Region,
) -> Option<RgbaImage> {
    let frame = match source.grab() {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Screen capture failed: {e}");
            return None;
        }
    };

    let cropped = crop_region(&frame, region);
    if cropped.is_none() {
        debug!(
            "Crop area exceeds image bounds. Image size: {}x{}, region: {region:?}",
            frame.width(),
            frame.height()
        );
    }
    cropped
}
