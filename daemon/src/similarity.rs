//! Grayscale structural similarity between a captured icon and a reference.
//!
//! The score is the mean SSIM over every 7×7 window that lies fully inside the
//! image, scaled to an integer percentage.

use image::{GrayImage, Luma, RgbaImage};

/// Side length of the square SSIM window.
const WINDOW: u32 = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
/// Dynamic range of 8-bit samples.
const DATA_RANGE: f64 = 255.0;

/// ITU-R 601-2 luma in 16.16 fixed point. Alpha is ignored.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

pub fn grayscale(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        Luma([luma(r, g, b)])
    })
}

/// Running sums over the image, one row/column larger than the image so
/// window sums need no bounds checks.
struct SummedArea {
    stride: usize,
    x: Vec<f64>,
    y: Vec<f64>,
    xx: Vec<f64>,
    yy: Vec<f64>,
    xy: Vec<f64>,
}

impl SummedArea {
    fn new(a: &GrayImage, b: &GrayImage) -> Self {
        let (w, h) = (a.width() as usize, a.height() as usize);
        let stride = w + 1;
        let len = stride * (h + 1);
        let mut table = Self {
            stride,
            x: vec![0.0; len],
            y: vec![0.0; len],
            xx: vec![0.0; len],
            yy: vec![0.0; len],
            xy: vec![0.0; len],
        };

        for row in 0..h {
            let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for col in 0..w {
                let p = a.get_pixel(col as u32, row as u32)[0] as f64;
                let q = b.get_pixel(col as u32, row as u32)[0] as f64;
                sx += p;
                sy += q;
                sxx += p * p;
                syy += q * q;
                sxy += p * q;

                let above = row * stride + col + 1;
                let here = (row + 1) * stride + col + 1;
                table.x[here] = table.x[above] + sx;
                table.y[here] = table.y[above] + sy;
                table.xx[here] = table.xx[above] + sxx;
                table.yy[here] = table.yy[above] + syy;
                table.xy[here] = table.xy[above] + sxy;
            }
        }
        table
    }

    /// Sum of `values` over the `size`×`size` window whose top-left is (col, row).
    fn window(&self, values: &[f64], col: usize, row: usize, size: usize) -> f64 {
        let top = row * self.stride;
        let bottom = (row + size) * self.stride;
        values[bottom + col + size] - values[top + col + size] - values[bottom + col]
            + values[top + col]
    }
}

/// Mean structural similarity of two grayscale images.
///
/// Returns `None` when the images differ in size or are smaller than the
/// 7×7 window.
pub fn ssim(a: &GrayImage, b: &GrayImage) -> Option<f64> {
    if a.dimensions() != b.dimensions() {
        return None;
    }
    let (w, h) = a.dimensions();
    if w < WINDOW || h < WINDOW {
        return None;
    }

    let size = WINDOW as usize;
    let n = (size * size) as f64;
    // Sample covariance, as opposed to the population estimate.
    let cov_norm = n / (n - 1.0);
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let table = SummedArea::new(a, b);
    let cols = (w - WINDOW + 1) as usize;
    let rows = (h - WINDOW + 1) as usize;

    let mut total = 0.0;
    for row in 0..rows {
        for col in 0..cols {
            let ux = table.window(&table.x, col, row, size) / n;
            let uy = table.window(&table.y, col, row, size) / n;
            let uxx = table.window(&table.xx, col, row, size) / n;
            let uyy = table.window(&table.yy, col, row, size) / n;
            let uxy = table.window(&table.xy, col, row, size) / n;

            let vx = cov_norm * (uxx - ux * ux);
            let vy = cov_norm * (uyy - uy * uy);
            let vxy = cov_norm * (uxy - ux * uy);

            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
        }
    }

    Some(total / (rows * cols) as f64)
}

/// Similarity of two grayscale images as an integer percentage in [0, 100].
///
/// Mismatched or undersized images score 0.
pub fn similarity(a: &GrayImage, b: &GrayImage) -> u8 {
    match ssim(a, b) {
        Some(index) => (index * 100.0).trunc().clamp(0.0, 100.0) as u8,
        None => 0,
    }
}

pub fn is_match(score: u8, threshold: u8) -> bool {
    score >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_THRESHOLD;
    use image::Rgba;

    fn gradient(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([(x * 5 + y * 2) as u8]))
    }

    fn checkerboard(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([if (x + y) % 2 == 0 { 0 } else { 255 }]))
    }

    fn invert(img: &GrayImage) -> GrayImage {
        GrayImage::from_fn(img.width(), img.height(), |x, y| {
            Luma([255 - img.get_pixel(x, y)[0]])
        })
    }

    // ── luma / grayscale ──────────────────────────────────────────────────────

    #[test]
    fn luma_matches_601_weights() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(255, 0, 0), 76);
        assert_eq!(luma(0, 255, 0), 150);
        assert_eq!(luma(0, 0, 255), 29);
    }

    #[test]
    fn grayscale_keeps_dimensions() {
        let img = RgbaImage::from_fn(12, 5, |x, y| Rgba([(x * 20) as u8, (y * 20) as u8, 0, 255]));
        assert_eq!(grayscale(&img).dimensions(), (12, 5));
    }

    #[test]
    fn grayscale_ignores_alpha() {
        let opaque = RgbaImage::from_pixel(2, 2, Rgba([10, 200, 30, 255]));
        let clear = RgbaImage::from_pixel(2, 2, Rgba([10, 200, 30, 0]));
        assert_eq!(grayscale(&opaque), grayscale(&clear));
    }

    // ── ssim / similarity ─────────────────────────────────────────────────────

    #[test]
    fn identical_images_score_100() {
        let img = gradient(37, 37);
        assert_eq!(similarity(&img, &img.clone()), 100);
        assert_eq!(similarity(&checkerboard(37, 37), &checkerboard(37, 37)), 100);
    }

    #[test]
    fn identical_flat_images_score_100() {
        let img = GrayImage::from_pixel(10, 10, Luma([42]));
        assert_eq!(similarity(&img, &img), 100);
    }

    #[test]
    fn different_dimensions_score_zero() {
        assert_eq!(similarity(&gradient(37, 37), &gradient(37, 36)), 0);
        assert_eq!(similarity(&gradient(20, 37), &gradient(37, 37)), 0);
        assert!(ssim(&gradient(8, 8), &gradient(9, 8)).is_none());
    }

    #[test]
    fn images_smaller_than_window_score_zero() {
        let img = gradient(6, 6);
        assert!(ssim(&img, &img).is_none());
        assert_eq!(similarity(&img, &img), 0);
    }

    #[test]
    fn minimum_size_image_has_single_window() {
        let img = gradient(7, 7);
        assert_eq!(ssim(&img, &img), Some(1.0));
    }

    #[test]
    fn inverted_image_scores_zero() {
        let img = checkerboard(37, 37);
        let inverted = invert(&img);
        assert!(ssim(&img, &inverted).unwrap() < 0.0);
        assert_eq!(similarity(&img, &inverted), 0);
    }

    #[test]
    fn slight_brightness_shift_still_matches() {
        let img = gradient(37, 37);
        let shifted = GrayImage::from_fn(37, 37, |x, y| Luma([img.get_pixel(x, y)[0] + 2]));
        let s = similarity(&img, &shifted);
        assert!(s >= DEFAULT_THRESHOLD, "score was {s}");
        assert!(s < 100);
    }

    #[test]
    fn unrelated_patterns_do_not_match() {
        let horizontal = GrayImage::from_fn(37, 37, |_, y| Luma([if y % 2 == 0 { 0 } else { 255 }]));
        let vertical = GrayImage::from_fn(37, 37, |x, _| Luma([if x % 2 == 0 { 0 } else { 255 }]));
        assert!(similarity(&horizontal, &vertical) < DEFAULT_THRESHOLD);
    }

    #[test]
    fn score_is_symmetric() {
        let a = gradient(20, 20);
        let b = checkerboard(20, 20);
        assert_eq!(similarity(&a, &b), similarity(&b, &a));
    }

    // ── is_match ──────────────────────────────────────────────────────────────

    #[test]
    fn is_match_is_inclusive_at_threshold() {
        assert!(is_match(87, 87));
        assert!(is_match(100, 87));
        assert!(!is_match(86, 87));
    }
}
