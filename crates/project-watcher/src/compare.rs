//! Comparison images and the fraction-changed difference metric.

use std::borrow::Cow;

use image::{DynamicImage, Rgb, RgbImage};

/// Channel samples per comparison pixel.
const CHANNELS: usize = 3;

/// Default per-channel delta (0-255) above which a sample counts as changed.
pub const DEFAULT_BINARIZATION_THRESHOLD: u8 = 80;

/// A downscaled RGB copy of a frame, used only for difference computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonImage {
    pixels: RgbImage,
}

impl ComparisonImage {
    /// Build a comparison image no larger than `megapixel_ceiling` megapixels.
    pub fn from_frame(frame: &DynamicImage, megapixel_ceiling: f64) -> Self {
        Self::from_rgb(&to_rgb(frame), megapixel_ceiling)
    }

    /// Same as [`ComparisonImage::from_frame`] for a frame already in RGB8.
    pub fn from_rgb(frame: &RgbImage, megapixel_ceiling: f64) -> Self {
        let (w, h) = frame.dimensions();
        let (cw, ch) = comparison_size(w, h, megapixel_ceiling);
        Self::resized(frame, cw, ch)
    }

    /// Build a comparison image of exactly `width` x `height`.
    pub fn resized(frame: &RgbImage, width: u32, height: u32) -> Self {
        Self {
            pixels: area_resize(frame, width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }
}

/// Borrow `frame` as RGB8, converting only when it is stored differently.
pub fn to_rgb(frame: &DynamicImage) -> Cow<'_, RgbImage> {
    match frame.as_rgb8() {
        Some(rgb) => Cow::Borrowed(rgb),
        None => Cow::Owned(frame.to_rgb8()),
    }
}

/// Comparison size for a `width` x `height` frame: both sides scaled by
/// `ceiling / megapixels`, truncated. Never scales up.
pub fn comparison_size(width: u32, height: u32, megapixel_ceiling: f64) -> (u32, u32) {
    let pixels = width as f64 * height as f64;
    let scale = (megapixel_ceiling * 1e6 / pixels).min(1.0);
    let scaled = |d: u32| ((d as f64 * scale).floor() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Fraction of channel samples that differ by more than `threshold` between
/// `frame` (resampled to the reference size) and `reference`.
///
/// Returns `f64::INFINITY` when there is no reference, so that the first
/// comparison always reads as a change. Not symmetric: only `frame` is
/// resampled.
pub fn difference_from(frame: &RgbImage, reference: Option<&ComparisonImage>, threshold: u8) -> f64 {
    let Some(reference) = reference else {
        return f64::INFINITY;
    };

    let (w, h) = reference.dimensions();
    let resampled = area_resize(frame, w, h);

    let changed = resampled
        .as_raw()
        .iter()
        .zip(reference.as_rgb().as_raw())
        .filter(|(a, b)| a.abs_diff(**b) > threshold)
        .count();

    let total = w as usize * h as usize * CHANNELS;
    if total == 0 {
        return 0.0;
    }
    changed as f64 / total as f64
}

/// Binarized per-channel difference image at the reference resolution:
/// 255 where a sample changed by more than `threshold`, 0 elsewhere.
pub fn difference_image(frame: &RgbImage, reference: &ComparisonImage, threshold: u8) -> RgbImage {
    let (w, h) = reference.dimensions();
    let mut out = area_resize(frame, w, h);
    for (sample, base) in out.iter_mut().zip(reference.as_rgb().as_raw()) {
        *sample = if sample.abs_diff(*base) > threshold { 255 } else { 0 };
    }
    out
}

/// Resample with area averaging: every output pixel is the coverage-weighted
/// mean of the source pixels under it.
fn area_resize(src: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (sw, sh) = src.dimensions();
    if (sw, sh) == (width, height) {
        return src.clone();
    }

    let xs = axis_weights(sw, width);
    let ys = axis_weights(sh, height);
    let dw = width as usize;

    // Horizontal pass into a float buffer of width x source-height.
    let mut rows = vec![0f32; dw * sh as usize * CHANNELS];
    for y in 0..sh {
        for (dx, taps) in xs.iter().enumerate() {
            let out = (y as usize * dw + dx) * CHANNELS;
            for &(sx, weight) in taps {
                let p = src.get_pixel(sx, y).0;
                for c in 0..CHANNELS {
                    rows[out + c] += weight * p[c] as f32;
                }
            }
        }
    }

    let mut dst = RgbImage::new(width, height);
    for (dy, taps) in ys.iter().enumerate() {
        for x in 0..dw {
            let mut acc = [0f32; CHANNELS];
            for &(sy, weight) in taps {
                let i = (sy as usize * dw + x) * CHANNELS;
                for c in 0..CHANNELS {
                    acc[c] += weight * rows[i + c];
                }
            }
            let px = acc.map(|v| v.round().clamp(0.0, 255.0) as u8);
            dst.put_pixel(x as u32, dy as u32, Rgb(px));
        }
    }
    dst
}

/// For each output index, the source indices it covers and their weights.
fn axis_weights(src: u32, dst: u32) -> Vec<Vec<(u32, f32)>> {
    if src == 0 || dst == 0 {
        return vec![Vec::new(); dst as usize];
    }
    let scale = src as f64 / dst as f64;

    (0..dst)
        .map(|i| {
            let start = i as f64 * scale;
            let end = start + scale;
            let first = start.floor() as u32;
            let last = (end.ceil() as u32).min(src);
            (first..last)
                .filter_map(|s| {
                    let overlap = end.min(s as f64 + 1.0) - start.max(s as f64);
                    (overlap > 0.0).then_some((s, (overlap / scale) as f32))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    #[test]
    fn test_identical_images() {
        let mut img = solid(64, 48, 30);
        img.put_pixel(5, 5, Rgb([255, 0, 90]));
        let reference = ComparisonImage::resized(&img, 64, 48);
        assert_eq!(difference_from(&img, Some(&reference), 80), 0.0);
    }

    #[test]
    fn test_identical_after_downscale() {
        let frame = DynamicImage::ImageRgb8(solid(1920, 1080, 120));
        let reference = ComparisonImage::from_frame(&frame, 0.5);
        assert_eq!(difference_from(&to_rgb(&frame), Some(&reference), 80), 0.0);
    }

    #[test]
    fn test_missing_reference_is_infinite() {
        let img = solid(8, 8, 0);
        assert_eq!(difference_from(&img, None, 80), f64::INFINITY);
    }

    #[test]
    fn test_half_changed() {
        let base = solid(40, 20, 0);
        let mut next = base.clone();
        for y in 0..20 {
            for x in 0..20 {
                next.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let reference = ComparisonImage::resized(&base, 40, 20);
        let diff = difference_from(&next, Some(&reference), 80);
        assert!((diff - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_channel_weighting() {
        let base = solid(10, 10, 0);
        let mut next = base.clone();
        for pixel in next.pixels_mut() {
            pixel.0[0] = 200;
        }
        let reference = ComparisonImage::resized(&base, 10, 10);
        let diff = difference_from(&next, Some(&reference), 80);
        assert!((diff - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_is_strict() {
        let base = solid(4, 4, 0);
        let at = solid(4, 4, 80);
        let above = solid(4, 4, 81);
        let reference = ComparisonImage::resized(&base, 4, 4);
        assert_eq!(difference_from(&at, Some(&reference), 80), 0.0);
        assert_eq!(difference_from(&above, Some(&reference), 80), 1.0);
    }

    #[test]
    fn test_not_symmetric() {
        // One bright pixel in a 2x2 block averages below the threshold when
        // the 4x4 side is resampled down, but not when it is the reference.
        let mut detailed = solid(4, 4, 0);
        detailed.put_pixel(0, 0, Rgb([255, 255, 255]));
        let coarse = solid(2, 2, 0);

        let coarse_ref = ComparisonImage::resized(&coarse, 2, 2);
        let detailed_ref = ComparisonImage::resized(&detailed, 4, 4);

        assert_eq!(difference_from(&detailed, Some(&coarse_ref), 80), 0.0);
        let reverse = difference_from(&coarse, Some(&detailed_ref), 80);
        assert!((reverse - 1.0 / 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_comparison_size_caps_pixels() {
        assert_eq!(comparison_size(1920, 1080, 0.5), (462, 260));
        assert_eq!(comparison_size(1280, 720, 0.5), (694, 390));
        let (w, h) = comparison_size(4000, 3000, 0.5);
        assert!(w as u64 * h as u64 <= 500_000);
    }

    #[test]
    fn test_comparison_size_never_upscales() {
        assert_eq!(comparison_size(640, 480, 0.5), (640, 480));
        assert_eq!(comparison_size(0, 0, 0.5), (1, 1));
    }

    #[test]
    fn test_area_resize_averages_blocks() {
        let mut img = solid(4, 2, 10);
        for y in 0..2 {
            for x in 2..4 {
                img.put_pixel(x, y, Rgb([200, 200, 200]));
            }
        }
        let small = area_resize(&img, 2, 1);
        assert_eq!(small.get_pixel(0, 0).0, [10, 10, 10]);
        assert_eq!(small.get_pixel(1, 0).0, [200, 200, 200]);
    }

    #[test]
    fn test_area_resize_fractional() {
        let mut img = solid(3, 1, 0);
        img.put_pixel(1, 0, Rgb([90, 90, 90]));
        let small = area_resize(&img, 2, 1);
        // Each output covers 1.5 source pixels; the middle one is split evenly.
        assert_eq!(small.get_pixel(0, 0).0, [30, 30, 30]);
        assert_eq!(small.get_pixel(1, 0).0, [30, 30, 30]);
    }

    #[test]
    fn test_difference_image_marks_changes() {
        let base = solid(4, 4, 0);
        let mut next = base.clone();
        next.put_pixel(1, 2, Rgb([0, 255, 10]));
        let reference = ComparisonImage::resized(&base, 4, 4);
        let vis = difference_image(&next, &reference, 80);
        assert_eq!(vis.get_pixel(1, 2).0, [0, 255, 0]);
        assert_eq!(vis.get_pixel(0, 0).0, [0, 0, 0]);
    }
}
