//! Raster primitives: PNG codec, resampling, pixel comparison, and the
//! deterministic content raster used by drivers without a rendering
//! engine.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, Rgba, RgbaImage};

use crate::error::Result;
use crate::types::Viewport;

/// Decode a PNG byte buffer into an RGBA image.
pub fn decode_png(bytes: &[u8]) -> Result<RgbaImage> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
    Ok(img.to_rgba8())
}

/// Encode an RGBA image as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(out)
}

/// Nearest-neighbor resample to the target dimensions.
pub fn resample_nearest(img: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if img.width() == width && img.height() == height {
        return img.clone();
    }
    RgbaImage::from_fn(width, height, |x, y| {
        let src_x = (x as u64 * img.width() as u64 / width as u64) as u32;
        let src_y = (y as u64 * img.height() as u64 / height as u64) as u32;
        *img.get_pixel(src_x.min(img.width() - 1), src_y.min(img.height() - 1))
    })
}

/// Result of one pixel comparison.
#[derive(Debug)]
pub struct PixelDiffResult {
    /// Faded baseline with differing pixels marked red and
    /// anti-aliasing artifacts marked yellow.
    pub diff: RgbaImage,
    /// Row-major changed-pixel mask, one entry per pixel.
    pub changed_mask: Vec<bool>,
    /// Differing pixels after threshold and anti-alias filtering.
    pub changed_pixels: u64,
    pub total_pixels: u64,
}

impl PixelDiffResult {
    /// Fraction of pixels that differ, in `[0, 1]`.
    pub fn diff_ratio(&self) -> f64 {
        if self.total_pixels == 0 {
            0.0
        } else {
            self.changed_pixels as f64 / self.total_pixels as f64
        }
    }
}

/// The screenshot-diff primitive the visual stage consumes. Both
/// inputs must have identical dimensions; the caller resamples first.
pub trait PixelComparator: Send + Sync {
    /// Compare two equally-sized images. `threshold` is the per-pixel
    /// tolerance in `[0, 1]`, 1.0 accepting any difference.
    fn compare(&self, baseline: &RgbaImage, candidate: &RgbaImage, threshold: f32)
        -> PixelDiffResult;
}

/// Default comparator: per-channel distance with an anti-aliasing
/// heuristic so one-pixel font edges do not count as regressions.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThresholdComparator;

fn luma(p: &Rgba<u8>) -> f32 {
    0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32
}

fn channel_delta(a: &Rgba<u8>, b: &Rgba<u8>) -> f32 {
    (0..3)
        .map(|i| (a[i] as f32 - b[i] as f32).abs())
        .fold(0.0, f32::max)
        / 255.0
}

/// A pixel whose luma sits between the extremes of a high-contrast
/// neighborhood is treated as an anti-aliasing artifact.
fn is_antialias_edge(img: &RgbaImage, x: u32, y: u32) -> bool {
    let center = luma(img.get_pixel(x, y));
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= img.width() as i64 || ny >= img.height() as i64 {
                continue;
            }
            let l = luma(img.get_pixel(nx as u32, ny as u32));
            min = min.min(l);
            max = max.max(l);
        }
    }
    max - min > 64.0 && center > min && center < max
}

impl PixelComparator for ThresholdComparator {
    fn compare(
        &self,
        baseline: &RgbaImage,
        candidate: &RgbaImage,
        threshold: f32,
    ) -> PixelDiffResult {
        debug_assert_eq!(baseline.dimensions(), candidate.dimensions());
        let (width, height) = baseline.dimensions();
        let mut diff = RgbaImage::new(width, height);
        let mut changed_mask = vec![false; (width * height) as usize];
        let mut changed = 0u64;

        for y in 0..height {
            for x in 0..width {
                let b = baseline.get_pixel(x, y);
                let c = candidate.get_pixel(x, y);
                let delta = channel_delta(b, c);
                let px = if delta <= threshold {
                    // Unchanged: faded grayscale of the baseline.
                    let g = (luma(b) * 0.3 + 178.0) as u8;
                    Rgba([g, g, g, 255])
                } else if is_antialias_edge(baseline, x, y) || is_antialias_edge(candidate, x, y) {
                    Rgba([255, 221, 0, 255])
                } else {
                    changed += 1;
                    changed_mask[(y * width + x) as usize] = true;
                    Rgba([255, 32, 32, 255])
                };
                diff.put_pixel(x, y, px);
            }
        }

        PixelDiffResult {
            diff,
            changed_mask,
            changed_pixels: changed,
            total_pixels: width as u64 * height as u64,
        }
    }
}

const RASTER_MARGIN: u32 = 8;
const GLYPH_W: u32 = 6;
const GLYPH_H: u32 = 10;

/// Deterministic rasterization of a document's visible text, used as
/// the full-page "screenshot" by drivers that fetch but do not render.
/// Identical text yields identical pixels, so visual diffing over
/// these rasters detects content changes. The image is at least the
/// viewport size and grows with content like a full-page screenshot.
pub fn render_content_raster(text: &str, viewport: &Viewport) -> RgbaImage {
    let width = viewport.width.max(2 * RASTER_MARGIN + GLYPH_W);
    let cols = ((width - 2 * RASTER_MARGIN) / GLYPH_W).max(1);

    // First pass: how many glyph rows the text occupies.
    let mut rows = 1u32;
    let mut col = 0u32;
    for ch in text.chars() {
        if ch == '\n' || col == cols {
            rows += 1;
            col = 0;
            if ch == '\n' {
                continue;
            }
        }
        col += 1;
    }

    let height = viewport.height.max(rows * GLYPH_H + 2 * RASTER_MARGIN);
    let mut img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

    let (mut row, mut col) = (0u32, 0u32);
    for ch in text.chars() {
        if ch == '\n' || col == cols {
            row += 1;
            col = 0;
            if ch == '\n' {
                continue;
            }
        }
        if ch != ' ' {
            let shade = 32 + (ch as u32 % 160) as u8;
            let x = RASTER_MARGIN + col * GLYPH_W;
            let y = RASTER_MARGIN + row * GLYPH_H;
            for gy in 0..GLYPH_H - 2 {
                for gx in 0..GLYPH_W - 1 {
                    img.put_pixel(x + gx, y + gy, Rgba([shade, shade, shade, 255]));
                }
            }
        }
        col += 1;
    }
    img
}
