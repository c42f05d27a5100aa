//! Visual diff stage: pixel comparison, heatmaps, layout-shift
//! detection and severity classification per matched page.

use cutover_browser::{raster, PixelComparator, PixelDiffResult, ThresholdComparator};
use cutover_rest_api_contract::{ArtifactKind, Severity};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::debug;

use super::capture::CaptureOutput;
use super::{StageFailure, StageOutput, StageResult};
use crate::context::RunContext;

/// Default per-pixel tolerance, 1.0 accepting any difference.
pub const DEFAULT_PIXEL_THRESHOLD: f32 = 0.1;
/// Grid used for layout-shift detection.
const SHIFT_GRID: u32 = 10;
/// Cells with fewer differing pixels than this are noise.
const SHIFT_MIN_PIXELS: u64 = 5;

/// Diff numbers for one viewport of one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportDiff {
    pub viewport: String,
    pub diff_ratio: f64,
    pub changed_pixels: u64,
    pub has_layout_shift: bool,
    pub shift_magnitude: f64,
    pub severity: Severity,
    pub diff_path: String,
    pub heatmap_path: String,
}

/// Per-page rollup: maximum severity across viewports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageVisualResult {
    pub baseline_path: String,
    pub candidate_path: String,
    pub severity: Severity,
    pub viewports: Vec<ViewportDiff>,
}

/// Run-level summary consumed by reasoning and reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualSummary {
    pub pages: usize,
    pub pages_with_diffs: usize,
    pub critical_issues: usize,
    pub high_issues: usize,
    pub medium_issues: usize,
    pub low_issues: usize,
    pub average_diff_pct: f64,
}

/// The stage's value: summary plus per-page detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualStageOutput {
    pub summary: VisualSummary,
    pub pages: Vec<PageVisualResult>,
}

/// Severity as a pure function of `(diffRatio, hasLayoutShift)`.
pub fn classify_severity(diff_ratio: f64, has_layout_shift: bool) -> Severity {
    if diff_ratio == 0.0 && !has_layout_shift {
        Severity::None
    } else if has_layout_shift && diff_ratio > 0.5 {
        Severity::Critical
    } else if has_layout_shift || diff_ratio > 0.3 {
        Severity::High
    } else if diff_ratio > 0.1 {
        Severity::Medium
    } else if diff_ratio > 0.05 {
        Severity::Low
    } else {
        Severity::None
    }
}

/// Compare every matched page's screenshots per viewport, writing
/// diff and heatmap images plus the results document.
pub async fn run(ctx: &RunContext, capture: &CaptureOutput) -> StageResult<VisualStageOutput> {
    let mut batch = ctx.batch();
    let comparator = ThresholdComparator;
    let mut pages = Vec::new();

    for captured in &capture.pages {
        let sanitized = &captured.baseline.sanitized_path;
        let mut viewports = Vec::new();

        for (b_shot, c_shot) in captured
            .baseline
            .screenshots
            .iter()
            .zip(&captured.candidate.screenshots)
        {
            let baseline_img = load_png(ctx, &b_shot.relative_path)
                .map_err(|e| StageFailure::with_artifacts(e, batch.take_entries()))?;
            let candidate_img = load_png(ctx, &c_shot.relative_path)
                .map_err(|e| StageFailure::with_artifacts(e, batch.take_entries()))?;

            // Nearest-neighbor resample onto the baseline's dimensions
            // before diffing.
            let candidate_img = raster::resample_nearest(
                &candidate_img,
                baseline_img.width(),
                baseline_img.height(),
            );

            let result = comparator.compare(&baseline_img, &candidate_img, DEFAULT_PIXEL_THRESHOLD);
            let (has_shift, magnitude) = detect_layout_shift(&result);
            let heatmap = build_heatmap(&baseline_img, &candidate_img);

            let diff_path = format!("visual-diffs/{sanitized}/{}-diff.png", b_shot.viewport.name);
            let heatmap_path =
                format!("visual-diffs/{sanitized}/{}-heatmap.png", b_shot.viewport.name);
            let write = (|| {
                batch.write_bytes(
                    &diff_path,
                    &raster::encode_png(&result.diff).map_err(crate::error::Error::from)?,
                    ArtifactKind::Screenshot,
                    format!("{} {} diff", captured.page.baseline.path, b_shot.viewport.name),
                )?;
                batch.write_bytes(
                    &heatmap_path,
                    &raster::encode_png(&heatmap).map_err(crate::error::Error::from)?,
                    ArtifactKind::Screenshot,
                    format!("{} {} heatmap", captured.page.baseline.path, b_shot.viewport.name),
                )?;
                crate::error::Result::Ok(())
            })();
            if let Err(e) = write {
                return Err(StageFailure::with_artifacts(
                    format!("cannot write diff images: {e}"),
                    batch.take_entries(),
                ));
            }

            let ratio = result.diff_ratio();
            viewports.push(ViewportDiff {
                viewport: b_shot.viewport.name.clone(),
                diff_ratio: ratio,
                changed_pixels: result.changed_pixels,
                has_layout_shift: has_shift,
                shift_magnitude: magnitude,
                severity: classify_severity(ratio, has_shift),
                diff_path,
                heatmap_path,
            });
        }

        let severity = viewports
            .iter()
            .map(|v| v.severity)
            .max()
            .unwrap_or(Severity::None);
        pages.push(PageVisualResult {
            baseline_path: captured.page.baseline.path.clone(),
            candidate_path: captured.page.candidate.path.clone(),
            severity,
            viewports,
        });
    }

    let summary = summarize(&pages);
    let output = VisualStageOutput { summary, pages };
    if let Err(e) = batch.write_json(
        "visual-results.json",
        &output,
        ArtifactKind::Other,
        "Visual diff results",
    ) {
        return Err(StageFailure::with_artifacts(
            format!("cannot write visual results: {e}"),
            batch.take_entries(),
        ));
    }

    debug!(run_id = %ctx.run_id, pages = output.pages.len(), "visual diff finished");
    Ok(StageOutput {
        artifacts: batch.take_entries(),
        value: output,
    })
}

fn load_png(ctx: &RunContext, relative: &str) -> std::result::Result<RgbaImage, String> {
    let bytes = fs::read(ctx.run_file(relative))
        .map_err(|e| format!("cannot read screenshot {relative}: {e}"))?;
    raster::decode_png(&bytes).map_err(|e| format!("cannot decode screenshot {relative}: {e}"))
}

fn summarize(pages: &[PageVisualResult]) -> VisualSummary {
    let mut summary = VisualSummary {
        pages: pages.len(),
        ..VisualSummary::default()
    };
    let mut ratio_sum = 0.0;
    let mut ratio_count = 0usize;
    for page in pages {
        if page.severity > Severity::None {
            summary.pages_with_diffs += 1;
        }
        match page.severity {
            Severity::Critical => summary.critical_issues += 1,
            Severity::High => summary.high_issues += 1,
            Severity::Medium => summary.medium_issues += 1,
            Severity::Low => summary.low_issues += 1,
            Severity::None => {}
        }
        for viewport in &page.viewports {
            ratio_sum += viewport.diff_ratio;
            ratio_count += 1;
        }
    }
    if ratio_count > 0 {
        summary.average_diff_pct = ratio_sum / ratio_count as f64 * 100.0;
    }
    summary
}

/// Scan the changed-pixel mask on a fixed grid; every cell over the
/// noise floor contributes a region whose center-of-mass distance
/// from the image center is its shift magnitude.
fn detect_layout_shift(result: &PixelDiffResult) -> (bool, f64) {
    let width = result.diff.width();
    let height = result.diff.height();
    if width == 0 || height == 0 {
        return (false, 0.0);
    }
    let cell_w = (width / SHIFT_GRID).max(1);
    let cell_h = (height / SHIFT_GRID).max(1);
    let center = (width as f64 / 2.0, height as f64 / 2.0);
    let half_diag = (center.0.powi(2) + center.1.powi(2)).sqrt();

    let mut max_magnitude: f64 = 0.0;
    let mut shifted = false;

    for gy in 0..SHIFT_GRID {
        for gx in 0..SHIFT_GRID {
            let x0 = gx * cell_w;
            let y0 = gy * cell_h;
            let x1 = if gx == SHIFT_GRID - 1 { width } else { (x0 + cell_w).min(width) };
            let y1 = if gy == SHIFT_GRID - 1 { height } else { (y0 + cell_h).min(height) };

            let mut count = 0u64;
            let (mut sum_x, mut sum_y) = (0f64, 0f64);
            for y in y0..y1 {
                for x in x0..x1 {
                    if result.changed_mask[(y * width + x) as usize] {
                        count += 1;
                        sum_x += x as f64;
                        sum_y += y as f64;
                    }
                }
            }
            if count > SHIFT_MIN_PIXELS {
                shifted = true;
                let com = (sum_x / count as f64, sum_y / count as f64);
                let dist =
                    ((com.0 - center.0).powi(2) + (com.1 - center.1).powi(2)).sqrt() / half_diag;
                max_magnitude = max_magnitude.max(dist);
            }
        }
    }
    (shifted, max_magnitude)
}

/// Per-pixel difference heatmap: red above 200, gradient down through
/// yellow to green, faded baseline passthrough at zero.
fn build_heatmap(baseline: &RgbaImage, candidate: &RgbaImage) -> RgbaImage {
    RgbaImage::from_fn(baseline.width(), baseline.height(), |x, y| {
        let b = baseline.get_pixel(x, y);
        let c = candidate.get_pixel(x, y);
        let intensity = (0..3)
            .map(|i| (b[i] as i16 - c[i] as i16).unsigned_abs() as u8)
            .max()
            .unwrap_or(0);
        heatmap_color(intensity, b)
    })
}

fn heatmap_color(intensity: u8, base: &Rgba<u8>) -> Rgba<u8> {
    match intensity {
        0 => {
            // Transparent passthrough of the baseline.
            Rgba([base[0], base[1], base[2], 64])
        }
        i if i > 200 => Rgba([255, 0, 0, 255]),
        i if i > 100 => {
            // Yellow toward red.
            let t = (i as f32 - 100.0) / 100.0;
            Rgba([255, (255.0 * (1.0 - t)) as u8, 0, 255])
        }
        i => {
            // Green toward yellow.
            let t = i as f32 / 100.0;
            Rgba([(255.0 * t) as u8, 255, 0, 255])
        }
    }
}
