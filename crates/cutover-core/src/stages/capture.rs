//! Capture stage: deterministic dual-site evidence collection.
//!
//! For every matched page the stage captures the baseline side first,
//! then the candidate, so artifact trees stay byte-stable across
//! re-runs given identical inputs. The two browser contexts opened
//! here are published on the run context and stay alive for the
//! middle stages.

use cutover_browser::{raster, BrowserDriver, BrowserPage, ConsoleMessage, JsError, NetworkEvent, Viewport};
use cutover_crawl::{MatchedPage, PageRef};
use cutover_rest_api_contract::ArtifactKind;
use cutover_store::sanitize_path_segment;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{Side, StageFailure, StageOutput, StageResult};
use crate::context::{ArtifactBatch, RunContext, SideContexts};

/// Per-navigation bound during capture.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// One stored screenshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRef {
    pub viewport: Viewport,
    pub relative_path: String,
}

/// Everything captured for one page on one side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideCapture {
    pub side: Side,
    pub sanitized_path: String,
    pub final_url: Url,
    pub status: u16,
    pub load_time_ms: u64,
    #[serde(skip)]
    pub html: String,
    #[serde(skip)]
    pub visible_text: String,
    pub console: Vec<ConsoleMessage>,
    pub network: Vec<NetworkEvent>,
    pub js_errors: Vec<JsError>,
    pub screenshots: Vec<ScreenshotRef>,
}

/// A matched page with both sides captured.
#[derive(Debug, Clone)]
pub struct CapturedPage {
    pub page: MatchedPage,
    pub baseline: SideCapture,
    pub candidate: SideCapture,
}

/// Output shared by the three diff stages.
pub struct CaptureOutput {
    pub pages: Vec<CapturedPage>,
}

/// Metadata artifact written per (side, page).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptureMetadata<'a> {
    final_url: &'a Url,
    status: u16,
    load_time_ms: u64,
}

/// Capture every matched page on both sides across the configured
/// viewports. Opens the two shared browser contexts and publishes
/// them on the run context before returning.
pub async fn run(
    ctx: &RunContext,
    driver: &dyn BrowserDriver,
    matched: &[MatchedPage],
    viewports: &[Viewport],
) -> StageResult<CaptureOutput> {
    let mut batch = ctx.batch();

    let baseline_ctx = driver
        .new_context()
        .await
        .map_err(|e| StageFailure::new(format!("cannot open baseline context: {e}")))?;
    let candidate_ctx = match driver.new_context().await {
        Ok(c) => c,
        Err(e) => {
            let _ = baseline_ctx.close().await;
            return Err(StageFailure::new(format!("cannot open candidate context: {e}")));
        }
    };
    ctx.set_contexts(SideContexts {
        baseline: baseline_ctx.clone(),
        candidate: candidate_ctx.clone(),
    })
    .await;

    let mut pages = Vec::with_capacity(matched.len());
    for page in matched {
        let baseline = capture_side(
            baseline_ctx.as_ref().new_page().await,
            Side::Baseline,
            &page.baseline,
            viewports,
            &mut batch,
        )
        .await;
        let baseline = match baseline {
            Ok(capture) => capture,
            Err(message) => return Err(StageFailure::with_artifacts(message, batch.take_entries())),
        };

        let candidate = capture_side(
            candidate_ctx.as_ref().new_page().await,
            Side::Candidate,
            &page.candidate,
            viewports,
            &mut batch,
        )
        .await;
        let candidate = match candidate {
            Ok(capture) => capture,
            Err(message) => return Err(StageFailure::with_artifacts(message, batch.take_entries())),
        };

        pages.push(CapturedPage {
            page: page.clone(),
            baseline,
            candidate,
        });
    }

    debug!(run_id = %ctx.run_id, pages = pages.len(), "capture finished");
    Ok(StageOutput {
        value: CaptureOutput { pages },
        artifacts: batch.take_entries(),
    })
}

async fn capture_side(
    page: cutover_browser::Result<Box<dyn BrowserPage>>,
    side: Side,
    target: &PageRef,
    viewports: &[Viewport],
    batch: &mut ArtifactBatch,
) -> std::result::Result<SideCapture, String> {
    let mut page = page.map_err(|e| format!("cannot open {} page: {e}", side.as_str()))?;
    let result = capture_side_inner(page.as_mut(), side, target, viewports, batch).await;
    let _ = page.close().await;
    result
}

async fn capture_side_inner(
    page: &mut dyn BrowserPage,
    side: Side,
    target: &PageRef,
    viewports: &[Viewport],
    batch: &mut ArtifactBatch,
) -> std::result::Result<SideCapture, String> {
    let sanitized = sanitize_path_segment(&target.path);
    let dir = format!("{}/{}", side.as_str(), sanitized);
    let mut capture: Option<SideCapture> = None;

    for viewport in viewports {
        page.set_viewport(viewport)
            .await
            .map_err(|e| format!("cannot set {} viewport: {e}", viewport.name))?;
        let navigation = page
            .navigate(&target.url, NAVIGATION_TIMEOUT)
            .await
            .map_err(|e| format!("{} navigation to {} failed: {e}", side.as_str(), target.url))?;

        let shot = page
            .screenshot()
            .await
            .map_err(|e| format!("{} screenshot of {} failed: {e}", side.as_str(), target.url))?;
        let png = raster::encode_png(&shot).map_err(|e| format!("cannot encode screenshot: {e}"))?;
        let shot_path = format!("{dir}/{}.png", viewport.name);
        batch
            .write_bytes(
                &shot_path,
                &png,
                ArtifactKind::Screenshot,
                format!("{} {} {} screenshot", side.as_str(), target.path, viewport.name),
            )
            .map_err(|e| format!("cannot write screenshot: {e}"))?;

        // Document-level evidence comes from the first viewport pass;
        // later passes only add screenshots.
        if capture.is_none() {
            let html = page.html().await.unwrap_or_default();
            let visible_text = page.visible_text().await.unwrap_or_default();
            capture = Some(SideCapture {
                side,
                sanitized_path: sanitized.clone(),
                final_url: navigation.final_url.clone(),
                status: navigation.status,
                load_time_ms: navigation.load_time_ms,
                html,
                visible_text,
                console: page.console_messages(),
                network: page.network_events(),
                js_errors: page.js_errors(),
                screenshots: Vec::new(),
            });
        }
        if let Some(record) = capture.as_mut() {
            record.screenshots.push(ScreenshotRef {
                viewport: viewport.clone(),
                relative_path: shot_path,
            });
        }
    }

    let capture = capture.ok_or_else(|| "no viewports configured".to_string())?;

    let write = (|| {
        batch.write_text(
            &format!("{dir}/snapshot.html"),
            &capture.html,
            ArtifactKind::Other,
            format!("{} {} HTML", side.as_str(), target.path),
        )?;
        batch.write_text(
            &format!("{dir}/visible-text.txt"),
            &capture.visible_text,
            ArtifactKind::Other,
            format!("{} {} visible text", side.as_str(), target.path),
        )?;
        batch.write_json(
            &format!("{dir}/console.json"),
            &capture.console,
            ArtifactKind::Log,
            format!("{} {} console", side.as_str(), target.path),
        )?;
        batch.write_json(
            &format!("{dir}/network.json"),
            &capture.network,
            ArtifactKind::Log,
            format!("{} {} network", side.as_str(), target.path),
        )?;
        batch.write_json(
            &format!("{dir}/metadata.json"),
            &CaptureMetadata {
                final_url: &capture.final_url,
                status: capture.status,
                load_time_ms: capture.load_time_ms,
            },
            ArtifactKind::Other,
            format!("{} {} metadata", side.as_str(), target.path),
        )?;
        crate::error::Result::Ok(())
    })();
    write.map_err(|e| format!("cannot write capture artifacts: {e}"))?;

    Ok(capture)
}
