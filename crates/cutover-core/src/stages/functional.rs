//! Functional QA stage: navigation, forms, broken links, JS errors
//! and a HAR document per (side, page).

use cutover_browser::{
    BrowserContext, BrowserPage, ConsoleLevel, FormField, FormFieldKind, FormSnapshot, JsError,
    SubmitOutcome,
};
use cutover_crawl::PageRef;
use cutover_rest_api_contract::ArtifactKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use super::capture::CaptureOutput;
use super::{Side, StageFailure, StageOutput, StageResult};
use crate::context::{ArtifactBatch, RunContext};
use crate::har::Har;

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Navigation record for one page visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationRecord {
    pub status: u16,
    pub load_time_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub redirect_chain: Vec<String>,
}

/// One form exercise result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormResult {
    pub form_index: usize,
    pub outcome: SubmitOutcome,
}

/// One broken link found on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokenLink {
    pub href: String,
    pub reason: String,
}

/// Everything observed for one page on one side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFunctionalResult {
    pub side: Side,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation: Option<NavigationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_error: Option<String>,
    pub forms: Vec<FormResult>,
    pub broken_links: Vec<BrokenLink>,
    pub js_errors: Vec<JsError>,
}

impl PageFunctionalResult {
    fn has_navigation_issue(&self) -> bool {
        self.navigation_error.is_some()
            || self.navigation.as_ref().is_some_and(|n| n.status >= 400)
    }

    fn has_form_issue(&self) -> bool {
        self.forms
            .iter()
            .any(|f| matches!(f.outcome, SubmitOutcome::Error { .. }))
    }
}

/// Issue counts for one side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideFunctionalSummary {
    pub pages: usize,
    pub pages_with_navigation_issues: usize,
    pub pages_with_form_issues: usize,
    pub total_broken_links: usize,
    pub total_js_errors: usize,
    pub pages_with_js_errors: usize,
}

/// Run-level functional summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionalSummary {
    pub baseline: SideFunctionalSummary,
    pub candidate: SideFunctionalSummary,
}

/// The stage's value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionalStageOutput {
    pub summary: FunctionalSummary,
    pub pages: Vec<PageFunctionalResult>,
}

/// Exercise every matched page on both sides using the shared browser
/// contexts left open by capture.
pub async fn run(ctx: &RunContext, capture: &CaptureOutput) -> StageResult<FunctionalStageOutput> {
    let contexts = ctx
        .contexts()
        .await
        .ok_or_else(|| StageFailure::new("browser contexts are not available"))?;

    let mut batch = ctx.batch();
    let mut pages = Vec::new();

    for captured in &capture.pages {
        for (side, context, page_ref) in [
            (Side::Baseline, &contexts.baseline, &captured.page.baseline),
            (Side::Candidate, &contexts.candidate, &captured.page.candidate),
        ] {
            let result = exercise_page(context.as_ref(), side, page_ref, &mut batch).await;
            match result {
                Ok(result) => pages.push(result),
                Err(message) => {
                    return Err(StageFailure::with_artifacts(message, batch.take_entries()))
                }
            }
        }
    }

    let summary = FunctionalSummary {
        baseline: summarize_side(&pages, Side::Baseline),
        candidate: summarize_side(&pages, Side::Candidate),
    };
    let output = FunctionalStageOutput { summary, pages };
    if let Err(e) = batch.write_json(
        "functional-results.json",
        &output,
        ArtifactKind::Other,
        "Functional QA results",
    ) {
        return Err(StageFailure::with_artifacts(
            format!("cannot write functional results: {e}"),
            batch.take_entries(),
        ));
    }

    debug!(run_id = %ctx.run_id, pages = output.pages.len(), "functional QA finished");
    Ok(StageOutput {
        artifacts: batch.take_entries(),
        value: output,
    })
}

/// Heuristic fill value for one field.
fn fill_value(field: &FormField) -> Option<(String, String)> {
    let name = field.name.to_ascii_lowercase();
    let value = match field.kind {
        FormFieldKind::Select => field
            .options
            .get(1)
            .or_else(|| field.options.first())?
            .clone(),
        FormFieldKind::Email => "test@example.com".to_string(),
        FormFieldKind::Text | FormFieldKind::Textarea => {
            if name.contains("email") {
                "test@example.com".to_string()
            } else if name.contains("name") {
                "Test User".to_string()
            } else if name.contains("message") || name.contains("comment") {
                "Test message".to_string()
            } else {
                "test".to_string()
            }
        }
        FormFieldKind::Other => return None,
    };
    Some((field.name.clone(), value))
}

fn fillable(form: &FormSnapshot) -> bool {
    form.fields.iter().any(|f| {
        matches!(
            f.kind,
            FormFieldKind::Text | FormFieldKind::Email | FormFieldKind::Textarea
        )
    })
}

async fn exercise_page(
    context: &dyn BrowserContext,
    side: Side,
    target: &PageRef,
    batch: &mut ArtifactBatch,
) -> std::result::Result<PageFunctionalResult, String> {
    let mut page = context
        .new_page()
        .await
        .map_err(|e| format!("cannot open {} page: {e}", side.as_str()))?;
    let result = exercise_page_inner(page.as_mut(), side, target, batch).await;
    let _ = page.close().await;
    result
}

async fn exercise_page_inner(
    page: &mut dyn BrowserPage,
    side: Side,
    target: &PageRef,
    batch: &mut ArtifactBatch,
) -> std::result::Result<PageFunctionalResult, String> {
    let sanitized = cutover_store::sanitize_path_segment(&target.path);
    let mut result = PageFunctionalResult {
        side,
        path: target.path.clone(),
        navigation: None,
        navigation_error: None,
        forms: Vec::new(),
        broken_links: Vec::new(),
        js_errors: Vec::new(),
    };

    let navigation = match page.navigate(&target.url, NAVIGATION_TIMEOUT).await {
        Ok(nav) => nav,
        Err(e) => {
            // One side being down is an anomaly to report, not a
            // reason to abandon the stage.
            result.navigation_error = Some(e.to_string());
            let har = Har::minimal(target.url.as_str());
            write_har(batch, side, &sanitized, &har, &target.path)
                .map_err(|e| format!("cannot write HAR: {e}"))?;
            return Ok(result);
        }
    };

    result.navigation = Some(NavigationRecord {
        status: navigation.status,
        load_time_ms: navigation.load_time_ms,
        redirect_chain: navigation
            .redirect_chain
            .iter()
            .map(|u| u.to_string())
            .collect(),
    });

    // HAR from the initial load, before probing muddies the waters.
    let har = Har::from_events(
        navigation.final_url.as_str(),
        navigation.load_time_ms,
        &page.network_events(),
    );
    write_har(batch, side, &sanitized, &har, &target.path)
        .map_err(|e| format!("cannot write HAR: {e}"))?;

    // JS errors: uncaught errors and rejections plus console errors.
    result.js_errors = page.js_errors();
    for message in page.console_messages() {
        if message.level == ConsoleLevel::Error {
            result.js_errors.push(JsError {
                message: message.text,
                source: Some("console".into()),
                line: None,
                column: None,
                stack: None,
                timestamp: message.timestamp,
            });
        }
    }

    // Forms, re-navigating after each submission.
    let forms = page.forms().await.unwrap_or_default();
    for form in forms.iter().filter(|f| fillable(f)) {
        let values: Vec<(String, String)> = form.fields.iter().filter_map(fill_value).collect();
        let outcome = match page.submit_form(form, &values, SUBMIT_TIMEOUT).await {
            Ok(outcome) => outcome,
            Err(e) => SubmitOutcome::Error {
                message: e.to_string(),
            },
        };
        result.forms.push(FormResult {
            form_index: form.index,
            outcome,
        });
        if page.navigate(&target.url, NAVIGATION_TIMEOUT).await.is_err() {
            trace!(url = %target.url, "re-navigation after submit failed");
            return Ok(result);
        }
    }

    // Broken-link probing: same-origin, network-navigable anchors,
    // each probed once, page restored afterwards.
    let links = page.links().await.unwrap_or_default();
    let mut probed: HashSet<String> = HashSet::new();
    for link in links {
        if !link.is_network_navigable() {
            continue;
        }
        let Ok(href) = Url::parse(&link.href) else {
            continue;
        };
        if !cutover_crawl::same_origin(&href, &target.url) {
            continue;
        }
        if !probed.insert(href.to_string()) {
            continue;
        }
        match page.navigate(&href, PROBE_TIMEOUT).await {
            Ok(nav) if nav.status >= 400 => {
                result.broken_links.push(BrokenLink {
                    href: href.to_string(),
                    reason: format!("status {}", nav.status),
                });
                restore(page, &target.url).await?;
            }
            Ok(_) => restore(page, &target.url).await?,
            Err(e) => {
                result.broken_links.push(BrokenLink {
                    href: href.to_string(),
                    reason: e.to_string(),
                });
                // A failed probe may not have left the page; restore
                // by direct navigation.
                if page.navigate(&target.url, NAVIGATION_TIMEOUT).await.is_err() {
                    return Ok(result);
                }
            }
        }
    }

    Ok(result)
}

async fn restore(
    page: &mut dyn BrowserPage,
    target: &Url,
) -> std::result::Result<(), String> {
    if page.go_back(NAVIGATION_TIMEOUT).await.is_err() {
        page.navigate(target, NAVIGATION_TIMEOUT)
            .await
            .map_err(|e| format!("cannot restore page after probe: {e}"))?;
    }
    Ok(())
}

fn write_har(
    batch: &mut ArtifactBatch,
    side: Side,
    sanitized: &str,
    har: &Har,
    path: &str,
) -> crate::error::Result<()> {
    batch.write_json(
        &format!("har/{}/{sanitized}.har", side.as_str()),
        har,
        ArtifactKind::Other,
        format!("{} {} HAR", side.as_str(), path),
    )
}

fn summarize_side(pages: &[PageFunctionalResult], side: Side) -> SideFunctionalSummary {
    let mut summary = SideFunctionalSummary::default();
    for page in pages.iter().filter(|p| p.side == side) {
        summary.pages += 1;
        if page.has_navigation_issue() {
            summary.pages_with_navigation_issues += 1;
        }
        if page.has_form_issue() {
            summary.pages_with_form_issues += 1;
        }
        summary.total_broken_links += page.broken_links.len();
        summary.total_js_errors += page.js_errors.len();
        if !page.js_errors.is_empty() {
            summary.pages_with_js_errors += 1;
        }
    }
    summary
}
