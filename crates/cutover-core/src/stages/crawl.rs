//! Crawl stage: discover both sites and match their pages.

use cutover_browser::BrowserDriver;
use cutover_crawl::{crawl_site, match_pages, MatchOutcome, MatchedPage};
use cutover_rest_api_contract::ArtifactKind;
use std::fmt::Write as _;
use tracing::info;

use super::{StageFailure, StageOutput, StageResult};
use crate::context::RunContext;

/// Output consumed by the capture stage.
pub struct CrawlStageOutput {
    pub matched: Vec<MatchedPage>,
}

/// Crawl both sides, run the matcher, and commit the matched-pages
/// list, the derived page map and the unmatched-page log as artifacts.
pub async fn run(ctx: &RunContext, driver: &dyn BrowserDriver) -> StageResult<CrawlStageOutput> {
    let mut batch = ctx.batch();

    let baseline_ctx = driver
        .new_context()
        .await
        .map_err(|e| StageFailure::new(format!("cannot open baseline context: {e}")))?;
    let candidate_ctx = driver
        .new_context()
        .await
        .map_err(|e| StageFailure::new(format!("cannot open candidate context: {e}")))?;

    let config = &ctx.job.crawl_config;
    let baseline = crawl_site(baseline_ctx.as_ref(), &ctx.job.baseline_url, config).await;
    let candidate = crawl_site(candidate_ctx.as_ref(), &ctx.job.candidate_url, config).await;

    // Discovery contexts are crawl-local; capture opens its own.
    let _ = baseline_ctx.close().await;
    let _ = candidate_ctx.close().await;

    let (baseline, candidate) = match (baseline, candidate) {
        (Ok(b), Ok(c)) => (b, c),
        (Err(e), _) => return Err(StageFailure::new(format!("baseline crawl failed: {e}"))),
        (_, Err(e)) => return Err(StageFailure::new(format!("candidate crawl failed: {e}"))),
    };

    let outcome: MatchOutcome = match_pages(
        &ctx.job.page_map,
        &ctx.job.baseline_url,
        &ctx.job.candidate_url,
        &baseline.pages,
        &candidate.pages,
    );

    info!(
        run_id = %ctx.run_id,
        baseline_pages = baseline.pages.len(),
        candidate_pages = candidate.pages.len(),
        matched = outcome.matched.len(),
        "crawl and match finished"
    );

    let commit = (|| {
        batch.write_json(
            "matched-pages.json",
            &outcome.matched,
            ArtifactKind::Other,
            "Matched pages",
        )?;
        batch.write_json(
            "page-map.json",
            &outcome.derived_page_map(),
            ArtifactKind::Other,
            "Derived page map",
        )?;
        batch.write_text(
            "crawl-unmatched.log",
            &unmatched_report(&outcome, &baseline.skipped, &candidate.skipped),
            ArtifactKind::Log,
            "Unmatched pages",
        )?;
        crate::error::Result::Ok(())
    })();
    if let Err(e) = commit {
        return Err(StageFailure::with_artifacts(
            format!("cannot write crawl artifacts: {e}"),
            batch.take_entries(),
        ));
    }

    if outcome.matched.is_empty() {
        return Err(StageFailure::with_artifacts(
            "no comparable pages found between baseline and candidate",
            batch.take_entries(),
        ));
    }

    Ok(StageOutput {
        value: CrawlStageOutput {
            matched: outcome.matched,
        },
        artifacts: batch.take_entries(),
    })
}

fn unmatched_report(
    outcome: &MatchOutcome,
    baseline_skipped: &[cutover_crawl::SkippedPage],
    candidate_skipped: &[cutover_crawl::SkippedPage],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "unmatched baseline pages: {}", outcome.unmatched_baseline.len());
    for page in &outcome.unmatched_baseline {
        let _ = writeln!(out, "  {}", page.url);
    }
    let _ = writeln!(out, "unmatched candidate pages: {}", outcome.unmatched_candidate.len());
    for page in &outcome.unmatched_candidate {
        let _ = writeln!(out, "  {}", page.url);
    }
    for (side, skipped) in [("baseline", baseline_skipped), ("candidate", candidate_skipped)] {
        if !skipped.is_empty() {
            let _ = writeln!(out, "skipped on {side}: {}", skipped.len());
            for page in skipped {
                let _ = writeln!(out, "  {} ({})", page.url, page.reason);
            }
        }
    }
    out
}
