//! Report synthesis: risk scoring, technical findings, executive
//! summary and the Go/No-Go decision, emitted as JSON and Markdown.

use chrono::{DateTime, Utc};
use cutover_rest_api_contract::{ArtifactKind, GoNoGo, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::debug;

use super::data::{DataStageOutput, PageDataStatus};
use super::functional::FunctionalStageOutput;
use super::visual::VisualStageOutput;
use super::{StageFailure, StageOutput, StageResult};
use crate::context::RunContext;
use crate::reasoner::{MigrationAnalysis, ReasoningInput};

/// Detailed stage outputs available to the synthesizer. A `None` slot
/// was gated off or failed.
#[derive(Default)]
pub struct StageOutputs {
    pub visual: Option<VisualStageOutput>,
    pub functional: Option<FunctionalStageOutput>,
    pub data: Option<DataStageOutput>,
}

/// Risk scores on the 0-100 scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScore {
    pub per_category: BTreeMap<String, u32>,
    pub overall: f64,
}

/// One actionable finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalFinding {
    pub title: String,
    pub severity: Severity,
    pub impact: String,
    pub recommendation: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub affected_pages: Vec<String>,
    pub evidence: String,
}

/// Headline metrics for the executive summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetrics {
    pub pages_tested: usize,
    pub issues_found: usize,
    pub critical_issues: usize,
    pub pass_rate: f64,
}

/// The decision block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutiveSummary {
    pub key_metrics: KeyMetrics,
    pub decision: GoNoGo,
    pub summary: String,
}

/// The complete report document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub job_id: String,
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub reasoner: String,
    pub risk: RiskScore,
    pub executive: ExecutiveSummary,
    pub findings: Vec<TechnicalFinding>,
    pub analysis: MigrationAnalysis,
    pub stage_summaries: ReasoningInput,
}

/// The Go/No-Go rule. No-Go dominates: it applies whenever the risk
/// is 75 or above or the reasoner failed the migration.
pub fn decide(overall_risk: f64, has_critical: bool, reasoner_pass: bool) -> GoNoGo {
    if overall_risk >= 75.0 || !reasoner_pass {
        GoNoGo::NoGo
    } else if overall_risk < 50.0 && !has_critical {
        GoNoGo::Go
    } else {
        GoNoGo::Conditional
    }
}

fn affected_pages(category: &str, outputs: &StageOutputs) -> Vec<String> {
    match category {
        "visual" => outputs
            .visual
            .iter()
            .flat_map(|v| &v.pages)
            .filter(|p| p.severity > Severity::None)
            .map(|p| p.baseline_path.clone())
            .collect(),
        "functional" => outputs
            .functional
            .iter()
            .flat_map(|f| &f.pages)
            .filter(|p| !p.broken_links.is_empty() || !p.js_errors.is_empty())
            .map(|p| format!("{} ({})", p.path, p.side.as_str()))
            .collect(),
        "data" => outputs
            .data
            .iter()
            .flat_map(|d| &d.pages)
            .filter(|p| p.status != PageDataStatus::Match)
            .map(|p| p.baseline_path.clone())
            .collect(),
        _ => Vec::new(),
    }
}

/// Build the report value from the analysis and the stage outputs.
pub fn synthesize(
    ctx: &RunContext,
    input: &ReasoningInput,
    analysis: &MigrationAnalysis,
    outputs: &StageOutputs,
    reasoner: &str,
) -> MigrationReport {
    let mut per_category = BTreeMap::new();
    for category in &analysis.categories {
        per_category.insert(category.category.clone(), category.severity.risk_points());
    }
    let overall = if per_category.is_empty() {
        0.0
    } else {
        per_category.values().map(|v| *v as f64).sum::<f64>() / per_category.len() as f64
    };

    let findings = analysis
        .categories
        .iter()
        .filter(|c| !c.pass || c.severity >= Severity::Medium)
        .map(|c| TechnicalFinding {
            title: format!("{} differences require review", c.category),
            severity: c.severity,
            impact: c.explanation.clone(),
            recommendation: analysis
                .overall
                .recommendations
                .iter()
                .find(|r| r.contains(&c.category))
                .cloned()
                .unwrap_or_else(|| format!("inspect the {} artifacts for this run", c.category)),
            affected_pages: affected_pages(&c.category, outputs),
            evidence: c.key_findings.join("; "),
        })
        .collect::<Vec<_>>();

    let has_critical = analysis.categories.iter().any(|c| c.severity == Severity::Critical);
    let critical_issues = input.visual.as_ref().map_or(0, |v| v.critical_issues)
        + input.data.as_ref().map_or(0, |d| d.critical_mismatches);
    let issues_found = input.visual.as_ref().map_or(0, |v| v.pages_with_diffs)
        + input.functional.as_ref().map_or(0, |f| {
            f.candidate.total_broken_links + f.candidate.total_js_errors
        })
        + input.data.as_ref().map_or(0, |d| d.total_field_diffs);
    let passing = analysis.categories.iter().filter(|c| c.pass).count();
    let pass_rate = if analysis.categories.is_empty() {
        1.0
    } else {
        passing as f64 / analysis.categories.len() as f64
    };

    let decision = decide(overall, has_critical, analysis.overall.pass);
    let summary = format!(
        "Compared {} pages between baseline and candidate. {} issues found \
         ({} critical). Overall risk {:.0}/100; recommendation: {}.",
        input.pages_tested,
        issues_found,
        critical_issues,
        overall,
        match decision {
            GoNoGo::Go => "go",
            GoNoGo::Conditional => "conditional go, resolve flagged items first",
            GoNoGo::NoGo => "no-go",
        }
    );

    MigrationReport {
        job_id: ctx.job.id.clone(),
        run_id: ctx.run_id.clone(),
        generated_at: Utc::now(),
        reasoner: reasoner.to_string(),
        risk: RiskScore {
            per_category,
            overall,
        },
        executive: ExecutiveSummary {
            key_metrics: KeyMetrics {
                pages_tested: input.pages_tested,
                issues_found,
                critical_issues,
                pass_rate,
            },
            decision,
            summary,
        },
        findings,
        analysis: analysis.clone(),
        stage_summaries: input.clone(),
    }
}

/// Synthesize and commit `reports/report.json` and
/// `reports/report.md`.
pub async fn run(
    ctx: &RunContext,
    input: &ReasoningInput,
    analysis: &MigrationAnalysis,
    outputs: &StageOutputs,
    reasoner: &str,
) -> StageResult<MigrationReport> {
    let report = synthesize(ctx, input, analysis, outputs, reasoner);
    let mut batch = ctx.batch();

    let write = (|| {
        batch.write_json(
            "reports/report.json",
            &report,
            ArtifactKind::Report,
            "Migration report (JSON)",
        )?;
        batch.write_text(
            "reports/report.md",
            &render_markdown(&report),
            ArtifactKind::Report,
            "Migration report (Markdown)",
        )?;
        crate::error::Result::Ok(())
    })();
    if let Err(e) = write {
        return Err(StageFailure::with_artifacts(
            format!("cannot write report: {e}"),
            batch.take_entries(),
        ));
    }

    debug!(run_id = %ctx.run_id, decision = ?report.executive.decision, "report committed");
    Ok(StageOutput {
        artifacts: batch.take_entries(),
        value: report,
    })
}

fn render_markdown(report: &MigrationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Migration assurance report\n");
    let _ = writeln!(out, "- Job: `{}`", report.job_id);
    let _ = writeln!(out, "- Run: `{}`", report.run_id);
    let _ = writeln!(out, "- Generated: {}", report.generated_at.to_rfc3339());
    let _ = writeln!(out, "- Reasoner: {}\n", report.reasoner);

    let metrics = &report.executive.key_metrics;
    let _ = writeln!(out, "## Decision: {:?}\n", report.executive.decision);
    let _ = writeln!(out, "{}\n", report.executive.summary);
    let _ = writeln!(out, "| Metric | Value |");
    let _ = writeln!(out, "|---|---|");
    let _ = writeln!(out, "| Pages tested | {} |", metrics.pages_tested);
    let _ = writeln!(out, "| Issues found | {} |", metrics.issues_found);
    let _ = writeln!(out, "| Critical issues | {} |", metrics.critical_issues);
    let _ = writeln!(out, "| Pass rate | {:.0}% |", metrics.pass_rate * 100.0);
    let _ = writeln!(out, "| Overall risk | {:.0}/100 |\n", report.risk.overall);

    let _ = writeln!(out, "## Risk by category\n");
    let _ = writeln!(out, "| Category | Risk |");
    let _ = writeln!(out, "|---|---|");
    for (category, risk) in &report.risk.per_category {
        let _ = writeln!(out, "| {category} | {risk} |");
    }
    let _ = writeln!(out);

    if report.findings.is_empty() {
        let _ = writeln!(out, "## Findings\n\nNo blocking findings.\n");
    } else {
        let _ = writeln!(out, "## Findings\n");
        for finding in &report.findings {
            let _ = writeln!(out, "### {} ({:?})\n", finding.title, finding.severity);
            let _ = writeln!(out, "- Impact: {}", finding.impact);
            let _ = writeln!(out, "- Recommendation: {}", finding.recommendation);
            if !finding.affected_pages.is_empty() {
                let _ = writeln!(out, "- Affected pages: {}", finding.affected_pages.join(", "));
            }
            if !finding.evidence.is_empty() {
                let _ = writeln!(out, "- Evidence: {}", finding.evidence);
            }
            let _ = writeln!(out);
        }
    }

    let _ = writeln!(out, "## Recommendations\n");
    for recommendation in &report.analysis.overall.recommendations {
        let _ = writeln!(out, "- {recommendation}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_go_dominates_low_risk() {
        assert_eq!(decide(10.0, false, false), GoNoGo::NoGo);
        assert_eq!(decide(80.0, false, true), GoNoGo::NoGo);
    }

    #[test]
    fn go_requires_low_risk_and_no_critical() {
        assert_eq!(decide(10.0, false, true), GoNoGo::Go);
        assert_eq!(decide(10.0, true, true), GoNoGo::Conditional);
        assert_eq!(decide(60.0, false, true), GoNoGo::Conditional);
    }

    #[test]
    fn severity_maps_to_risk_points() {
        assert_eq!(Severity::None.risk_points(), 0);
        assert_eq!(Severity::Low.risk_points(), 25);
        assert_eq!(Severity::Medium.risk_points(), 50);
        assert_eq!(Severity::High.risk_points(), 75);
        assert_eq!(Severity::Critical.risk_points(), 100);
    }
}
