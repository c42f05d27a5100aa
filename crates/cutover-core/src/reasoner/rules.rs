//! Deterministic rule-based analysis, used when no LLM is configured
//! and as the fallback when the LLM call fails.

use async_trait::async_trait;
use cutover_rest_api_contract::Severity;

use super::{CategoryAnalysis, MigrationAnalysis, OverallAnalysis, Reasoner, ReasoningInput};
use crate::error::Result;

const CONFIDENCE: f64 = 0.75;

/// Threshold-driven reasoner.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedReasoner;

fn visual_severity(summary: &crate::stages::visual::VisualSummary) -> Severity {
    if summary.critical_issues > 0 {
        Severity::Critical
    } else if summary.average_diff_pct > 30.0 {
        Severity::High
    } else if summary.average_diff_pct > 10.0 {
        Severity::Medium
    } else if summary.average_diff_pct > 5.0 {
        Severity::Low
    } else {
        Severity::None
    }
}

fn functional_severity(issues: usize) -> Severity {
    match issues {
        0 => Severity::None,
        1..=4 => Severity::Low,
        5..=9 => Severity::Medium,
        10..=19 => Severity::High,
        _ => Severity::Critical,
    }
}

fn data_severity(summary: &crate::stages::data::DataSummary) -> Severity {
    if summary.critical_mismatches > 0 || summary.total_field_diffs >= 50 {
        Severity::High
    } else if summary.total_field_diffs >= 20 {
        Severity::Medium
    } else if summary.total_field_diffs > 0 {
        Severity::Low
    } else {
        Severity::None
    }
}

fn unavailable(category: &str) -> CategoryAnalysis {
    CategoryAnalysis {
        category: category.to_string(),
        severity: Severity::None,
        confidence: 0.0,
        pass: true,
        explanation: "stage unavailable; no evidence to assess".to_string(),
        key_findings: Vec::new(),
        false_positives: Vec::new(),
        expected_changes: Vec::new(),
    }
}

fn category(
    name: &str,
    severity: Severity,
    explanation: String,
    key_findings: Vec<String>,
) -> CategoryAnalysis {
    CategoryAnalysis {
        category: name.to_string(),
        severity,
        confidence: CONFIDENCE,
        pass: severity < Severity::High,
        explanation,
        key_findings,
        false_positives: Vec::new(),
        expected_changes: Vec::new(),
    }
}

#[async_trait]
impl Reasoner for RuleBasedReasoner {
    async fn analyze(&self, input: &ReasoningInput) -> Result<MigrationAnalysis> {
        let mut categories = Vec::new();

        match &input.visual {
            Some(summary) => {
                let severity = visual_severity(summary);
                let mut findings = Vec::new();
                if summary.pages_with_diffs > 0 {
                    findings.push(format!(
                        "{} of {} pages show visual differences",
                        summary.pages_with_diffs, summary.pages
                    ));
                }
                if summary.critical_issues > 0 {
                    findings.push(format!(
                        "{} pages have critical layout regressions",
                        summary.critical_issues
                    ));
                }
                categories.push(category(
                    "visual",
                    severity,
                    format!("average pixel difference {:.2}%", summary.average_diff_pct),
                    findings,
                ));
            }
            None => categories.push(unavailable("visual")),
        }

        match &input.functional {
            Some(summary) => {
                let issues =
                    summary.candidate.total_broken_links + summary.candidate.total_js_errors;
                let severity = functional_severity(issues);
                let mut findings = Vec::new();
                if summary.candidate.total_broken_links > 0 {
                    findings.push(format!(
                        "{} broken links on the candidate site",
                        summary.candidate.total_broken_links
                    ));
                }
                if summary.candidate.total_js_errors > 0 {
                    findings.push(format!(
                        "{} JavaScript errors on the candidate site",
                        summary.candidate.total_js_errors
                    ));
                }
                categories.push(category(
                    "functional",
                    severity,
                    format!("{issues} functional issues on the candidate side"),
                    findings,
                ));
            }
            None => categories.push(unavailable("functional")),
        }

        match &input.data {
            Some(summary) => {
                let severity = data_severity(summary);
                let mut findings = Vec::new();
                if summary.critical_mismatches > 0 {
                    findings.push(format!(
                        "{} critical data mismatches (pricing drift)",
                        summary.critical_mismatches
                    ));
                }
                if summary.pages_with_mismatches > 0 {
                    findings.push(format!(
                        "{} of {} pages have content mismatches",
                        summary.pages_with_mismatches, summary.pages
                    ));
                }
                categories.push(category(
                    "data",
                    severity,
                    format!("{} field-level differences", summary.total_field_diffs),
                    findings,
                ));
            }
            None => categories.push(unavailable("data")),
        }

        let overall_severity = categories
            .iter()
            .map(|c| c.severity)
            .max()
            .unwrap_or(Severity::None);
        let pass = overall_severity < Severity::High;

        let mut recommendations = Vec::new();
        for cat in &categories {
            if cat.severity >= Severity::Medium {
                recommendations.push(format!(
                    "review the {} findings before cutover ({})",
                    cat.category, cat.explanation
                ));
            }
        }
        if recommendations.is_empty() && pass {
            recommendations
                .push("no blocking differences detected; proceed with standard checks".to_string());
        }

        Ok(MigrationAnalysis {
            categories,
            overall: OverallAnalysis {
                severity: overall_severity,
                confidence: CONFIDENCE,
                pass,
                explanation: format!(
                    "rule-based assessment across {} pages",
                    input.pages_tested
                ),
                recommendations,
            },
        })
    }

    fn name(&self) -> &'static str {
        "rule-based"
    }
}
