//! Reasoning capability: classify the diff-stage outputs into a
//! severity-tagged analysis.
//!
//! Two implementations share the output shape: [`llm::LlmReasoner`]
//! when an endpoint is configured, and [`rules::RuleBasedReasoner`] as
//! the deterministic fallback the orchestrator uses when the LLM is
//! absent or fails.

pub mod llm;
pub mod rules;

use async_trait::async_trait;
use cutover_rest_api_contract::Severity;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stages::data::DataSummary;
use crate::stages::functional::FunctionalSummary;
use crate::stages::visual::VisualSummary;

/// Compact summary of the diff stages. A `None` slot means the stage
/// was gated off or failed and is marked unavailable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningInput {
    pub pages_tested: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual: Option<VisualSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functional: Option<FunctionalSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSummary>,
}

/// Analysis of one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAnalysis {
    pub category: String,
    pub severity: Severity,
    pub confidence: f64,
    pub pass: bool,
    pub explanation: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub key_findings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub false_positives: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub expected_changes: Vec<String>,
}

/// Overall verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallAnalysis {
    pub severity: Severity,
    pub confidence: f64,
    pub pass: bool,
    pub explanation: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub recommendations: Vec<String>,
}

/// The full analysis document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationAnalysis {
    pub categories: Vec<CategoryAnalysis>,
    pub overall: OverallAnalysis,
}

/// The reasoning capability.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Classify the summarized evidence.
    async fn analyze(&self, input: &ReasoningInput) -> Result<MigrationAnalysis>;

    /// Implementation name recorded in logs and the report.
    fn name(&self) -> &'static str;
}
