//! Model and wire types for the cutover REST service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

/// Current snapshot schema version. Version 1 is the legacy
/// `sourceUrl`/`targetUrl` job shape that is migrated on load.
pub const SNAPSHOT_VERSION: u32 = 2;

/// Lifecycle states of a comparison job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

/// Lifecycle states of a run. A run moves through `Queued` and
/// `Running` at most once and ends in exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Kind of a registered run artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Log,
    Screenshot,
    Report,
    Other,
}

/// Five-level severity shared by the diff stages and the reasoner.
///
/// Variant order is significant: `Ord` is used to roll severities up
/// (per-page max across viewports, overall max across categories).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Risk points contributed by one category at this severity.
    pub fn risk_points(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Low => 25,
            Self::Medium => 50,
            Self::High => 75,
            Self::Critical => 100,
        }
    }
}

/// Deployment recommendation emitted by the report synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoNoGo {
    Go,
    Conditional,
    NoGo,
}

/// Crawl bounds and path filters for a comparison job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CrawlConfig {
    pub max_depth: u32,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub include_patterns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub exclude_patterns: Vec<String>,
    #[validate(range(min = 1, message = "maxPages must be at least 1"))]
    pub max_pages: u32,
    pub follow_external_links: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 1,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            max_pages: 10,
            follow_external_links: false,
        }
    }
}

/// One explicit page pairing supplied by the user. Explicit pairs
/// always match with confidence 1.0 before automatic matching runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMapEntry {
    pub baseline_path: String,
    pub candidate_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Flags selecting which diff stages a run executes. `seo` is a
/// reserved slot; the orchestrator skips it until a stage ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMatrix {
    pub visual: bool,
    pub functional: bool,
    pub data: bool,
    pub seo: bool,
}

impl Default for TestMatrix {
    fn default() -> Self {
        Self {
            visual: true,
            functional: true,
            data: true,
            seo: true,
        }
    }
}

/// A persistent comparison job: what to compare and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonJob {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub baseline_url: Url,
    pub candidate_url: Url,
    pub crawl_config: CrawlConfig,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub page_map: Vec<PageMapEntry>,
    pub test_matrix: TestMatrix,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Id of the legacy job this one was migrated from, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrated_from: Option<String>,
    pub schema_version: u32,
}

/// One execution of a comparison job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: String,
    pub job_id: String,
    pub status: RunStatus,
    pub triggered_by: String,
    pub triggered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A typed, labeled reference to a file produced during a run.
/// `path` is relative to the artifact root and always begins with
/// the owning run id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunArtifact {
    pub id: String,
    pub run_id: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub label: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/jobs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[validate(length(min = 1, message = "name cannot be empty"))]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub baseline_url: Url,
    pub candidate_url: Url,
    #[validate(nested)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crawl_config: Option<CrawlConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub page_map: Vec<PageMapEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_matrix: Option<TestMatrix>,
}

/// Body of `PUT /api/jobs/:id`. Every field is optional; `id` and
/// `createdAt` are not updatable and have no slot here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobRequest {
    #[validate(length(min = 1, message = "name cannot be empty"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_url: Option<Url>,
    #[validate(nested)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crawl_config: Option<CrawlConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_map: Option<Vec<PageMapEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_matrix: Option<TestMatrix>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
}

/// Body of `POST /api/jobs/:id/run`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRunRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Response of `POST /api/jobs/migrate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateResponse {
    pub count: usize,
}

/// Error body shared by every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
