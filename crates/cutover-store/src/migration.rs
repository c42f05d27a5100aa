//! Legacy snapshot migration.
//!
//! Version 1 snapshots carry a `jobs` array of `sourceUrl`/`targetUrl`
//! records. Migration converts each legacy job into a [`ComparisonJob`]
//! with default crawl config and test matrix and a back-pointer to the
//! legacy id. Rules are total over every legacy shape we have seen and
//! never discard information: a summary of what was converted lands in
//! the snapshot metadata.

use chrono::{DateTime, Utc};
use cutover_rest_api_contract::{
    ComparisonJob, CrawlConfig, JobStatus, Run, RunArtifact, TestMatrix, SNAPSHOT_VERSION,
};
use serde::Deserialize;
use url::Url;

use crate::snapshot::{SnapshotMetadata, StorageSnapshot};

/// The on-disk document as read, before any migration. Tolerates both
/// the current `comparisonJobs` key and the legacy `jobs` key.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSnapshot {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub comparison_jobs: Vec<ComparisonJob>,
    #[serde(default)]
    pub jobs: Vec<LegacyJob>,
    #[serde(default)]
    pub runs: Vec<Run>,
    #[serde(default)]
    pub artifacts: Vec<RunArtifact>,
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

/// A job record in the version-1 shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyJob {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub source_url: Url,
    pub target_url: Url,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Convert one legacy job to the current shape.
fn convert(legacy: LegacyJob, now: DateTime<Utc>) -> ComparisonJob {
    ComparisonJob {
        id: legacy.id.clone(),
        name: legacy.name.unwrap_or_else(|| format!("Migrated job {}", legacy.id)),
        description: legacy.description,
        baseline_url: legacy.source_url,
        candidate_url: legacy.target_url,
        crawl_config: CrawlConfig::default(),
        page_map: Vec::new(),
        test_matrix: TestMatrix::default(),
        status: JobStatus::Pending,
        created_at: legacy.created_at.unwrap_or(now),
        updated_at: now,
        migrated_from: Some(legacy.id),
        schema_version: SNAPSHOT_VERSION,
    }
}

/// Fold legacy jobs into a snapshot, skipping any already represented
/// (same id, or a job carrying the legacy id as its back-pointer).
/// Returns how many were converted and stamps the metadata when the
/// count is non-zero.
pub fn merge_legacy(
    snapshot: &mut StorageSnapshot,
    jobs: Vec<LegacyJob>,
    legacy_version: Option<u32>,
) -> usize {
    let now = Utc::now();
    let mut migrated = 0usize;
    for legacy in jobs {
        let already = snapshot
            .comparison_jobs
            .iter()
            .any(|j| j.id == legacy.id || j.migrated_from.as_deref() == Some(legacy.id.as_str()));
        if already {
            continue;
        }
        snapshot.comparison_jobs.push(convert(legacy, now));
        migrated += 1;
    }

    if migrated > 0 {
        snapshot.metadata.last_migration = Some(now);
        snapshot.metadata.notes.push(format!(
            "migrated {migrated} legacy job(s) from snapshot version {}",
            legacy_version.unwrap_or(1)
        ));
    }
    migrated
}

/// Migrate a raw document to the current version. Returns the migrated
/// snapshot and how many legacy jobs were converted. Running this over
/// an already-current document is a no-op with count 0.
pub fn migrate(raw: RawSnapshot) -> (StorageSnapshot, usize) {
    let mut snapshot = StorageSnapshot {
        version: SNAPSHOT_VERSION,
        comparison_jobs: raw.comparison_jobs,
        runs: raw.runs,
        artifacts: raw.artifacts,
        metadata: raw.metadata,
    };
    let migrated = merge_legacy(&mut snapshot, raw.jobs, raw.version);
    (snapshot, migrated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_doc() -> &'static str {
        r#"{
            "jobs": [
                {"id": "j1", "sourceUrl": "https://a.test/", "targetUrl": "https://b.test/"}
            ]
        }"#
    }

    #[test]
    fn converts_source_target_to_baseline_candidate() {
        let raw: RawSnapshot = serde_json::from_str(legacy_doc()).unwrap();
        let (snap, count) = migrate(raw);
        assert_eq!(count, 1);
        assert_eq!(snap.version, SNAPSHOT_VERSION);

        let job = snap.job("j1").unwrap();
        assert_eq!(job.baseline_url.as_str(), "https://a.test/");
        assert_eq!(job.candidate_url.as_str(), "https://b.test/");
        assert_eq!(job.migrated_from.as_deref(), Some("j1"));
        assert_eq!(job.crawl_config, CrawlConfig::default());
        assert!(job.test_matrix.visual && job.test_matrix.seo);
        assert!(snap.metadata.last_migration.is_some());
    }

    #[test]
    fn migration_is_idempotent() {
        let raw: RawSnapshot = serde_json::from_str(legacy_doc()).unwrap();
        let (first, count) = migrate(raw);
        assert_eq!(count, 1);

        // Re-reading the same legacy document against the migrated
        // state must not duplicate the job.
        let mut raw_again: RawSnapshot = serde_json::from_str(legacy_doc()).unwrap();
        raw_again.comparison_jobs = first.comparison_jobs.clone();
        let (second, count_again) = migrate(raw_again);
        assert_eq!(count_again, 0);
        assert_eq!(second.comparison_jobs, first.comparison_jobs);
    }

    #[test]
    fn current_document_passes_through() {
        let raw = RawSnapshot {
            version: Some(SNAPSHOT_VERSION),
            ..RawSnapshot::default()
        };
        let (snap, count) = migrate(raw);
        assert_eq!(count, 0);
        assert!(snap.metadata.last_migration.is_none());
        assert!(snap.metadata.notes.is_empty());
    }
}
