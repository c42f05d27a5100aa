//! The durable top-level aggregate.

use chrono::{DateTime, Utc};
use cutover_rest_api_contract::{ComparisonJob, Run, RunArtifact, SNAPSHOT_VERSION};
use serde::{Deserialize, Serialize};

/// Snapshot metadata: migration bookkeeping and free-form notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_migration: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub notes: Vec<String>,
}

/// The complete persisted state of the control plane. Jobs, runs and
/// artifact rows preserve insertion order; lookups are by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSnapshot {
    pub version: u32,
    pub comparison_jobs: Vec<ComparisonJob>,
    pub runs: Vec<Run>,
    pub artifacts: Vec<RunArtifact>,
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

impl Default for StorageSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            comparison_jobs: Vec::new(),
            runs: Vec::new(),
            artifacts: Vec::new(),
            metadata: SnapshotMetadata::default(),
        }
    }
}

impl StorageSnapshot {
    /// Look up a job by id.
    pub fn job(&self, id: &str) -> Option<&ComparisonJob> {
        self.comparison_jobs.iter().find(|j| j.id == id)
    }

    /// Look up a job by id, mutably.
    pub fn job_mut(&mut self, id: &str) -> Option<&mut ComparisonJob> {
        self.comparison_jobs.iter_mut().find(|j| j.id == id)
    }

    /// Look up a run by id.
    pub fn run(&self, id: &str) -> Option<&Run> {
        self.runs.iter().find(|r| r.id == id)
    }

    /// Look up a run by id, mutably.
    pub fn run_mut(&mut self, id: &str) -> Option<&mut Run> {
        self.runs.iter_mut().find(|r| r.id == id)
    }

    /// All runs belonging to a job, in insertion order.
    pub fn runs_for_job(&self, job_id: &str) -> Vec<&Run> {
        self.runs.iter().filter(|r| r.job_id == job_id).collect()
    }

    /// All artifact rows belonging to a run, in insertion order.
    pub fn artifacts_for_run(&self, run_id: &str) -> Vec<&RunArtifact> {
        self.artifacts.iter().filter(|a| a.run_id == run_id).collect()
    }

    /// Remove a job together with its runs and their artifact rows.
    /// Returns the ids of the removed runs so the caller can sweep
    /// their artifact directories.
    pub fn remove_job_cascade(&mut self, job_id: &str) -> Option<Vec<String>> {
        let idx = self.comparison_jobs.iter().position(|j| j.id == job_id)?;
        self.comparison_jobs.remove(idx);

        let removed_runs: Vec<String> = self
            .runs
            .iter()
            .filter(|r| r.job_id == job_id)
            .map(|r| r.id.clone())
            .collect();
        self.runs.retain(|r| r.job_id != job_id);
        self.artifacts.retain(|a| !removed_runs.contains(&a.run_id));
        Some(removed_runs)
    }

    /// Check the referential invariants the snapshot promises at
    /// steady state. Used by tests and the startup path.
    pub fn check_integrity(&self) -> Result<(), String> {
        for run in &self.runs {
            if self.job(&run.job_id).is_none() {
                return Err(format!("run {} references missing job {}", run.id, run.job_id));
            }
            if run.status.is_terminal() != run.completed_at.is_some() {
                return Err(format!(
                    "run {} has status {:?} but completedAt {:?}",
                    run.id, run.status, run.completed_at
                ));
            }
        }
        for artifact in &self.artifacts {
            if self.run(&artifact.run_id).is_none() {
                return Err(format!(
                    "artifact {} references missing run {}",
                    artifact.id, artifact.run_id
                ));
            }
            if !artifact.path.starts_with(&format!("{}/", artifact.run_id)) {
                return Err(format!(
                    "artifact {} path {:?} escapes its run directory",
                    artifact.id, artifact.path
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutover_rest_api_contract::{
        ArtifactKind, CrawlConfig, JobStatus, RunStatus, TestMatrix,
    };
    use url::Url;

    fn job(id: &str) -> ComparisonJob {
        let now = Utc::now();
        ComparisonJob {
            id: id.into(),
            name: format!("job {id}"),
            description: None,
            baseline_url: Url::parse("https://a.test").unwrap(),
            candidate_url: Url::parse("https://b.test").unwrap(),
            crawl_config: CrawlConfig::default(),
            page_map: Vec::new(),
            test_matrix: TestMatrix::default(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            migrated_from: None,
            schema_version: SNAPSHOT_VERSION,
        }
    }

    fn run(id: &str, job_id: &str) -> Run {
        Run {
            id: id.into(),
            job_id: job_id.into(),
            status: RunStatus::Queued,
            triggered_by: "test".into(),
            triggered_at: Utc::now(),
            completed_at: None,
        }
    }

    fn artifact(id: &str, run_id: &str) -> RunArtifact {
        RunArtifact {
            id: id.into(),
            run_id: run_id.into(),
            kind: ArtifactKind::Log,
            label: "log".into(),
            path: format!("{run_id}/stage.log"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn cascade_removes_runs_and_artifacts() {
        let mut snap = StorageSnapshot::default();
        snap.comparison_jobs.push(job("j1"));
        snap.comparison_jobs.push(job("j2"));
        snap.runs.push(run("r1", "j1"));
        snap.runs.push(run("r2", "j1"));
        snap.runs.push(run("r3", "j2"));
        snap.artifacts.push(artifact("a1", "r1"));
        snap.artifacts.push(artifact("a2", "r3"));

        let removed = snap.remove_job_cascade("j1").unwrap();
        assert_eq!(removed, vec!["r1".to_string(), "r2".to_string()]);
        assert!(snap.job("j1").is_none());
        assert!(snap.run("r1").is_none());
        assert!(snap.artifacts_for_run("r1").is_empty());
        assert_eq!(snap.artifacts_for_run("r3").len(), 1);
        snap.check_integrity().unwrap();
    }

    #[test]
    fn cascade_on_unknown_job_is_none() {
        let mut snap = StorageSnapshot::default();
        assert!(snap.remove_job_cascade("missing").is_none());
    }

    #[test]
    fn integrity_rejects_dangling_run() {
        let mut snap = StorageSnapshot::default();
        snap.runs.push(run("r1", "ghost"));
        assert!(snap.check_integrity().is_err());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let mut snap = StorageSnapshot::default();
        snap.comparison_jobs.push(job("j1"));
        let json = serde_json::to_value(&snap).unwrap();
        assert!(json.get("comparisonJobs").is_some());
        assert!(json.get("version").is_some());
        let roundtrip: StorageSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(roundtrip, snap);
    }
}
