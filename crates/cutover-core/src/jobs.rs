//! Comparison-job service: CRUD with cascade delete and legacy
//! migration, all flowing through the snapshot store.

use chrono::Utc;
use cutover_rest_api_contract::{
    ComparisonJob, CrawlConfig, CreateJobRequest, JobStatus, Run, RunArtifact, TestMatrix,
    UpdateJobRequest, SNAPSHOT_VERSION,
};
use cutover_store::SnapshotStore;
use std::sync::Arc;
use tracing::info;

use crate::error::{Error, Result};

/// Service wrapping job operations over the snapshot store.
#[derive(Clone)]
pub struct JobService {
    store: Arc<SnapshotStore>,
}

impl JobService {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store }
    }

    /// Validate and persist a new job with defaults filled in.
    pub async fn create(&self, request: CreateJobRequest) -> Result<ComparisonJob> {
        request.validate_request()?;
        let now = Utc::now();
        let job = ComparisonJob {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name,
            description: request.description,
            baseline_url: request.baseline_url,
            candidate_url: request.candidate_url,
            crawl_config: request.crawl_config.unwrap_or_default(),
            page_map: request.page_map,
            test_matrix: request.test_matrix.unwrap_or_default(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            migrated_from: None,
            schema_version: SNAPSHOT_VERSION,
        };

        let created = job.clone();
        self.store
            .mutate(move |snapshot| {
                snapshot.comparison_jobs.push(job);
                Ok::<_, Error>(())
            })
            .await?;
        info!(job_id = %created.id, "comparison job created");
        Ok(created)
    }

    /// Fetch one job.
    pub async fn get(&self, id: &str) -> Result<ComparisonJob> {
        self.store
            .snapshot()
            .await
            .job(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("job {id}")))
    }

    /// All jobs in insertion order.
    pub async fn list(&self) -> Vec<ComparisonJob> {
        self.store.snapshot().await.comparison_jobs
    }

    /// Partial update. Id and creation timestamp are immutable; the
    /// URL pair rule re-applies when either side is touched.
    pub async fn update(&self, id: &str, request: UpdateJobRequest) -> Result<ComparisonJob> {
        let id = id.to_string();
        self.store
            .mutate(move |snapshot| {
                let job = snapshot
                    .job_mut(&id)
                    .ok_or_else(|| Error::not_found(format!("job {id}")))?;
                request.validate_request(&job.baseline_url, &job.candidate_url)?;

                if let Some(name) = request.name {
                    job.name = name;
                }
                if let Some(description) = request.description {
                    job.description = Some(description);
                }
                if let Some(url) = request.baseline_url {
                    job.baseline_url = url;
                }
                if let Some(url) = request.candidate_url {
                    job.candidate_url = url;
                }
                if let Some(config) = request.crawl_config {
                    job.crawl_config = config;
                }
                if let Some(page_map) = request.page_map {
                    job.page_map = page_map;
                }
                if let Some(matrix) = request.test_matrix {
                    job.test_matrix = matrix;
                }
                if let Some(status) = request.status {
                    job.status = status;
                }
                job.updated_at = Utc::now();
                Ok(job.clone())
            })
            .await
    }

    /// Delete a job, its runs, their registry rows, and (best-effort)
    /// their artifact directories.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let id_owned = id.to_string();
        let removed_runs = self
            .store
            .mutate(move |snapshot| {
                snapshot
                    .remove_job_cascade(&id_owned)
                    .ok_or_else(|| Error::not_found(format!("job {id_owned}")))
            })
            .await?;
        self.store.sweep_run_dirs(&removed_runs);
        info!(job_id = %id, runs = removed_runs.len(), "comparison job deleted");
        Ok(())
    }

    /// Idempotent legacy migration; returns how many jobs were
    /// converted.
    pub async fn migrate_legacy(&self) -> Result<usize> {
        Ok(self.store.migrate_pending().await?)
    }

    /// All runs in insertion order.
    pub async fn list_runs(&self) -> Vec<Run> {
        self.store.snapshot().await.runs
    }

    /// Fetch one run.
    pub async fn get_run(&self, id: &str) -> Result<Run> {
        self.store
            .snapshot()
            .await
            .run(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("run {id}")))
    }

    /// Runs belonging to one job.
    pub async fn runs_for_job(&self, job_id: &str) -> Result<Vec<Run>> {
        let snapshot = self.store.snapshot().await;
        if snapshot.job(job_id).is_none() {
            return Err(Error::not_found(format!("job {job_id}")));
        }
        Ok(snapshot.runs_for_job(job_id).into_iter().cloned().collect())
    }

    /// Registry rows for one run, empty when the run is unknown.
    pub async fn artifacts_for_run(&self, run_id: &str) -> Vec<RunArtifact> {
        self.store
            .snapshot()
            .await
            .artifacts_for_run(run_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Defaults used when a create request omits sections. Exposed so
    /// the boundary can document them.
    pub fn default_config() -> (CrawlConfig, TestMatrix) {
        (CrawlConfig::default(), TestMatrix::default())
    }
}
