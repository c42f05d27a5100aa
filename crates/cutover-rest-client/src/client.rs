//! Main REST API client implementation.

use cutover_rest_api_contract::*;
use reqwest::{Client as HttpClient, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::error::{RestClientError, RestClientResult};

/// REST API client for the cutover service.
#[derive(Debug, Clone)]
pub struct RestClient {
    http_client: HttpClient,
    base_url: Url,
}

impl RestClient {
    /// Create a new REST client.
    pub fn new(base_url: Url) -> Self {
        let http_client = HttpClient::builder()
            .user_agent("cutover-client/0.1")
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http_client,
            base_url,
        }
    }

    /// Create a client from a base URL string.
    pub fn from_url(base_url: &str) -> RestClientResult<Self> {
        Ok(Self::new(Url::parse(base_url)?))
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Liveness check.
    pub async fn health(&self) -> RestClientResult<HealthResponse> {
        self.get("/health").await
    }

    /// Create a comparison job.
    pub async fn create_job(&self, request: &CreateJobRequest) -> RestClientResult<ComparisonJob> {
        self.post("/api/jobs", request).await
    }

    /// List all jobs.
    pub async fn list_jobs(&self) -> RestClientResult<Vec<ComparisonJob>> {
        self.get("/api/jobs").await
    }

    /// Get one job.
    pub async fn get_job(&self, job_id: &str) -> RestClientResult<ComparisonJob> {
        self.get(&format!("/api/jobs/{job_id}")).await
    }

    /// Partially update a job.
    pub async fn update_job(
        &self,
        job_id: &str,
        request: &UpdateJobRequest,
    ) -> RestClientResult<ComparisonJob> {
        self.put(&format!("/api/jobs/{job_id}"), request).await
    }

    /// Delete a job and everything it owns.
    pub async fn delete_job(&self, job_id: &str) -> RestClientResult<()> {
        let url = self.base_url.join(&format!("/api/jobs/{job_id}"))?;
        let response = self.http_client.delete(url).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Enqueue a run for a job.
    pub async fn enqueue_run(
        &self,
        job_id: &str,
        request: &EnqueueRunRequest,
    ) -> RestClientResult<Run> {
        self.post(&format!("/api/jobs/{job_id}/run"), request).await
    }

    /// Runs belonging to one job.
    pub async fn runs_for_job(&self, job_id: &str) -> RestClientResult<Vec<Run>> {
        self.get(&format!("/api/jobs/{job_id}/runs")).await
    }

    /// Migrate legacy jobs; returns the converted count.
    pub async fn migrate_legacy(&self) -> RestClientResult<MigrateResponse> {
        self.post_empty("/api/jobs/migrate").await
    }

    /// List all runs.
    pub async fn list_runs(&self) -> RestClientResult<Vec<Run>> {
        self.get("/api/runs").await
    }

    /// Get one run.
    pub async fn get_run(&self, run_id: &str) -> RestClientResult<Run> {
        self.get(&format!("/api/runs/{run_id}")).await
    }

    /// Artifact registry rows for one run.
    pub async fn run_artifacts(&self, run_id: &str) -> RestClientResult<Vec<RunArtifact>> {
        self.get(&format!("/api/runs/{run_id}/artifacts")).await
    }

    /// Cancel a queued or running run.
    pub async fn cancel_run(&self, run_id: &str) -> RestClientResult<Run> {
        self.post_empty(&format!("/api/runs/{run_id}/cancel")).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> RestClientResult<T> {
        let url = self.base_url.join(path)?;
        let response = self.http_client.get(url).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> RestClientResult<T> {
        let url = self.base_url.join(path)?;
        let response = self.http_client.post(url).json(body).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> RestClientResult<T> {
        let url = self.base_url.join(path)?;
        let response = self.http_client.post(url).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> RestClientResult<T> {
        let url = self.base_url.join(path)?;
        let response = self.http_client.put(url).json(body).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Convert non-2xx responses into typed API errors carrying the
    /// service's `message` field when present.
    async fn check(response: Response) -> RestClientResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.message,
            Err(_) => "<no message>".to_string(),
        };
        Err(RestClientError::api(status, message))
    }
}
