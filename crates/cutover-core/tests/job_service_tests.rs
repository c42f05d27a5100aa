//! Job service tests: creation defaults, validation, partial updates
//! and the delete cascade.

use chrono::Utc;
use cutover_core::JobService;
use cutover_rest_api_contract::{
    ArtifactKind, CreateJobRequest, JobStatus, Run, RunStatus, UpdateJobRequest,
};
use cutover_store::{NewArtifact, SnapshotStore};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;

fn service() -> (TempDir, Arc<SnapshotStore>, JobService) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SnapshotStore::open(dir.path()).unwrap());
    let service = JobService::new(Arc::clone(&store));
    (dir, store, service)
}

fn request(name: &str, baseline: &str, candidate: &str) -> CreateJobRequest {
    CreateJobRequest {
        name: name.into(),
        description: None,
        baseline_url: Url::parse(baseline).unwrap(),
        candidate_url: Url::parse(candidate).unwrap(),
        crawl_config: None,
        page_map: Vec::new(),
        test_matrix: None,
    }
}

#[tokio::test]
async fn create_fills_defaults() {
    let (_dir, _store, service) = service();
    let job = service
        .create(request("A", "https://a.test", "https://b.test"))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.crawl_config.max_depth, 1);
    assert_eq!(job.crawl_config.max_pages, 10);
    assert!(!job.crawl_config.follow_external_links);
    assert!(job.test_matrix.visual && job.test_matrix.functional);
    assert!(job.test_matrix.data && job.test_matrix.seo);
    assert!(job.migrated_from.is_none());

    let fetched = service.get(&job.id).await.unwrap();
    assert_eq!(fetched, job);
}

#[tokio::test]
async fn create_rejects_equal_urls_without_persisting() {
    let (_dir, _store, service) = service();
    let err = service
        .create(request("X", "https://a.test", "https://a.test"))
        .await
        .unwrap_err();
    assert!(matches!(err, cutover_core::Error::InvalidInput { .. }));
    assert!(service.list().await.is_empty());
}

#[tokio::test]
async fn update_is_partial_and_revalidates_urls() {
    let (_dir, _store, service) = service();
    let job = service
        .create(request("A", "https://a.test", "https://b.test"))
        .await
        .unwrap();

    let updated = service
        .update(
            &job.id,
            UpdateJobRequest {
                name: Some("renamed".into()),
                ..UpdateJobRequest::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.id, job.id);
    assert_eq!(updated.created_at, job.created_at);
    assert_eq!(updated.baseline_url, job.baseline_url);

    // Touching one URL re-applies the pair rule against the other.
    let err = service
        .update(
            &job.id,
            UpdateJobRequest {
                candidate_url: Some(Url::parse("https://a.test").unwrap()),
                ..UpdateJobRequest::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, cutover_core::Error::InvalidInput { .. }));

    let err = service
        .update("missing", UpdateJobRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, cutover_core::Error::NotFound { .. }));
}

#[tokio::test]
async fn delete_cascades_runs_artifacts_and_directories() {
    let (_dir, store, service) = service();
    let job = service
        .create(request("A", "https://a.test", "https://b.test"))
        .await
        .unwrap();

    // Two runs with registered artifacts, created the way the
    // orchestrator would.
    let job_id = job.id.clone();
    store
        .mutate(move |snapshot| {
            for run_id in ["r1", "r2"] {
                snapshot.runs.push(Run {
                    id: run_id.into(),
                    job_id: job_id.clone(),
                    status: RunStatus::Completed,
                    triggered_by: "api".into(),
                    triggered_at: Utc::now(),
                    completed_at: Some(Utc::now()),
                });
            }
            Ok::<_, cutover_store::Error>(())
        })
        .await
        .unwrap();
    for run_id in ["r1", "r2"] {
        let run_dir = store.run_dir(run_id);
        fs::create_dir_all(&run_dir).unwrap();
        fs::write(run_dir.join("stage.log"), b"log").unwrap();
        store
            .register_artifact(
                run_id,
                NewArtifact::new(ArtifactKind::Log, "Stage log", format!("{run_id}/stage.log")),
            )
            .await
            .unwrap();
    }

    service.delete(&job.id).await.unwrap();

    let snapshot = store.snapshot().await;
    snapshot.check_integrity().unwrap();
    assert!(snapshot.comparison_jobs.is_empty());
    assert!(snapshot.runs.is_empty());
    assert!(snapshot.artifacts.is_empty());
    assert!(!store.run_dir("r1").exists());
    assert!(!store.run_dir("r2").exists());

    let err = service.get(&job.id).await.unwrap_err();
    assert!(matches!(err, cutover_core::Error::NotFound { .. }));
    assert!(service.artifacts_for_run("r1").await.is_empty());
}

#[tokio::test]
async fn runs_for_job_requires_the_job() {
    let (_dir, _store, service) = service();
    let err = service.runs_for_job("ghost").await.unwrap_err();
    assert!(matches!(err, cutover_core::Error::NotFound { .. }));
}

#[tokio::test]
async fn migrate_legacy_is_idempotent_over_the_service() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("snapshot.json"),
        r#"{"jobs":[{"id":"j1","sourceUrl":"https://a.test/","targetUrl":"https://b.test/"}]}"#,
    )
    .unwrap();
    let store = Arc::new(SnapshotStore::open(dir.path()).unwrap());
    let service = JobService::new(Arc::clone(&store));

    // Load already migrated; the endpoint finds nothing left.
    assert_eq!(service.migrate_legacy().await.unwrap(), 0);
    let job = service.get("j1").await.unwrap();
    assert_eq!(job.migrated_from.as_deref(), Some("j1"));
    assert_eq!(job.baseline_url.as_str(), "https://a.test/");
}
