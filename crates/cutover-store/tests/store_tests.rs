//! Persistence tests: atomic saves, load/migrate behavior, and the
//! artifact registry contract.

use chrono::Utc;
use cutover_rest_api_contract::{
    ArtifactKind, ComparisonJob, CrawlConfig, JobStatus, Run, RunStatus, TestMatrix,
    SNAPSHOT_VERSION,
};
use cutover_store::{NewArtifact, SnapshotStore};
use std::fs;
use tempfile::TempDir;
use url::Url;

fn sample_job(id: &str) -> ComparisonJob {
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

fn sample_run(id: &str, job_id: &str) -> Run {
    Run {
        id: id.into(),
        job_id: job_id.into(),
        status: RunStatus::Queued,
        triggered_by: "test".into(),
        triggered_at: Utc::now(),
        completed_at: None,
    }
}

#[tokio::test]
async fn open_initializes_empty_snapshot() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::open(dir.path()).unwrap();

    let snap = store.snapshot().await;
    assert_eq!(snap.version, SNAPSHOT_VERSION);
    assert!(snap.comparison_jobs.is_empty());
    assert!(dir.path().join("snapshot.json").is_file());
    assert!(store.artifact_root().is_dir());
}

#[tokio::test]
async fn mutations_survive_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = SnapshotStore::open(dir.path()).unwrap();
        store
            .mutate(|snap| {
                snap.comparison_jobs.push(sample_job("j1"));
                Ok::<_, cutover_store::Error>(())
            })
            .await
            .unwrap();
    }

    let store = SnapshotStore::open(dir.path()).unwrap();
    let snap = store.snapshot().await;
    assert_eq!(snap.comparison_jobs.len(), 1);
    assert_eq!(snap.comparison_jobs[0].id, "j1");
}

#[tokio::test]
async fn failed_mutation_leaves_state_untouched() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::open(dir.path()).unwrap();

    let result: Result<(), cutover_store::Error> = store
        .mutate(|snap| {
            snap.comparison_jobs.push(sample_job("doomed"));
            Err(cutover_store::Error::artifact("intentional"))
        })
        .await;
    assert!(result.is_err());
    assert!(store.snapshot().await.comparison_jobs.is_empty());

    // Disk agrees with memory.
    let reopened = SnapshotStore::open(dir.path()).unwrap();
    assert!(reopened.snapshot().await.comparison_jobs.is_empty());
}

#[tokio::test]
async fn leftover_temp_file_is_ignored_on_load() {
    let dir = TempDir::new().unwrap();
    {
        let store = SnapshotStore::open(dir.path()).unwrap();
        store
            .mutate(|snap| {
                snap.comparison_jobs.push(sample_job("j1"));
                Ok::<_, cutover_store::Error>(())
            })
            .await
            .unwrap();
    }
    // Simulate a crash between temp write and rename.
    fs::write(dir.path().join("snapshot.json.tmp"), b"{ truncated").unwrap();

    let store = SnapshotStore::open(dir.path()).unwrap();
    assert_eq!(store.snapshot().await.comparison_jobs.len(), 1);
}

#[tokio::test]
async fn corrupt_snapshot_refuses_to_open() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("snapshot.json"), b"not json at all").unwrap();

    match SnapshotStore::open(dir.path()) {
        Err(cutover_store::Error::Corruption { .. }) => {}
        other => panic!("expected corruption error, got {other:?}"),
    }
}

#[tokio::test]
async fn legacy_snapshot_migrates_on_first_load_only() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("snapshot.json"),
        r#"{"jobs":[{"id":"j1","sourceUrl":"https://a.test/","targetUrl":"https://b.test/"}]}"#,
    )
    .unwrap();

    let store = SnapshotStore::open(dir.path()).unwrap();
    let snap = store.snapshot().await;
    let job = snap.job("j1").expect("migrated job present");
    assert_eq!(job.baseline_url.as_str(), "https://a.test/");
    assert_eq!(job.candidate_url.as_str(), "https://b.test/");
    assert_eq!(job.migrated_from.as_deref(), Some("j1"));
    assert!(snap.metadata.last_migration.is_some());

    // The persisted document is already current, so both a reload and
    // the on-demand migration are no-ops.
    drop(store);
    let store = SnapshotStore::open(dir.path()).unwrap();
    assert_eq!(store.snapshot().await.comparison_jobs.len(), 1);
    assert_eq!(store.migrate_pending().await.unwrap(), 0);

    let text = fs::read_to_string(dir.path().join("snapshot.json")).unwrap();
    assert!(text.contains("comparisonJobs"));
    assert!(!text.contains("sourceUrl"));
}

#[tokio::test]
async fn register_requires_backing_file_inside_run_dir() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::open(dir.path()).unwrap();
    store
        .mutate(|snap| {
            snap.comparison_jobs.push(sample_job("j1"));
            snap.runs.push(sample_run("r1", "j1"));
            Ok::<_, cutover_store::Error>(())
        })
        .await
        .unwrap();

    // Missing file is rejected.
    let missing = store
        .register_artifact("r1", NewArtifact::new(ArtifactKind::Log, "log", "r1/x.log"))
        .await;
    assert!(missing.is_err());

    // A path outside the run directory is rejected even if it exists.
    let foreign_dir = store.artifact_root().join("r2");
    fs::create_dir_all(&foreign_dir).unwrap();
    fs::write(foreign_dir.join("x.log"), b"x").unwrap();
    let outside = store
        .register_artifact("r1", NewArtifact::new(ArtifactKind::Log, "log", "r2/x.log"))
        .await;
    assert!(outside.is_err());

    // A real file inside the run directory registers.
    let run_dir = store.run_dir("r1");
    fs::create_dir_all(&run_dir).unwrap();
    fs::write(run_dir.join("stage.log"), b"ok").unwrap();
    let row = store
        .register_artifact("r1", NewArtifact::new(ArtifactKind::Log, "Stage log", "r1/stage.log"))
        .await
        .unwrap();
    assert_eq!(row.run_id, "r1");
    assert_eq!(row.path, "r1/stage.log");

    let snap = store.snapshot().await;
    assert_eq!(snap.artifacts_for_run("r1").len(), 1);
    snap.check_integrity().unwrap();
}

#[tokio::test]
async fn sweep_removes_run_directories() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::open(dir.path()).unwrap();
    let run_dir = store.run_dir("r1");
    fs::create_dir_all(run_dir.join("baseline")).unwrap();
    fs::write(run_dir.join("baseline/page.html"), b"<html/>").unwrap();

    store.sweep_run_dirs(&["r1".to_string(), "never-existed".to_string()]);
    assert!(!run_dir.exists());
}
