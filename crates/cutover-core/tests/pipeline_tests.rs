//! End-to-end pipeline tests over the scripted browser driver and the
//! deterministic reasoner.

use cutover_browser::{PageScript, ScriptedBrowserDriver};
use cutover_core::{JobService, OrchestratorConfig, RuleBasedReasoner, RunOrchestrator};
use cutover_rest_api_contract::{
    CreateJobRequest, PageMapEntry, RunStatus, TestMatrix,
};
use cutover_store::SnapshotStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

const HOME: &str = r#"<html><head><title>Home</title>
    <meta name="description" content="Welcome"></head>
    <body><h1>Welcome</h1><p>We sell things.</p>
    <a href="/pricing">Pricing</a></body></html>"#;

const PRICING: &str = r#"<html><head><title>Pricing</title></head>
    <body><h1>Plans</h1><p>Starter plan.</p>
    <span class="price">$19.99</span>
    <table><tr><th>Plan</th><th>Price</th></tr>
    <tr><td>Starter</td><td>$19.99</td></tr></table>
    </body></html>"#;

fn identical_sites() -> ScriptedBrowserDriver {
    ScriptedBrowserDriver::builder()
        .page("https://a.test/", PageScript::ok(HOME))
        .page("https://a.test/pricing", PageScript::ok(PRICING))
        .page("https://b.test/", PageScript::ok(HOME))
        .page("https://b.test/pricing", PageScript::ok(PRICING))
        .build()
}

struct Harness {
    _dir: TempDir,
    store: Arc<SnapshotStore>,
    jobs: JobService,
    orchestrator: RunOrchestrator,
    driver: ScriptedBrowserDriver,
}

fn harness(driver: ScriptedBrowserDriver) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SnapshotStore::open(dir.path()).unwrap());
    let orchestrator = RunOrchestrator::new(
        Arc::clone(&store),
        Arc::new(driver.clone()),
        Arc::new(RuleBasedReasoner),
        OrchestratorConfig::default(),
    );
    orchestrator.start();
    Harness {
        _dir: dir,
        jobs: JobService::new(Arc::clone(&store)),
        store,
        orchestrator,
        driver,
    }
}

fn create_request(name: &str) -> CreateJobRequest {
    CreateJobRequest {
        name: name.into(),
        description: None,
        baseline_url: Url::parse("https://a.test").unwrap(),
        candidate_url: Url::parse("https://b.test").unwrap(),
        crawl_config: None,
        page_map: Vec::new(),
        test_matrix: None,
    }
}

async fn wait_terminal(store: &SnapshotStore, run_id: &str) -> RunStatus {
    for _ in 0..400 {
        let snapshot = store.snapshot().await;
        let run = snapshot.run(run_id).expect("run exists");
        if run.status.is_terminal() {
            return run.status;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("run {run_id} did not reach a terminal state");
}

async fn read_report(store: &SnapshotStore, run_id: &str) -> serde_json::Value {
    let path = store.artifact_root().join(run_id).join("reports/report.json");
    let bytes = std::fs::read(&path).unwrap_or_else(|e| panic!("no report at {path:?}: {e}"));
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn zero_diff_run_completes_with_go() {
    let h = harness(identical_sites());
    let job = h.jobs.create(create_request("zero diff")).await.unwrap();
    let run = h.orchestrator.enqueue(&job.id, None).await.unwrap();
    assert_eq!(run.status, RunStatus::Queued);

    let status = wait_terminal(&h.store, &run.id).await;
    assert_eq!(status, RunStatus::Completed);

    let report = read_report(&h.store, &run.id).await;
    assert_eq!(report["risk"]["overall"], 0.0);
    assert_eq!(report["executive"]["decision"], "go");
    assert_eq!(report["stageSummaries"]["visual"]["pagesWithDiffs"], 0);
    assert_eq!(report["stageSummaries"]["functional"]["candidate"]["totalBrokenLinks"], 0);
    assert_eq!(report["stageSummaries"]["functional"]["candidate"]["totalJsErrors"], 0);
    assert_eq!(report["stageSummaries"]["data"]["pagesWithMismatches"], 0);
    assert_eq!(report["stageSummaries"]["pagesTested"], 2);

    // Evidence committed and internally consistent.
    let snapshot = h.store.snapshot().await;
    snapshot.check_integrity().unwrap();
    let artifacts = snapshot.artifacts_for_run(&run.id);
    assert!(artifacts.iter().any(|a| a.path.ends_with("matched-pages.json")));
    assert!(artifacts.iter().any(|a| a.path.contains("baseline/pricing/desktop.png")));
    assert!(artifacts.iter().any(|a| a.path.ends_with("reports/report.md")));
    for artifact in &artifacts {
        assert!(h.store.artifact_root().join(&artifact.path).is_file(), "{}", artifact.path);
    }

    // Browser contexts were closed at terminal state.
    assert_eq!(h.driver.open_context_count(), 0);
}

#[tokio::test]
async fn explicit_page_map_dominates_path_matching() {
    let plain_home = "<html><head><title>Start</title></head><body><p>start</p></body></html>";
    let driver = ScriptedBrowserDriver::builder()
        .page("https://a.test/", PageScript::ok(plain_home))
        .page(
            "https://a.test/p1",
            PageScript::ok("<html><head><title>P</title></head><body><p>old</p></body></html>"),
        )
        .page("https://b.test/", PageScript::ok(plain_home))
        .page(
            "https://b.test/p1",
            PageScript::ok("<html><head><title>P</title></head><body><p>decoy</p></body></html>"),
        )
        .page(
            "https://b.test/q1",
            PageScript::ok("<html><head><title>Q</title></head><body><p>new</p></body></html>"),
        )
        .build();
    let h = harness(driver);

    let mut request = create_request("page map");
    request.page_map = vec![PageMapEntry {
        baseline_path: "/p1".into(),
        candidate_path: "/q1".into(),
        notes: None,
    }];
    let job = h.jobs.create(request).await.unwrap();
    let run = h.orchestrator.enqueue(&job.id, None).await.unwrap();
    wait_terminal(&h.store, &run.id).await;

    let path = h.store.artifact_root().join(&run.id).join("matched-pages.json");
    let matched: serde_json::Value =
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    let matched = matched.as_array().unwrap();

    // The explicit pair wins even though /p1 exists on the candidate
    // side and would otherwise match by path.
    let explicit = &matched[0];
    assert_eq!(explicit["reason"], "explicit");
    assert_eq!(explicit["confidence"], 1.0);
    assert_eq!(explicit["baseline"]["path"], "/p1");
    assert_eq!(explicit["candidate"]["path"], "/q1");
}

#[tokio::test]
async fn unreachable_candidate_fails_at_capture_with_partial_evidence() {
    let driver = ScriptedBrowserDriver::builder()
        .page("https://a.test/", PageScript::ok(HOME))
        .page("https://a.test/pricing", PageScript::ok(PRICING))
        .build();
    let h = harness(driver);

    let job = h.jobs.create(create_request("dead candidate")).await.unwrap();
    let run = h.orchestrator.enqueue(&job.id, None).await.unwrap();
    let status = wait_terminal(&h.store, &run.id).await;
    assert_eq!(status, RunStatus::Failed);

    let snapshot = h.store.snapshot().await;
    let artifacts = snapshot.artifacts_for_run(&run.id);

    // The capture error log is present, baseline partials survive,
    // and no diff-stage artifacts exist.
    assert!(artifacts.iter().any(|a| a.label == "Capture Error"));
    assert!(artifacts.iter().any(|a| a.path.contains("baseline/")));
    assert!(!artifacts.iter().any(|a| a.path.contains("visual-results")));
    assert!(!artifacts.iter().any(|a| a.path.contains("functional-results")));
    assert!(!artifacts.iter().any(|a| a.path.contains("reports/")));
    assert_eq!(h.driver.open_context_count(), 0);
}

#[tokio::test]
async fn test_matrix_gates_middle_stages() {
    let h = harness(identical_sites());
    let mut request = create_request("functional only");
    request.test_matrix = Some(TestMatrix {
        visual: false,
        functional: true,
        data: false,
        seo: false,
    });
    let job = h.jobs.create(request).await.unwrap();
    let run = h.orchestrator.enqueue(&job.id, None).await.unwrap();
    let status = wait_terminal(&h.store, &run.id).await;
    assert_eq!(status, RunStatus::Completed);

    let snapshot = h.store.snapshot().await;
    let artifacts = snapshot.artifacts_for_run(&run.id);
    assert!(!artifacts.iter().any(|a| a.path.contains("visual-results")));
    assert!(!artifacts.iter().any(|a| a.path.contains("data-results")));
    assert!(artifacts.iter().any(|a| a.path.ends_with("functional-results.json")));

    // Disabled slots surface as unavailable in the analysis.
    let report = read_report(&h.store, &run.id).await;
    assert!(report["stageSummaries"].get("visual").is_none());
    let categories = report["analysis"]["categories"].as_array().unwrap();
    let visual = categories.iter().find(|c| c["category"] == "visual").unwrap();
    assert!(visual["explanation"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn candidate_regressions_show_up_in_the_report() {
    let broken = r#"<html><head><title>Pricing</title></head>
        <body><h1>Plans</h1><p>Starter plan.</p>
        <span class="price">$24.99</span>
        <table><tr><th>Plan</th><th>Price</th></tr>
        <tr><td>Starter</td><td>$24.99</td></tr></table>
        <a href="/gone">More</a>
        </body></html>"#;
    let driver = ScriptedBrowserDriver::builder()
        .page("https://a.test/", PageScript::ok(HOME))
        .page("https://a.test/pricing", PageScript::ok(PRICING))
        .page("https://b.test/", PageScript::ok(HOME))
        .page(
            "https://b.test/pricing",
            PageScript::ok(broken).with_js_error("TypeError: prices is undefined"),
        )
        .page("https://b.test/gone", PageScript::ok("gone").with_status(404))
        .build();
    let h = harness(driver);
    let job = h.jobs.create(create_request("regressions")).await.unwrap();
    let run = h.orchestrator.enqueue(&job.id, None).await.unwrap();
    let status = wait_terminal(&h.store, &run.id).await;
    assert_eq!(status, RunStatus::Completed);

    let report = read_report(&h.store, &run.id).await;
    // Pricing drift counts as a critical data mismatch.
    assert!(report["stageSummaries"]["data"]["criticalMismatches"].as_u64().unwrap() >= 1);
    assert_eq!(
        report["stageSummaries"]["functional"]["candidate"]["totalJsErrors"].as_u64().unwrap(),
        1
    );
    assert!(report["risk"]["overall"].as_f64().unwrap() > 0.0);
    assert_ne!(report["executive"]["decision"], "go");
}

#[tokio::test]
async fn queued_runs_can_be_cancelled_and_terminal_runs_conflict() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SnapshotStore::open(dir.path()).unwrap());
    let orchestrator = RunOrchestrator::new(
        Arc::clone(&store),
        Arc::new(identical_sites()),
        Arc::new(RuleBasedReasoner),
        OrchestratorConfig::default(),
    );
    // Dispatcher deliberately not started: the run stays queued.
    let jobs = JobService::new(Arc::clone(&store));
    let job = jobs.create(create_request("cancel me")).await.unwrap();
    let run = orchestrator.enqueue(&job.id, None).await.unwrap();

    let cancelled = orchestrator.cancel(&run.id).await.unwrap();
    assert_eq!(cancelled.status, RunStatus::Failed);
    assert!(cancelled.completed_at.is_some());

    let err = orchestrator.cancel(&run.id).await.unwrap_err();
    assert!(matches!(err, cutover_core::Error::Conflict { .. }));
}

#[tokio::test]
async fn restart_recovery_fails_interrupted_runs() {
    use chrono::Utc;
    use cutover_rest_api_contract::Run;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(SnapshotStore::open(dir.path()).unwrap());
    let jobs = JobService::new(Arc::clone(&store));
    let job = jobs.create(create_request("interrupted")).await.unwrap();

    // A run left `running` by a crashed process.
    let job_id = job.id.clone();
    store
        .mutate(move |snapshot| {
            snapshot.runs.push(Run {
                id: "stuck-run".into(),
                job_id,
                status: RunStatus::Running,
                triggered_by: "api".into(),
                triggered_at: Utc::now(),
                completed_at: None,
            });
            Ok::<_, cutover_store::Error>(())
        })
        .await
        .unwrap();

    let orchestrator = RunOrchestrator::new(
        Arc::clone(&store),
        Arc::new(identical_sites()),
        Arc::new(RuleBasedReasoner),
        OrchestratorConfig::default(),
    );
    let aborted = orchestrator.recover().await.unwrap();
    assert_eq!(aborted, 1);

    let snapshot = store.snapshot().await;
    snapshot.check_integrity().unwrap();
    let run = snapshot.run("stuck-run").unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.completed_at.is_some());
    let artifacts = snapshot.artifacts_for_run("stuck-run");
    assert!(artifacts.iter().any(|a| a.label == "aborted-on-restart"));

    // Recovery is idempotent.
    assert_eq!(orchestrator.recover().await.unwrap(), 0);
}
