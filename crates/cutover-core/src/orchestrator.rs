//! Pipeline orchestrator and run state machine.
//!
//! Owns the run lifecycle: `queued → running → completed | failed`,
//! with transitions persisted before the side effects that depend on
//! them. Stage order is fixed: Crawl, Capture, then Visual, Functional
//! and Data concurrently (gated by the test matrix), then Reasoning
//! and Report. Every stage runs under the run's cancellation token and
//! a per-stage timeout. Browser contexts opened by capture are closed
//! exactly once when the run reaches a terminal state.

use chrono::Utc;
use cutover_browser::{BrowserDriver, Viewport};
use cutover_rest_api_contract::{ArtifactKind, JobStatus, Run, RunStatus};
use cutover_store::{NewArtifact, SnapshotStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::reasoner::rules::RuleBasedReasoner;
use crate::reasoner::{MigrationAnalysis, Reasoner, ReasoningInput};
use crate::stages::report::StageOutputs;
use crate::stages::{self, StageFailure, StageKind, StageResult};

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Global worker-pool limit across all jobs.
    pub global_concurrency: usize,
    /// Concurrent runs allowed per job.
    pub per_job_concurrency: usize,
    /// Per-stage bound; hitting it takes the cancellation path.
    pub stage_timeout: Duration,
    /// Capture viewports.
    pub viewports: Vec<Viewport>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            global_concurrency: 4,
            per_job_concurrency: 1,
            stage_timeout: Duration::from_secs(600),
            viewports: Viewport::defaults(),
        }
    }
}

/// How one stage attempt ended, from the run's point of view.
enum StageVerdict<T> {
    /// Stage value produced, artifacts committed.
    Ok(T),
    /// Non-fatal failure: slot is unavailable, run continues.
    Unavailable,
    /// The run must end `failed` with this reason.
    Abort(String),
}

struct Inner {
    store: Arc<SnapshotStore>,
    driver: Arc<dyn BrowserDriver>,
    reasoner: Arc<dyn Reasoner>,
    config: OrchestratorConfig,
    queue_tx: mpsc::UnboundedSender<String>,
    queue_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    global_slots: Arc<Semaphore>,
    job_slots: Mutex<HashMap<String, Arc<Semaphore>>>,
    cancels: Mutex<HashMap<String, CancellationToken>>,
}

/// The background pipeline engine.
#[derive(Clone)]
pub struct RunOrchestrator {
    inner: Arc<Inner>,
}

impl RunOrchestrator {
    pub fn new(
        store: Arc<SnapshotStore>,
        driver: Arc<dyn BrowserDriver>,
        reasoner: Arc<dyn Reasoner>,
        config: OrchestratorConfig,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let global = config.global_concurrency.max(1);
        Self {
            inner: Arc::new(Inner {
                store,
                driver,
                reasoner,
                config,
                queue_tx,
                queue_rx: Mutex::new(Some(queue_rx)),
                global_slots: Arc::new(Semaphore::new(global)),
                job_slots: Mutex::new(HashMap::new()),
                cancels: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Startup recovery: runs interrupted mid-flight are failed (their
    /// browser contexts are unrecoverable) and queued runs re-enter
    /// the queue. Returns how many runs were aborted.
    pub async fn recover(&self) -> Result<usize> {
        let now = Utc::now();
        let (aborted, requeue) = self
            .inner
            .store
            .mutate(move |snapshot| {
                let mut aborted = Vec::new();
                let mut requeue = Vec::new();
                for run in &mut snapshot.runs {
                    match run.status {
                        RunStatus::Running => {
                            run.status = RunStatus::Failed;
                            run.completed_at = Some(now);
                            aborted.push(run.id.clone());
                        }
                        RunStatus::Queued => requeue.push(run.id.clone()),
                        _ => {}
                    }
                }
                Ok::<_, Error>((aborted, requeue))
            })
            .await?;

        for run_id in &aborted {
            let mut batch =
                crate::context::ArtifactBatch::new(self.inner.store.artifact_root(), run_id);
            let write = batch.write_text(
                "aborted-on-restart.log",
                "run was in progress when the process stopped; stage inputs beyond the artifact registry are not recoverable",
                ArtifactKind::Log,
                "aborted-on-restart",
            );
            match write {
                Ok(()) => Inner::commit_artifacts(&self.inner, run_id, batch.take_entries()).await,
                Err(e) => warn!(run_id = %run_id, error = %e, "cannot write abort log"),
            }
            warn!(run_id = %run_id, "marked interrupted run as failed");
        }

        for run_id in requeue {
            let _ = self.inner.queue_tx.send(run_id);
        }
        Ok(aborted.len())
    }

    /// Start the dispatcher. Call once.
    pub fn start(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut rx = inner
                .queue_rx
                .lock()
                .await
                .take()
                .expect("orchestrator started twice");
            while let Some(run_id) = rx.recv().await {
                let inner = Arc::clone(&inner);
                tokio::spawn(async move {
                    let Ok(_global) = Arc::clone(&inner.global_slots).acquire_owned().await else {
                        return;
                    };
                    let job_id = {
                        let snapshot = inner.store.snapshot().await;
                        snapshot.run(&run_id).map(|r| r.job_id.clone())
                    };
                    let Some(job_id) = job_id else {
                        debug!(run_id = %run_id, "queued run vanished before dispatch");
                        return;
                    };
                    let slot = Inner::job_slot(&inner, &job_id).await;
                    let Ok(_job) = slot.acquire_owned().await else {
                        return;
                    };
                    Inner::execute(inner, run_id).await;
                });
            }
        })
    }

    /// Create a run in `queued` and hand it to the dispatcher.
    /// Returns immediately; the pipeline executes in the background.
    pub async fn enqueue(&self, job_id: &str, triggered_by: Option<String>) -> Result<Run> {
        let run = Run {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            status: RunStatus::Queued,
            triggered_by: triggered_by.unwrap_or_else(|| "api".to_string()),
            triggered_at: Utc::now(),
            completed_at: None,
        };
        let stored = run.clone();
        let job_id = job_id.to_string();
        self.inner
            .store
            .mutate(move |snapshot| {
                if snapshot.job(&job_id).is_none() {
                    return Err(Error::not_found(format!("job {job_id}")));
                }
                snapshot.runs.push(stored);
                Ok(())
            })
            .await?;

        self.inner
            .queue_tx
            .send(run.id.clone())
            .map_err(|_| Error::conflict("run queue is shut down"))?;
        info!(run_id = %run.id, job_id = %run.job_id, "run enqueued");
        Ok(run)
    }

    /// Cancel a queued or running run. Terminal runs conflict.
    pub async fn cancel(&self, run_id: &str) -> Result<Run> {
        if let Some(token) = self.inner.cancels.lock().await.get(run_id) {
            token.cancel();
        }
        let now = Utc::now();
        let run_id = run_id.to_string();
        self.inner
            .store
            .mutate(move |snapshot| {
                let run = snapshot
                    .run_mut(&run_id)
                    .ok_or_else(|| Error::not_found(format!("run {run_id}")))?;
                match run.status {
                    RunStatus::Queued => {
                        run.status = RunStatus::Failed;
                        run.completed_at = Some(now);
                        Ok(run.clone())
                    }
                    // The executor observes the token and performs the
                    // terminal transition itself.
                    RunStatus::Running => Ok(run.clone()),
                    RunStatus::Completed | RunStatus::Failed => {
                        Err(Error::conflict(format!("run {run_id} is already terminal")))
                    }
                }
            })
            .await
    }
}

impl Inner {
    async fn job_slot(inner: &Arc<Inner>, job_id: &str) -> Arc<Semaphore> {
        let mut slots = inner.job_slots.lock().await;
        Arc::clone(slots.entry(job_id.to_string()).or_insert_with(|| {
            Arc::new(Semaphore::new(inner.config.per_job_concurrency.max(1)))
        }))
    }

    /// Execute one run end to end. At-most-once: the queued→running
    /// transition is guarded, so a second delivery of the same id is
    /// a no-op.
    async fn execute(inner: Arc<Inner>, run_id: String) {
        let claimed = inner
            .store
            .mutate(|snapshot| {
                let Some(run) = snapshot.run_mut(&run_id) else {
                    return Ok::<_, Error>(None);
                };
                if run.status != RunStatus::Queued {
                    return Ok(None);
                }
                run.status = RunStatus::Running;
                let job_id = run.job_id.clone();
                match snapshot.job(&job_id).cloned() {
                    Some(job) => {
                        if let Some(job) = snapshot.job_mut(&job_id) {
                            job.status = JobStatus::Active;
                            job.updated_at = Utc::now();
                        }
                        Ok(Some(job))
                    }
                    None => {
                        let run = snapshot.run_mut(&run_id).expect("run present above");
                        run.status = RunStatus::Failed;
                        run.completed_at = Some(Utc::now());
                        Ok(None)
                    }
                }
            })
            .await;

        let job = match claimed {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                error!(run_id = %run_id, error = %e, "cannot claim run");
                return;
            }
        };

        let ctx = RunContext::new(job, run_id.clone(), inner.store.artifact_root().to_path_buf());
        inner
            .cancels
            .lock()
            .await
            .insert(run_id.clone(), ctx.cancel.clone());

        info!(run_id = %run_id, job_id = %ctx.job.id, "run started");
        let outcome = Self::pipeline(&inner, &ctx).await;

        // Contexts are closed exactly once, success or failure.
        if let Some(contexts) = ctx.take_contexts().await {
            let _ = contexts.baseline.close().await;
            let _ = contexts.candidate.close().await;
        }
        inner.cancels.lock().await.remove(&run_id);

        let (run_status, job_status) = match &outcome {
            Ok(()) => (RunStatus::Completed, JobStatus::Completed),
            Err(reason) => {
                warn!(run_id = %run_id, reason = %reason, "run failed");
                (RunStatus::Failed, JobStatus::Failed)
            }
        };
        let now = Utc::now();
        let finished = inner
            .store
            .mutate(move |snapshot| {
                if let Some(run) = snapshot.run_mut(&run_id) {
                    if run.status == RunStatus::Running {
                        run.status = run_status;
                        run.completed_at = Some(now);
                        let job_id = run.job_id.clone();
                        if let Some(job) = snapshot.job_mut(&job_id) {
                            job.status = job_status;
                            job.updated_at = now;
                        }
                    }
                }
                Ok::<_, Error>(())
            })
            .await;
        if let Err(e) = finished {
            error!(error = %e, "cannot persist terminal run state");
        }
    }

    /// The fixed stage sequence. Returns the failure reason when the
    /// run must end `failed`.
    async fn pipeline(inner: &Arc<Inner>, ctx: &RunContext) -> std::result::Result<(), String> {
        let driver = inner.driver.as_ref();

        let crawl = match Self::run_stage(inner, ctx, StageKind::Crawl, stages::crawl::run(ctx, driver))
            .await
        {
            StageVerdict::Ok(value) => value,
            StageVerdict::Unavailable => unreachable!("crawl failures are fatal"),
            StageVerdict::Abort(reason) => return Err(reason),
        };

        let capture = match Self::run_stage(
            inner,
            ctx,
            StageKind::Capture,
            stages::capture::run(ctx, driver, &crawl.matched, &inner.config.viewports),
        )
        .await
        {
            StageVerdict::Ok(value) => value,
            StageVerdict::Unavailable => unreachable!("capture failures are fatal"),
            StageVerdict::Abort(reason) => return Err(reason),
        };

        let matrix = ctx.job.test_matrix;
        if matrix.seo {
            debug!(run_id = %ctx.run_id, "seo stage slot is reserved; no stage registered");
        }

        let (visual, functional, data) = tokio::join!(
            Self::middle_stage(inner, ctx, matrix.visual, StageKind::Visual, || {
                stages::visual::run(ctx, &capture)
            }),
            Self::middle_stage(inner, ctx, matrix.functional, StageKind::Functional, || {
                stages::functional::run(ctx, &capture)
            }),
            Self::middle_stage(inner, ctx, matrix.data, StageKind::Data, || {
                stages::data::run(ctx, &capture)
            }),
        );
        let (visual, functional, data) = (visual?, functional?, data?);

        let input = ReasoningInput {
            pages_tested: capture.pages.len(),
            visual: visual.as_ref().map(|v| v.summary.clone()),
            functional: functional.as_ref().map(|f| f.summary.clone()),
            data: data.as_ref().map(|d| d.summary.clone()),
        };

        let (analysis, reasoner_name) = Self::reasoning(inner, ctx, &input).await?;

        let outputs = StageOutputs {
            visual,
            functional,
            data,
        };
        match Self::run_stage(
            inner,
            ctx,
            StageKind::Report,
            stages::report::run(ctx, &input, &analysis, &outputs, reasoner_name),
        )
        .await
        {
            StageVerdict::Ok(_) => Ok(()),
            StageVerdict::Unavailable => unreachable!("report failures are fatal"),
            StageVerdict::Abort(reason) => Err(reason),
        }
    }

    /// Run one middle stage if its matrix flag is set. Failures mark
    /// the slot unavailable; only cancellation aborts the run.
    async fn middle_stage<T, F, Fut>(
        inner: &Arc<Inner>,
        ctx: &RunContext,
        enabled: bool,
        kind: StageKind,
        make: F,
    ) -> std::result::Result<Option<T>, String>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = StageResult<T>>,
    {
        if !enabled {
            debug!(run_id = %ctx.run_id, stage = kind.name(), "stage disabled by test matrix");
            return Ok(None);
        }
        match Self::run_stage(inner, ctx, kind, make()).await {
            StageVerdict::Ok(value) => Ok(Some(value)),
            StageVerdict::Unavailable => Ok(None),
            StageVerdict::Abort(reason) => Err(reason),
        }
    }

    /// Drive one stage future under the cancellation token and the
    /// per-stage timeout, then commit its artifacts and, on failure,
    /// its error log.
    async fn run_stage<T>(
        inner: &Arc<Inner>,
        ctx: &RunContext,
        kind: StageKind,
        fut: impl std::future::Future<Output = StageResult<T>>,
    ) -> StageVerdict<T> {
        debug!(run_id = %ctx.run_id, stage = kind.name(), "stage started");
        let result = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                Self::commit_error_log(inner, ctx, kind, "cancelled").await;
                return StageVerdict::Abort("cancelled".to_string());
            }
            result = tokio::time::timeout(inner.config.stage_timeout, fut) => result,
        };

        match result {
            Err(_) => {
                let message = format!(
                    "{} stage timed out after {}s",
                    kind.name(),
                    inner.config.stage_timeout.as_secs()
                );
                Self::commit_error_log(inner, ctx, kind, &message).await;
                // Timeouts take the same terminal path as cancel.
                StageVerdict::Abort(message)
            }
            Ok(Ok(output)) => {
                Self::commit_artifacts(inner, &ctx.run_id, output.artifacts).await;
                debug!(run_id = %ctx.run_id, stage = kind.name(), "stage completed");
                StageVerdict::Ok(output.value)
            }
            Ok(Err(StageFailure { message, artifacts })) => {
                Self::commit_artifacts(inner, &ctx.run_id, artifacts).await;
                Self::commit_error_log(inner, ctx, kind, &message).await;
                if kind.is_fatal() {
                    StageVerdict::Abort(format!("{}: {message}", kind.error_label()))
                } else {
                    warn!(run_id = %ctx.run_id, stage = kind.name(), error = %message, "stage unavailable");
                    StageVerdict::Unavailable
                }
            }
        }
    }

    /// Reasoning with fallback: the configured reasoner first, the
    /// deterministic rule-based analyzer when it errors or times out.
    async fn reasoning(
        inner: &Arc<Inner>,
        ctx: &RunContext,
        input: &ReasoningInput,
    ) -> std::result::Result<(MigrationAnalysis, &'static str), String> {
        let primary = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                Self::commit_error_log(inner, ctx, StageKind::Reasoning, "cancelled").await;
                return Err("cancelled".to_string());
            }
            result = tokio::time::timeout(inner.config.stage_timeout, inner.reasoner.analyze(input)) => result,
        };

        match primary {
            Ok(Ok(analysis)) => Ok((analysis, inner.reasoner.name())),
            Ok(Err(e)) => {
                Self::commit_error_log(inner, ctx, StageKind::Reasoning, &e.to_string()).await;
                let fallback = RuleBasedReasoner;
                let analysis = fallback.analyze(input).await.map_err(|e| e.to_string())?;
                Ok((analysis, fallback.name()))
            }
            Err(_) => {
                let message = format!(
                    "Reasoning timed out after {}s",
                    inner.config.stage_timeout.as_secs()
                );
                Self::commit_error_log(inner, ctx, StageKind::Reasoning, &message).await;
                let fallback = RuleBasedReasoner;
                let analysis = fallback.analyze(input).await.map_err(|e| e.to_string())?;
                Ok((analysis, fallback.name()))
            }
        }
    }

    async fn commit_error_log(inner: &Arc<Inner>, ctx: &RunContext, kind: StageKind, message: &str) {
        let mut batch = ctx.batch();
        let relative = format!("{}-error.log", kind.slug());
        if let Err(e) = batch.write_text(&relative, message, ArtifactKind::Log, kind.error_label()) {
            warn!(run_id = %ctx.run_id, error = %e, "cannot write stage error log");
            return;
        }
        Self::commit_artifacts(inner, &ctx.run_id, batch.take_entries()).await;
    }

    async fn commit_artifacts(inner: &Arc<Inner>, run_id: &str, entries: Vec<NewArtifact>) {
        if entries.is_empty() {
            return;
        }
        if let Err(e) = inner.store.register_artifacts(run_id, entries).await {
            warn!(run_id = %run_id, error = %e, "cannot register stage artifacts");
        }
    }
}
