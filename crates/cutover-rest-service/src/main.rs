//! cutover-server: the migration-assurance control plane.

use anyhow::Context;
use clap::Parser;
use cutover_browser::HttpBrowserDriver;
use cutover_core::{
    JobService, LlmConfig, LlmReasoner, OrchestratorConfig, Reasoner, RuleBasedReasoner,
    RunOrchestrator,
};
use cutover_rest_service::{router, AppState};
use cutover_store::SnapshotStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "cutover-server",
    about = "Website-migration assurance control plane"
)]
struct Cli {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 4000)]
    port: u16,

    /// Directory holding the snapshot and the artifact tree.
    #[arg(long, env = "DATA_DIR", default_value = "./backend/data")]
    data_dir: String,

    /// Chat-completion endpoint for the LLM reasoner. When absent the
    /// rule-based reasoner is used.
    #[arg(long, env = "LLM_ENDPOINT")]
    llm_endpoint: Option<String>,

    /// API key for the LLM endpoint.
    #[arg(long, env = "LLM_API_KEY")]
    llm_api_key: Option<String>,

    /// Model deployment name passed to the LLM endpoint.
    #[arg(long, env = "LLM_DEPLOYMENT_NAME")]
    llm_deployment_name: Option<String>,

    /// Restrict CORS to this origin; permissive when unset.
    #[arg(long, env = "CUTOVER_CORS_ORIGIN")]
    cors_origin: Option<String>,

    /// Global worker-pool limit for concurrent runs.
    #[arg(long, default_value_t = 4)]
    max_concurrent_runs: usize,

    /// Per-stage timeout in seconds.
    #[arg(long, default_value_t = 600)]
    stage_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();

    // Storage corruption refuses startup; no partial writes.
    let store = Arc::new(
        SnapshotStore::open(&cli.data_dir)
            .with_context(|| format!("cannot open data dir {}", cli.data_dir))?,
    );

    let driver = Arc::new(HttpBrowserDriver::new().context("cannot build browser driver")?);
    let reasoner: Arc<dyn Reasoner> = match (
        cli.llm_endpoint.clone(),
        cli.llm_api_key.clone(),
        cli.llm_deployment_name.clone(),
    ) {
        (Some(endpoint), Some(api_key), Some(deployment)) => {
            info!("using LLM reasoner");
            Arc::new(
                LlmReasoner::new(LlmConfig {
                    endpoint,
                    api_key,
                    deployment,
                })
                .context("cannot build LLM reasoner")?,
            )
        }
        _ => {
            info!("LLM not configured; using rule-based reasoner");
            Arc::new(RuleBasedReasoner)
        }
    };

    let orchestrator = RunOrchestrator::new(
        Arc::clone(&store),
        driver,
        reasoner,
        OrchestratorConfig {
            global_concurrency: cli.max_concurrent_runs,
            stage_timeout: Duration::from_secs(cli.stage_timeout_secs),
            ..OrchestratorConfig::default()
        },
    );
    let aborted = orchestrator.recover().await?;
    if aborted > 0 {
        info!(aborted, "failed runs interrupted by the previous shutdown");
    }
    orchestrator.start();

    let state = AppState {
        jobs: JobService::new(store),
        orchestrator,
    };
    let app = router(state, cli.cors_origin.as_deref());

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    info!(%addr, "cutover-server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}
