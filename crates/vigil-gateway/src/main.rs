use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use vigil_ambient::{ActivityTracker, Explorer, NoActivity, NoTasks, Orchestrator};
use vigil_core::events::{EventSink, LogSink};
use vigil_core::VigilConfig;
use vigil_curiosity::CuriosityPipeline;
use vigil_graph::{GraphAdapter, HttpGraph};
use vigil_ingest::{ContextBuilder, EmotionBuffer, Ingestor};
use vigil_integrate::FactChecker;
use vigil_llm::{HttpLlm, LlmAdapter};
use vigil_queue::{JobHandler, WorkerPool};
use vigil_store::tasks::BacklogLimits;
use vigil_store::types::QueueTask;
use vigil_store::Store;
use vigil_summary::SummaryLoop;

mod app;
mod error;
mod http;

#[derive(Parser)]
#[command(name = "vigil", about = "Always-on personal assistant daemon")]
struct Args {
    /// Path to vigil.toml (default: ~/.vigil/vigil.toml).
    #[arg(long)]
    config: Option<String>,
    /// Override the gateway port.
    #[arg(long)]
    port: Option<u16>,
}

/// Generic model-job handler for the work queue: runs the job content
/// through the text endpoint. Unknown job types fail into the retry path.
struct ModelJobHandler {
    llm: Arc<dyn LlmAdapter>,
}

#[async_trait]
impl JobHandler for ModelJobHandler {
    async fn handle(&self, task: &QueueTask) -> Result<(), String> {
        match task.task_type.as_str() {
            "generate" | "summary" | "notify" => {
                let output = self.llm.text(&task.content).await.map_err(|e| e.to_string())?;
                debug!(task_id = task.id, chars = output.len(), "model job output");
                Ok(())
            }
            other => Err(format!("unknown task type: {other}")),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil=info,tower_http=warn".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = VigilConfig::load(args.config.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        VigilConfig::default()
    });
    if let Some(port) = args.port {
        config.gateway.port = port;
    }

    let store = Arc::new(Store::open(&config.database.path)?);
    let graph: Arc<dyn GraphAdapter> = Arc::new(HttpGraph::new(
        config.graph.base_url.clone(),
        config.graph.timeout_secs,
    ));
    let llm: Arc<dyn LlmAdapter> = Arc::new(HttpLlm::new(
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
        config.llm.timeout_secs,
    ));
    let sink: Arc<dyn EventSink> = Arc::new(LogSink);
    let group_id = config.graph.group_id.clone();

    let limits = BacklogLimits {
        max_pending_per_user: config.curiosity.max_pending_per_user,
        max_pending_per_type: config.curiosity.max_pending_per_type,
    };
    let curiosity = Arc::new(CuriosityPipeline::new(
        store.clone(),
        graph.clone(),
        limits,
        group_id.clone(),
    ));
    let emotions = Arc::new(EmotionBuffer::new());
    let ingestor = Ingestor::new(
        store.clone(),
        graph.clone(),
        curiosity,
        emotions.clone(),
        group_id.clone(),
    );
    let context = ContextBuilder::new(store.clone(), graph.clone(), group_id.clone());
    let checker = Arc::new(FactChecker::new(
        store.clone(),
        graph.clone(),
        sink.clone(),
        group_id.clone(),
    ));
    let tracker = Arc::new(ActivityTracker::new());
    let tasks = Arc::new(NoTasks);

    // ── Background loops ─────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let explorer = Explorer::new(
        store.clone(),
        graph.clone(),
        llm.clone(),
        checker.clone(),
        config.exploration.clone(),
        group_id.clone(),
    );
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        llm.clone(),
        Arc::new(NoActivity),
        tracker.clone(),
        tasks.clone(),
        sink.clone(),
        explorer,
        config.ambient.clone(),
        config.ambient.user_id.clone(),
    ));
    tokio::spawn(orchestrator.clone().run(shutdown_rx.clone()));

    let summary = Arc::new(SummaryLoop::new(
        store.clone(),
        llm.clone(),
        config.summary.clone(),
    ));
    tokio::spawn(summary.run(shutdown_rx.clone()));

    let pool = Arc::new(WorkerPool::new(
        store.clone(),
        Arc::new(ModelJobHandler { llm: llm.clone() }),
        config.llm.model.clone(),
        config.queue.clone(),
    ));
    pool.spawn(shutdown_rx.clone());

    // ── HTTP surface ─────────────────────────────────────────────────────
    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let state = Arc::new(app::AppState {
        config,
        store,
        graph,
        llm,
        ingestor,
        context,
        emotions,
        tracker,
        tasks,
        checker,
    });
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("vigil gateway listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}
