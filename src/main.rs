//! ArenaJudge - Application Entry Point
//!
//! Wires the store, sandbox and judge pool together and serves the HTTP API.

use std::{net::SocketAddr, panic, path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use axum::Router;
use bollard::Docker;
use tokio::{net::TcpListener, sync::watch};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use arenajudge::{
    config::{CONFIG, LogFormat, SandboxBackend},
    constants::{API_BASE_PATH, MAX_REQUEST_BODY_BYTES},
    db::{
        self, MemoryStore, PgStore, ProblemCatalog, StatisticsStore, SubmissionStore,
        repositories::ProblemRepository,
    },
    handlers,
    models::Problem,
    sandbox::{DockerSandbox, ProcessSandbox, Sandbox},
    services::{JudgePool, JudgeQueue, StatisticsService, SubmissionService},
    state::AppState,
};

/// The three storage seams, backed by one store
struct Stores {
    submissions: Arc<dyn SubmissionStore>,
    problems: Arc<dyn ProblemCatalog>,
    statistics: Arc<dyn StatisticsStore>,
}

impl Stores {
    fn backed_by<S>(store: Arc<S>) -> Self
    where
        S: SubmissionStore + ProblemCatalog + StatisticsStore + 'static,
    {
        Self {
            submissions: store.clone(),
            problems: store.clone(),
            statistics: store,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    set_panic_hook();

    tracing::info!("Starting ArenaJudge server...");

    let stores = open_stores().await?;
    let sandbox = open_sandbox().await?;

    let judge = CONFIG.judge.clone();
    let (queue, receiver) = JudgeQueue::bounded(judge.queue_capacity);
    let statistics = Arc::new(StatisticsService::new(
        stores.submissions.clone(),
        stores.statistics.clone(),
    ));
    let service = Arc::new(SubmissionService::new(
        stores.submissions,
        stores.problems,
        statistics,
        sandbox,
        queue,
        judge.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool = JudgePool::spawn(
        service.clone(),
        receiver,
        judge.workers,
        Duration::from_secs(judge.sweep_interval_seconds),
        shutdown_rx,
    );

    let state = AppState::new(service, stores.statistics, CONFIG.clone());

    let app = Router::new()
        .nest(API_BASE_PATH, handlers::routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            CONFIG.server.request_timeout_seconds,
        )))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::new(CONFIG.server.host.parse()?, CONFIG.server.port);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, draining judge pool");
    // Receivers may already be gone if every worker exited
    let _ = shutdown_tx.send(true);
    pool.join().await;

    tracing::info!("ArenaJudge shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| CONFIG.server.rust_log.clone().into());

    match CONFIG.server.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}

async fn open_stores() -> anyhow::Result<Stores> {
    let problems_file = CONFIG.judge.problems_file.as_deref();

    let Some(url) = CONFIG.database.url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using the in-memory store");
        let store = Arc::new(MemoryStore::new());
        if let Some(path) = problems_file {
            let count = store
                .load_problems(path)
                .with_context(|| format!("loading problems from {}", path.display()))?;
            tracing::info!(count, "Loaded problems into memory");
        }
        return Ok(Stores::backed_by(store));
    };

    tracing::info!("Connecting to database...");
    let pool = db::connection::create_pool(url, CONFIG.database.max_connections).await?;
    db::connection::test_connection(&pool).await?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    if let Some(path) = problems_file {
        let count = seed_problems(&pool, path).await?;
        tracing::info!(count, "Seeded problems into the database");
    }

    Ok(Stores::backed_by(Arc::new(PgStore::new(pool))))
}

/// Upsert every problem from a JSON problem set
async fn seed_problems(pool: &sqlx::PgPool, path: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let problems: Vec<Problem> = serde_json::from_str(&raw)?;

    for problem in &problems {
        if let Err(reason) = problem.validate_for_judging() {
            tracing::warn!(problem_id = %problem.id, "{}", reason);
        }
        ProblemRepository::upsert(pool, problem).await?;
    }

    Ok(problems.len())
}

async fn open_sandbox() -> anyhow::Result<Arc<dyn Sandbox>> {
    let judge = &CONFIG.judge;

    match CONFIG.sandbox.backend {
        SandboxBackend::Docker => {
            tracing::info!("Connecting to Docker...");
            let docker = Docker::connect_with_socket_defaults()?;

            let docker_info = docker.version().await?;
            tracing::info!(
                "Connected to Docker version: {}",
                docker_info.version.unwrap_or_default()
            );

            Ok(Arc::new(DockerSandbox::new(
                docker,
                &CONFIG.sandbox,
                judge.compile_timeout(),
                judge.output_limit_bytes,
            )))
        }
        SandboxBackend::Process => {
            tracing::warn!(
                "Using the process sandbox: submissions run without filesystem or network isolation"
            );
            Ok(Arc::new(ProcessSandbox::new(
                judge.compile_timeout(),
                judge.output_limit_bytes,
                CONFIG.sandbox.process_limit,
            )))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
