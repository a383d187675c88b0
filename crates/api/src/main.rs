use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scriptforge_api::config::ServerConfig;
use scriptforge_api::router::build_app_router;
use scriptforge_api::state::AppState;
use scriptforge_core::store::memory::{MemoryExecutionStore, MemoryJobStore, MemoryScriptStore};
use scriptforge_core::store::{ExecutionStore, JobStore, ScriptStore};
use scriptforge_db::{PgExecutionStore, PgJobStore, PgScriptStore};
use scriptforge_llm::config::LlmConfig;
use scriptforge_pipeline::config::templates_from_env;
use scriptforge_pipeline::{ExecutionConfig, ExecutionEngine, JobProcessor};

struct Stores {
    pool: Option<scriptforge_db::DbPool>,
    jobs: Arc<dyn JobStore>,
    scripts: Arc<dyn ScriptStore>,
    executions: Arc<dyn ExecutionStore>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    // LOG_FORMAT=json switches to one JSON object per line.
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "scriptforge_api=debug,scriptforge_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let llm_config = LlmConfig::from_env();
    let execution_config = ExecutionConfig::from_env();
    let templates = templates_from_env().expect("Invalid PROMPT_TEMPLATE_* override");
    tracing::info!(
        backend_order = ?llm_config.default_order,
        interpreter = %execution_config.interpreter,
        default_timeout_secs = execution_config.default_timeout_secs,
        max_timeout_secs = execution_config.max_timeout_secs,
        "Loaded pipeline configuration",
    );
    if config.request_timeout_secs <= execution_config.max_timeout_secs {
        tracing::warn!(
            request_timeout_secs = config.request_timeout_secs,
            max_timeout_secs = execution_config.max_timeout_secs,
            "REQUEST_TIMEOUT_SECS does not exceed EXECUTION_MAX_TIMEOUT_SECS; long executions \
             will answer 408 while still being recorded",
        );
    }

    // --- Storage ---
    let stores = connect_stores().await;

    // --- Services ---
    let gateway = llm_config
        .build_gateway()
        .expect("Failed to build generation backends");
    tracing::info!(backends = ?gateway.names(), "Model gateway ready");

    let jobs = Arc::new(JobProcessor::new(
        stores.jobs,
        gateway,
        templates,
        llm_config.default_order.clone(),
    ));
    let engine = Arc::new(ExecutionEngine::new(
        stores.scripts,
        stores.executions,
        execution_config,
    ));

    // --- App state ---
    let state = AppState {
        pool: stores.pool,
        config: Arc::new(config.clone()),
        jobs: Arc::clone(&jobs),
        engine,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, draining jobs");

    let drained = jobs
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    if drained {
        tracing::info!("Graceful shutdown complete");
    } else {
        tracing::warn!("Shutdown complete with unfinished jobs");
    }
}

/// Postgres stores when `DATABASE_URL` is set, in-memory stores otherwise.
async fn connect_stores() -> Stores {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        tracing::warn!("DATABASE_URL not set; using in-memory stores (data is lost on exit)");
        return Stores {
            pool: None,
            jobs: Arc::new(MemoryJobStore::new()),
            scripts: Arc::new(MemoryScriptStore::new()),
            executions: Arc::new(MemoryExecutionStore::new()),
        };
    };

    let pool = scriptforge_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    scriptforge_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    scriptforge_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    Stores {
        jobs: Arc::new(PgJobStore::new(pool.clone())),
        scripts: Arc::new(PgScriptStore::new(pool.clone())),
        executions: Arc::new(PgExecutionStore::new(pool.clone())),
        pool: Some(pool),
    }
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
