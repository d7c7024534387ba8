//! Lectern API Gateway
//!
//! The entry point for all external API requests.
//! Handles:
//! - Document upload, listing and deletion
//! - Question answering over indexed documents
//! - Request routing and concurrency limits
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

#[cfg(test)]
mod tests;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use lectern_common::{
    config::AppConfig,
    context::Generators,
    errors::Result,
    metrics,
    store::{create_embedder, LocalVectorStore, VectorStore},
    DocumentRegistry, QueryOrchestrator,
};
use lectern_ingestion::{ChunkingConfig, DocumentIndexer};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::{signal, sync::watch};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn VectorStore>,
    pub registry: Arc<DocumentRegistry>,
    pub indexer: Arc<DocumentIndexer>,
    pub orchestrator: Arc<QueryOrchestrator>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn VectorStore>,
        generators: Generators,
    ) -> Result<Self> {
        let registry = Arc::new(DocumentRegistry::new(config.mapping_path()));
        let indexer = Arc::new(DocumentIndexer::new(
            store.clone(),
            ChunkingConfig::from(&config.chunking),
        ));
        let orchestrator = Arc::new(QueryOrchestrator::from_config(
            store.clone(),
            registry.clone(),
            generators,
            &config,
        )?);

        Ok(Self {
            config,
            store,
            registry,
            indexer,
            orchestrator,
        })
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

fn init_metrics(config: &AppConfig) -> anyhow::Result<()> {
    let port = config.observability.metrics_port;
    if port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            metrics::STAGE_BUCKETS,
        )?
        .install()?;
    metrics::register_metrics();

    info!(port, "Metrics exporter listening");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config);

    info!(
        service = %config.observability.service_name,
        llm = config.llm_enabled(),
        "Starting Lectern API Gateway v{}",
        lectern_common::VERSION
    );

    let config = Arc::new(config);
    init_metrics(&config).context("failed to start metrics exporter")?;

    // Vector store
    let embedder = create_embedder(&config.embedding)?;
    info!(
        model = embedder.model_name(),
        dimension = embedder.dimension(),
        "Embedder ready"
    );
    let store: Arc<dyn VectorStore> =
        Arc::new(LocalVectorStore::open(config.index_path(), embedder).await?);
    tokio::fs::create_dir_all(&config.storage.data_dir).await?;

    let generators = Generators::from_config(&config.llm)?;
    let state = AppState::new(config.clone(), store, generators)?;

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    let (stopping_tx, mut stopping_rx) = watch::channel(false);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = stopping_tx.send(true);
    });

    let drain_limit = config.shutdown_timeout();
    tokio::select! {
        result = server.into_future() => result?,
        _ = async {
            let _ = stopping_rx.wait_for(|stopping| *stopping).await;
            tokio::time::sleep(drain_limit).await;
        } => warn!(
            timeout_secs = drain_limit.as_secs(),
            "Connections still open after shutdown timeout, exiting"
        ),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let max_upload = state.config.server.max_upload_bytes;
    let max_concurrent = state.config.server.max_concurrent_requests.max(1);

    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/stats", get(handlers::stats::stats))
        // Document endpoints
        .route("/documents", get(handlers::documents::list))
        .route("/documents/upload", post(handlers::documents::upload))
        .route("/documents/{id}", delete(handlers::documents::delete))
        // Question answering
        .route("/query", post(handlers::query::query));

    Router::new()
        .route("/", get(handlers::root::root))
        .nest("/api", api_routes)
        .route_layer(axum::middleware::from_fn(middleware::metrics::track_metrics))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(ConcurrencyLimitLayer::new(max_concurrent))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
