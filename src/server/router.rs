use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{cors, handlers};
use crate::config::ServiceConfig;
use crate::utils::fetcher::{DocumentFetcher, HttpFetcher};
use crate::utils::pdf::{PdfExtractor, TextExtractor};

/// Collaborators shared by all requests. Both are read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<dyn DocumentFetcher>,
    pub extractor: Arc<dyn TextExtractor>,
}

impl AppState {
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config).context("failed to build HTTP client")?;
        Ok(Self {
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(PdfExtractor::new()),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/", get(handlers::health).fallback(handlers::not_found))
        .route(
            "/parse",
            post(handlers::parse).fallback(handlers::not_found),
        )
        .fallback(handlers::not_found)
        .with_state(state);

    // Router::layer wraps each route and the fallback, so the CORS layers see
    // OPTIONS before any method dispatch on every path.
    cors::permissive(routes).layer(TraceLayer::new_for_http())
}

pub async fn serve(config: ServiceConfig) -> Result<()> {
    let state = AppState::from_config(&config)?;
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        port = config.port,
        timeout_secs = config.download_timeout.as_secs(),
        max_bytes = config.max_download_bytes,
        "Server running on port {}",
        config.port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
