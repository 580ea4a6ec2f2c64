//! HTTP surface
//!
//! JSON routes over the query engine and the job coordinator, plus a
//! WebSocket that pushes crawl progress to connected observers.

mod progress;
mod routes;

pub use routes::Ack;

use crate::config::{Config, ServerConfig};
use crate::crawler::{CrawlSettings, JobCoordinator, ProgressEmitter, ReqwestFetcher};
use crate::extract::HeuristicExtractor;
use crate::query::QueryEngine;
use crate::storage::open_store;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    pub jobs: JobCoordinator,
}

impl AppState {
    /// Opens the configured store and wires the crawler and query engine to it
    pub async fn from_config(config: &Config) -> crate::Result<Self> {
        let store = open_store(&config.store).await?;

        let settings = CrawlSettings::from_config(&config.crawler)?;
        let fetcher = ReqwestFetcher::from_config(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout_secs),
        )?;
        let jobs = JobCoordinator::new(
            settings,
            Arc::new(fetcher),
            Arc::new(HeuristicExtractor::new()),
            store.clone(),
            ProgressEmitter::new(config.search.progress_buffer),
        );

        Ok(Self {
            engine: Arc::new(QueryEngine::from_config(store, &config.search)),
            jobs,
        })
    }
}

/// CORS for the configured origins; an empty list allows any origin
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<_> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/scrape", post(routes::start_scrape))
        .route("/convenios", get(routes::list_convenios))
        .route("/convenio/{id}", get(routes::get_convenio))
        .route("/convenios_by_cat/{cat}", get(routes::convenios_by_category))
        .route("/get_categories", get(routes::get_categories))
        .route("/allconvenios", get(routes::all_convenios))
        .route("/progress", get(progress::job_status))
        .route("/ws", get(progress::progress_socket))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the configured address and serves until the process stops
pub async fn serve(state: AppState, config: &ServerConfig) -> std::io::Result<()> {
    let addr = config
        .socket_addr()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, build_router(state, config)).await
}
