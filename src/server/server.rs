use anyhow::{Context, Result};
use std::time::{Duration, Instant};

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use super::events::stream_events;
use super::files::{download_file, list_files, run_blocking, upload_file, upload_options};
use super::metrics::metrics_handler;
use super::{http_cache, log_requests, state::*, ServerConfig};
use crate::config::EventsSettings;
use crate::notifier::ChangeNotifier;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub files: Option<usize>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let files = match run_blocking(state.file_store.clone(), |store| store.count()).await {
        Ok(count) => Some(count),
        Err(err) => {
            error!("Failed to count files: {:#}", err);
            None
        }
    };
    Json(ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        files,
    })
}

pub fn make_app(config: ServerConfig, file_store: GuardedFileStore, notifier: ChangeNotifier) -> Router {
    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        file_store,
        notifier,
        hash: env!("GIT_HASH").to_owned(),
    };

    let download_routes: Router = Router::new()
        .route("/files/{id}", get(download_file))
        .layer(middleware::from_fn_with_state(
            config.content_cache_age_sec,
            http_cache,
        ))
        .with_state(state.clone());

    let upload_routes: Router = Router::new()
        .route("/upload", post(upload_file).options(upload_options))
        .layer(DefaultBodyLimit::max(config.max_upload_size_bytes))
        .with_state(state.clone());

    Router::new()
        .route("/", get(home))
        .route("/events", get(stream_events))
        .route("/files", get(list_files))
        .with_state(state.clone())
        .merge(download_routes)
        .merge(upload_routes)
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serve the API on `config.port` and metrics on `config.metrics_port` until
/// `shutdown` is cancelled.
///
/// Event stream sessions watch the same token, so open streams end and the
/// graceful shutdown can complete.
pub async fn run_server(
    config: ServerConfig,
    file_store: GuardedFileStore,
    events: EventsSettings,
    shutdown: CancellationToken,
) -> Result<()> {
    let notifier = ChangeNotifier::new(file_store.clone(), events, shutdown.clone());
    let app = make_app(config.clone(), file_store, notifier);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    let metrics_listener = tokio::net::TcpListener::bind(("0.0.0.0", config.metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", config.metrics_port))?;

    let api_shutdown = shutdown.clone();
    let api = axum::serve(listener, app).with_graceful_shutdown(async move {
        api_shutdown.cancelled().await;
        info!("HTTP server shutting down");
    });
    let metrics_shutdown = shutdown.clone();
    let metrics = axum::serve(metrics_listener, make_metrics_app())
        .with_graceful_shutdown(async move { metrics_shutdown.cancelled().await });

    let (api_result, metrics_result) = tokio::join!(api, metrics);
    api_result.context("HTTP server failed")?;
    metrics_result.context("Metrics server failed")?;
    Ok(())
}
