//! HTTP surface of the generation flow.
//!
//! Callers are identified by the `x-user-id` header, set by whatever
//! authenticating proxy sits in front of the service.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::engine::Orchestrator;
use crate::errors::GenError;
use crate::wire::{GenerateResponse, GenerationInput, UsageSummary};

pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Generation(#[from] GenError),

    #[error("usage lookup failed: {0}")]
    Usage(GenError),

    #[error("bad request: {0}")]
    BadRequest(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// Status and body for the failures a caller can act on; `None` for
/// everything that must stay opaque.
fn client_facing(err: &GenError) -> Option<(StatusCode, serde_json::Value)> {
    match err {
        GenError::MissingFields => Some((StatusCode::BAD_REQUEST, json!({ "error": "Missing required fields" }))),
        GenError::Unauthorized => Some((StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" }))),
        GenError::QuotaExceeded { used, limit } => Some((
            StatusCode::FORBIDDEN,
            json!({ "error": "Credit limit reached", "credits_used": used, "credits_limit": limit }),
        )),
        GenError::RateLimited(_) => Some((
            StatusCode::TOO_MANY_REQUESTS,
            json!({ "error": "Service temporarily unavailable. Please try again." }),
        )),
        _ => None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::BadRequest(msg) => {
                tracing::debug!(error = %msg, "Rejected request body");
                (StatusCode::BAD_REQUEST, json!({ "error": "Invalid request body" }))
            }
            AppError::Generation(err) => client_facing(err).unwrap_or_else(|| {
                tracing::error!(error = %err, "Copy generation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to generate copy. Please try again." }),
                )
            }),
            AppError::Usage(err) => client_facing(err).unwrap_or_else(|| {
                tracing::error!(error = %err, "Usage lookup failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to fetch usage. Please try again." }),
                )
            }),
        };

        (status, Json(body)).into_response()
    }
}

fn user_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// POST /api/generate/copy
async fn generate_copy(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<GenerationInput>, JsonRejection>,
) -> AppResult<Json<GenerateResponse>> {
    let Json(input) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let resp = state.orchestrator.generate(user_id(&headers), &input).await?;
    Ok(Json(resp))
}

/// GET /api/usage
async fn usage(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<UsageSummary>> {
    let summary = state.orchestrator.usage(user_id(&headers)).await.map_err(AppError::Usage)?;
    Ok(Json(summary))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub mode: &'static str,
    pub backend: &'static str,
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let orch = &state.orchestrator;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        mode: if orch.is_demo() { "demo" } else { "live" },
        backend: orch.backend_name(),
    })
}

/// The full application, middleware included.
pub fn router(orchestrator: Arc<Orchestrator>, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(USER_HEADER)]);

    Router::new()
        .route("/health", get(health))
        .route("/api/generate/copy", post(generate_copy))
        .route("/api/usage", get(usage))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(AppState { orchestrator })
}

pub async fn serve(host: &str, port: u16, app: Router) -> anyhow::Result<()> {
    let ip: IpAddr = host.parse().with_context(|| format!("invalid host address `{host}`"))?;
    let addr = SocketAddr::new(ip, port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
