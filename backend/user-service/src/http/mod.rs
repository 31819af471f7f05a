/// HTTP/JSON gateway for user-service
///
/// Routes:
/// - POST /v1/users       → CreateUser
/// - POST /v1/login       → Login
/// - GET  /v1/users/:id   → GetUser
/// - GET  /v1/me          → GetMe
/// - GET  /v1/users       → ListUsers (`page`, `page_size`, `search`)
/// - GET  /health         → liveness, outside the interceptor chain
///
/// Unknown paths and unsupported methods answer with the same `{"error"}` body.
pub mod error;
mod gateway;

pub use error::{http_status, ApiError, ErrorBody};

use crate::grpc::UsersServiceImpl;
use axum::http::{header, StatusCode};
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared HTTP server state
#[derive(Clone)]
pub struct GatewayState {
    pub service: Arc<UsersServiceImpl>,
    /// Parent of every per-request cancellation token
    pub shutdown: CancellationToken,
}

/// Build the HTTP router
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/users", post(gateway::create_user).get(gateway::list_users))
        .route("/v1/users/:id", get(gateway::get_user))
        .route("/v1/login", post(gateway::login))
        .route("/v1/me", get(gateway::get_me))
        .fallback(unknown_route)
        .layer(map_response(method_not_allowed_body))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn unknown_route() -> ApiError {
    ApiError(Status::not_found("no such route"))
}

/// Give axum's bare 405 the JSON error body, keeping its `Allow` header
async fn method_not_allowed_body(response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED
        || response.headers().contains_key(header::CONTENT_TYPE)
    {
        return response;
    }

    let allow = response.headers().get(header::ALLOW).cloned();
    let mut replaced = (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody {
            error: "Method Not Allowed".to_string(),
        }),
    )
        .into_response();
    if let Some(allow) = allow {
        replaced.headers_mut().insert(header::ALLOW, allow);
    }
    replaced
}

/// Serve the gateway until `shutdown` is cancelled
pub async fn start_http_server(
    state: GatewayState,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    info!("Starting HTTP gateway on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

    Ok(())
}
