//! Agent HTTP surface
//!
//! Thin axum layer over the local tunnel lifecycle manager. The handlers
//! preserve the core contracts: derived ids, VNI/MTU bounds, idempotent
//! duplicate create.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use vxmesh_common::{Error, NodeStatusSummary, TunnelCreateRequest};
use vxmesh_core::TunnelManager;

/// Shared handler state
pub struct AppState {
    pub node_id: String,
    pub manager: Arc<TunnelManager>,
    pub api_token: Option<String>,
}

/// Build the agent router
pub fn agent_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/tunnels", post(create_handler).get(list_handler))
        .route("/api/v1/tunnels/:id", axum::routing::delete(delete_handler))
        .route("/api/v1/status", get(status_handler))
        .route("/api/v1/recover", post(recover_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(e: &Error) -> Response {
    let status = match e {
        Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Conflict { .. } => StatusCode::CONFLICT,
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Config(_) => StatusCode::BAD_REQUEST,
        Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::Transport(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({"success": false, "error": e.to_string()})),
    )
        .into_response()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"success": false, "error": "missing or invalid bearer token"})),
    )
        .into_response()
}

/// Management endpoints require the configured bearer token, when set
fn authorized(state: &AppState, headers: &HeaderMap) -> bool {
    match &state.api_token {
        None => true,
        Some(expected) => headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| token == expected)
            .unwrap_or(false),
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({"status": "healthy", "node_id": state.node_id})).into_response()
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<TunnelCreateRequest>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    match state.manager.create(request.spec, request.tunnel_id) {
        Ok(tunnel_id) => {
            info!("Agent created tunnel {}", tunnel_id);
            Json(json!({"success": true, "tunnel_id": tunnel_id})).into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tunnel_id): Path<String>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    match state.manager.delete(&tunnel_id) {
        Ok(()) => Json(json!({
            "success": true,
            "message": format!("Tunnel {} deleted", tunnel_id),
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn list_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    let tunnels = state.manager.list();
    Json(json!({"success": true, "tunnels": tunnels})).into_response()
}

async fn status_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    let tunnels = state.manager.list();
    let summary = NodeStatusSummary {
        node_id: state.node_id.clone(),
        tunnel_count: tunnels.len(),
        tunnels,
        reported_at: chrono::Utc::now(),
    };
    Json(json!({"success": true, "status": summary})).into_response()
}

async fn recover_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    let report = state.manager.recover();
    Json(json!({
        "success": true,
        "recovered": report.recovered,
        "failed": report.failed,
    }))
    .into_response()
}
