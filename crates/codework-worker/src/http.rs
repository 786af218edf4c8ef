//! Inbound HTTP surface: `POST /execute` behind API-key auth, plus an
//! unauthenticated `GET /health` for container probes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::warn;

use cw_core::error::WorkerError;
use cw_core::types::Language;
use cw_core::wire::ExecuteRequest;

use crate::service::EvaluationService;

pub struct AppState {
    pub service: Arc<EvaluationService>,
    pub language: Language,
    pub api_header_name: String,
    pub api_key: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/execute", post(execute))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// Validate the shared API key before the request body is even parsed.
async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(state.api_header_name.as_str())
        .and_then(|value| value.to_str().ok());

    if presented != Some(state.api_key.as_str()) {
        warn!("rejected request with missing or invalid API key");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    next.run(request).await
}

/// Acknowledge the job synchronously and evaluate in the background. The
/// result travels over the orchestrator callback, never this response.
async fn execute(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExecuteRequest>,
) -> Response {
    if request.language != state.language {
        let error = WorkerError::LanguageMismatch {
            configured: state.language,
            requested: request.language,
        };
        return problem_response(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string());
    }

    Arc::clone(&state.service).spawn_evaluation(request);
    StatusCode::OK.into_response()
}

/// RFC 7807 error body.
fn problem_response(status: StatusCode, detail: &str) -> Response {
    let body = serde_json::json!({
        "type": "about:blank",
        "title": status.canonical_reason().unwrap_or("error"),
        "status": status.as_u16(),
        "detail": detail,
    });
    (
        status,
        [(header::CONTENT_TYPE, "application/problem+json")],
        body.to_string(),
    )
        .into_response()
}
