use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

pub const API_VERSION: &str = "1.0.0";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    message: &'static str,
    status: &'static str,
    version: &'static str,
    active_sessions: usize,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Domain Q&A Agent API is running",
        status: "healthy",
        version: API_VERSION,
        active_sessions: state.active_sessions(),
    })
}
