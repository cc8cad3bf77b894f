pub mod chat;
pub mod cookie;
pub mod health;
pub mod reset;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::state::{AppState, Sessions};

/// Build the front-door router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/chat", post(chat::chat))
        .route("/reset", post(reset::reset))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Request failures, rendered as `{"detail": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No active session")]
    NoActiveSession,
    #[error("Session store not initialized")]
    StoreNotInitialized,
    #[error(transparent)]
    Internal(#[from] dq_domain::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NoActiveSession => StatusCode::BAD_REQUEST,
            Self::StoreNotInitialized | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            tracing::error!(error = ?e, "request failed");
        }
        let body = serde_json::json!({ "detail": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

fn sessions(state: &AppState) -> Result<&Sessions, ApiError> {
    state.sessions.as_deref().ok_or(ApiError::StoreNotInitialized)
}
