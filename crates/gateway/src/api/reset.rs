use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde_json::{json, Value};

use super::{cookie, sessions, ApiError};
use crate::state::AppState;

/// `POST /reset`
///
/// Clears the caller's history. An unknown token gets a fresh agent, which
/// is cheap: the tool connection opens on first chat.
pub async fn reset(State(state): State<AppState>, jar: CookieJar) -> Result<Json<Value>, ApiError> {
    let token = cookie::session_token(&jar).ok_or(ApiError::NoActiveSession)?;
    let sessions = sessions(&state)?;

    let agents = state.agents.clone();
    let id = token.clone();
    let agent = sessions
        .get_or_create(&token, || async move { agents.build(&id) })
        .await?;
    agent.reset_memory();
    tracing::info!(session_id = %token, "memory reset via endpoint");

    Ok(Json(json!({
        "message": "Conversation memory has been reset",
        "status": "success",
    })))
}
