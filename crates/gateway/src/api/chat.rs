use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use super::{cookie, sessions, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub reset_memory: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub status: String,
    pub session_id: String,
}

/// `POST /chat`
///
/// Mints a session cookie on first contact. Agent construction and chat
/// failures are reported in `response` as `Error: ...` with status 200.
pub async fn chat(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<ChatRequest>,
) -> Result<(CookieJar, Json<ChatResponse>), ApiError> {
    let sessions = sessions(&state)?;

    let (token, jar) = match cookie::session_token(&jar) {
        Some(token) => (token, jar),
        None => {
            let token = cookie::mint_token();
            let jar = match cookie::session_cookie(&token, &state.config.sessions) {
                Some(c) => jar.add(c),
                None => jar,
            };
            (token, jar)
        }
    };

    tracing::info!(session_id = %token, "processing chat request");

    let agents = state.agents.clone();
    let id = token.clone();
    let created = sessions
        .get_or_create(&token, || async move { agents.build(&id) })
        .await;

    let response = match created {
        Ok(agent) => {
            if body.reset_memory {
                agent.reset_memory();
            }
            agent.chat(&body.message).await
        }
        Err(e) => {
            tracing::error!(session_id = %token, error = ?e, "agent construction failed");
            format!("Error: {e}")
        }
    };

    Ok((
        jar,
        Json(ChatResponse {
            response,
            status: "success".into(),
            session_id: token,
        }),
    ))
}
