//! MCP streamable-HTTP server.
//!
//! One endpoint (`/mcp`) accepts JSON-RPC messages by POST. `initialize`
//! opens a session and hands its id back in the `mcp-session-id` header;
//! every later message must echo it. Replies are sent as a single SSE event
//! when the client accepts `text/event-stream`, otherwise as plain JSON.
//! `DELETE /mcp` ends a session. Sessions a client never closes are
//! dropped by capacity or idle time.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use dq_domain::config::McpConfig;
use dq_mcp_client::protocol::{
    codes, Implementation, IncomingMessage, InitializeResult, JsonRpcResponse, RequestId,
    ToolCallParams, ToolCallResult, ToolsListResult, PROTOCOL_VERSION, SESSION_HEADER,
};
use dq_sessions::{SessionRegistry, SessionResource};
use serde_json::{json, Value};

use crate::registry::ToolRegistry;

pub const SERVER_NAME: &str = "QAAgentMCPServer";

pub const INSTRUCTIONS: &str = "This server provides domain-specific search and web scraping tools for Q&A agents.
Use search_documentation for fast searches across specific domains.
Use scrape_website for comprehensive page content extraction when search is insufficient.";

/// One open MCP session. Holds nothing that needs releasing.
struct OpenSession;

#[async_trait::async_trait]
impl SessionResource for OpenSession {
    async fn close(&self) -> dq_domain::Result<()> {
        Ok(())
    }
}

/// Shared state behind the `/mcp` routes.
pub struct McpServer {
    tools: ToolRegistry,
    sessions: SessionRegistry<OpenSession>,
}

impl McpServer {
    /// Server with the default session limits.
    pub fn new(tools: ToolRegistry) -> Self {
        let defaults = McpConfig::default();
        Self::with_session_limits(
            tools,
            defaults.max_sessions,
            Some(Duration::from_secs(defaults.session_idle_ttl_secs)),
        )
    }

    /// `idle_ttl = None` keeps sessions until capacity or `DELETE`.
    pub fn with_session_limits(tools: ToolRegistry, max_sessions: usize, idle_ttl: Option<Duration>) -> Self {
        Self {
            tools,
            sessions: SessionRegistry::new(max_sessions, idle_ttl),
        }
    }

    pub fn from_config(tools: ToolRegistry, cfg: &McpConfig) -> Self {
        let ttl = (cfg.session_idle_ttl_secs > 0).then(|| Duration::from_secs(cfg.session_idle_ttl_secs));
        Self::with_session_limits(tools, cfg.max_sessions, ttl)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Forget sessions idle past the TTL. Returns how many were dropped.
    pub async fn sweep_sessions(&self) -> usize {
        self.sessions.sweep_expired().await
    }

    async fn open_session(&self) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        if let Err(never) = self
            .sessions
            .get_or_create(&id, || async { Ok::<_, Infallible>(OpenSession) })
            .await
        {
            match never {}
        }
        tracing::info!(mcp_session = %id, "MCP session opened");
        id
    }

    async fn has_session(&self, id: &str) -> bool {
        self.sessions.get(id).await.is_some()
    }

    /// Handle one request and produce its JSON-RPC response.
    async fn dispatch(&self, id: RequestId, method: &str, params: Option<Value>) -> JsonRpcResponse {
        match method {
            "initialize" => {
                let result = InitializeResult {
                    protocol_version: negotiate_version(params.as_ref()),
                    capabilities: json!({"tools": {"listChanged": false}}),
                    server_info: Implementation {
                        name: SERVER_NAME.into(),
                        version: env!("CARGO_PKG_VERSION").into(),
                    },
                    instructions: Some(INSTRUCTIONS.into()),
                };
                to_response(id, &result)
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => to_response(
                id,
                &ToolsListResult {
                    tools: self.tools.definitions(),
                },
            ),
            "tools/call" => {
                let params: ToolCallParams = match params.map(serde_json::from_value::<ToolCallParams>) {
                    Some(Ok(p)) => p,
                    Some(Err(e)) => {
                        return JsonRpcResponse::failure(Some(id), codes::INVALID_PARAMS, format!("Invalid params: {e}"))
                    }
                    None => {
                        return JsonRpcResponse::failure(Some(id), codes::INVALID_PARAMS, "Invalid params: missing tool name")
                    }
                };
                let outcome = self.tools.call(&params.name, params.arguments).await;
                let is_error = outcome.is_error();
                to_response(id, &ToolCallResult::text(outcome.into_text(), is_error))
            }
            other => JsonRpcResponse::failure(
                Some(id),
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        }
    }
}

/// Accept the client's protocol version when it is one we speak.
fn negotiate_version(params: Option<&Value>) -> String {
    const SUPPORTED: &[&str] = &["2025-03-26", "2024-11-05"];
    params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .filter(|v| SUPPORTED.contains(v))
        .unwrap_or(PROTOCOL_VERSION)
        .to_string()
}

fn to_response<T: serde::Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(v) => JsonRpcResponse::success(id, v),
        Err(e) => JsonRpcResponse::failure(Some(id), codes::INTERNAL_ERROR, e.to_string()),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Routes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/mcp", post(handle_post).get(handle_get).delete(handle_delete))
        .with_state(server)
}

async fn handle_post(State(server): State<Arc<McpServer>>, headers: HeaderMap, body: Bytes) -> Response {
    let sse = accepts_sse(&headers);

    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable MCP message");
            let resp = JsonRpcResponse::failure(None, codes::PARSE_ERROR, format!("Parse error: {e}"));
            return json_reply(StatusCode::BAD_REQUEST, &resp);
        }
    };
    if value.is_array() {
        let resp = JsonRpcResponse::failure(None, codes::INVALID_REQUEST, "Batch requests are not supported");
        return json_reply(StatusCode::BAD_REQUEST, &resp);
    }
    let msg: IncomingMessage = match serde_json::from_value(value) {
        Ok(m) => m,
        Err(e) => {
            let resp = JsonRpcResponse::failure(None, codes::INVALID_REQUEST, format!("Invalid request: {e}"));
            return json_reply(StatusCode::BAD_REQUEST, &resp);
        }
    };

    if msg.method == "initialize" {
        let Some(id) = msg.id else {
            let resp = JsonRpcResponse::failure(None, codes::INVALID_REQUEST, "initialize must be a request");
            return json_reply(StatusCode::BAD_REQUEST, &resp);
        };
        let session = server.open_session().await;
        let resp = server.dispatch(id, &msg.method, msg.params).await;
        let mut reply = rpc_reply(&resp, sse);
        if let Ok(v) = HeaderValue::from_str(&session) {
            reply.headers_mut().insert(SESSION_HEADER, v);
        }
        return reply;
    }

    match session_from(&headers) {
        Some(sid) if server.has_session(sid).await => {}
        Some(sid) => {
            tracing::debug!(mcp_session = %sid, "unknown MCP session");
            let resp = JsonRpcResponse::failure(msg.id, codes::INVALID_REQUEST, "Session not found");
            return json_reply(StatusCode::NOT_FOUND, &resp);
        }
        None => {
            let resp = JsonRpcResponse::failure(msg.id, codes::INVALID_REQUEST, "Bad Request: Missing session ID");
            return json_reply(StatusCode::BAD_REQUEST, &resp);
        }
    }

    // Notifications (including `notifications/initialized`) need no body.
    let Some(id) = msg.id else {
        tracing::debug!(method = %msg.method, "MCP notification");
        return StatusCode::ACCEPTED.into_response();
    };

    let resp = server.dispatch(id, &msg.method, msg.params).await;
    rpc_reply(&resp, sse)
}

async fn handle_get() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response()
}

async fn handle_delete(State(server): State<Arc<McpServer>>, headers: HeaderMap) -> Response {
    let Some(sid) = session_from(&headers) else {
        return (StatusCode::BAD_REQUEST, "Bad Request: Missing session ID").into_response();
    };
    if server.sessions.remove(sid).await {
        tracing::info!(mcp_session = %sid, "MCP session closed");
        StatusCode::OK.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

fn session_from(headers: &HeaderMap) -> Option<&str> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok())
}

fn accepts_sse(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"))
}

fn rpc_reply(resp: &JsonRpcResponse, sse: bool) -> Response {
    if !sse {
        return json_reply(StatusCode::OK, resp);
    }
    match serde_json::to_string(resp) {
        Ok(data) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from(format!("event: message\ndata: {data}\n\n")))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

fn json_reply(status: StatusCode, resp: &JsonRpcResponse) -> Response {
    (status, axum::Json(resp)).into_response()
}
