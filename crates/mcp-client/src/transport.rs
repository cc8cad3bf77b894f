//! MCP transport layer.
//!
//! The tool server speaks MCP's streamable-HTTP transport: each JSON-RPC
//! message is POSTed to a single endpoint. A request's reply arrives either
//! as an `application/json` body or as a `text/event-stream` whose `data:`
//! events carry JSON-RPC messages, one of which answers the request.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;

use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId, SESSION_HEADER};
use crate::sse::drain_data_lines;

/// Trait for MCP server transports.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a JSON-RPC request and wait for the corresponding response.
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse, TransportError>;

    /// Send a JSON-RPC notification (no response expected).
    async fn send_notification(&self, method: &str) -> Result<(), TransportError>;

    /// Check if the transport is still usable.
    fn is_alive(&self) -> bool;

    /// Shut down the transport gracefully.
    async fn shutdown(&self);
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("MCP session expired or unknown to the server")]
    SessionExpired,

    #[error("stream ended before a response to request {0} arrived")]
    MissingResponse(RequestId),

    #[error("unexpected content type: {0}")]
    UnexpectedContentType(String),

    #[error("timeout waiting for response")]
    Timeout,

    #[error("transport has been shut down")]
    Closed,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Http(e.to_string())
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streamable HTTP transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Streamable-HTTP transport bound to one MCP endpoint URL.
///
/// The session id handed out by the server on `initialize` is echoed on
/// every later request. Requests are independent HTTP calls, so concurrent
/// callers never see each other's responses.
///
/// Handshake and housekeeping requests are bounded by `request_timeout`.
/// `tools/call` is bounded by `read_timeout` instead, since the server may
/// spend a browser render or a summarizer call before it answers.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    request_timeout: Duration,
    read_timeout: Duration,
    session_id: Mutex<Option<String>>,
    next_id: AtomicU64,
    alive: AtomicBool,
}

impl HttpTransport {
    /// Create a transport; no I/O happens until the first message.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(TransportError::from)?;
        Ok(Self {
            client,
            url: url.into(),
            request_timeout: timeout,
            read_timeout: timeout,
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(1),
            alive: AtomicBool::new(true),
        })
    }

    /// Bound `tools/call` replies by `timeout` rather than the request timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Session id assigned by the server, once `initialize` has completed.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    /// Get the next unique request ID.
    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn timeout_for(&self, method: &str) -> Duration {
        if method == "tools/call" {
            self.read_timeout
        } else {
            self.request_timeout
        }
    }

    async fn post(&self, body: &impl serde::Serialize, timeout: Duration) -> Result<reqwest::Response, TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let mut req = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .timeout(timeout)
            .json(body);
        if let Some(sid) = self.session_id() {
            req = req.header(SESSION_HEADER, sid);
        }

        let resp = req.send().await?;
        self.remember_session(resp.headers());

        let status = resp.status();
        if status == StatusCode::NOT_FOUND && self.session_id().is_some() {
            return Err(TransportError::SessionExpired);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    fn remember_session(&self, headers: &HeaderMap) {
        if let Some(sid) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
            let mut slot = self.session_id.lock();
            if slot.as_deref() != Some(sid) {
                tracing::debug!(session = %sid, "MCP session assigned");
                *slot = Some(sid.to_string());
            }
        }
    }

    /// Read an SSE reply until the response carrying `id` arrives.
    async fn read_sse_response(
        &self,
        mut resp: reqwest::Response,
        id: &RequestId,
    ) -> Result<JsonRpcResponse, TransportError> {
        let mut buffer: Vec<u8> = Vec::new();
        loop {
            let chunk = resp.chunk().await?;
            let Some(bytes) = chunk else {
                // Flush a final event that lacked the trailing blank line.
                buffer.extend_from_slice(b"\n\n");
                for data in drain_data_lines(&mut buffer) {
                    if let Some(found) = match_response(&data, id) {
                        return Ok(found);
                    }
                }
                return Err(TransportError::MissingResponse(id.clone()));
            };
            buffer.extend_from_slice(&bytes);
            for data in drain_data_lines(&mut buffer) {
                if let Some(found) = match_response(&data, id) {
                    return Ok(found);
                }
            }
        }
    }
}

/// Parse one SSE payload and keep it only if it answers `id`.
///
/// Servers may interleave notifications or requests of their own; those
/// are skipped.
fn match_response(data: &str, id: &RequestId) -> Option<JsonRpcResponse> {
    match serde_json::from_str::<JsonRpcResponse>(data) {
        Ok(resp) if resp.id.as_ref() == Some(id) => Some(resp),
        Ok(resp) => {
            tracing::debug!(expected_id = %id, got_id = ?resp.id, "skipping response for different request");
            None
        }
        Err(_) => {
            tracing::debug!(data = %data, "skipping non-response message from MCP server");
            None
        }
    }
}

fn content_type(resp: &reqwest::Response) -> String {
    resp.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase()
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse, TransportError> {
        let id = RequestId::from(self.next_request_id());
        let req = JsonRpcRequest::new(id.clone(), method, params);

        tracing::debug!(id = %id, method, "sending MCP request");
        let resp = self.post(&req, self.timeout_for(method)).await?;

        let ctype = content_type(&resp);
        if ctype.starts_with("text/event-stream") {
            self.read_sse_response(resp, &id).await
        } else if ctype.starts_with("application/json") {
            let body = resp.text().await?;
            let parsed: JsonRpcResponse = serde_json::from_str(&body)?;
            if parsed.id.as_ref() != Some(&id) && parsed.id.is_some() {
                return Err(TransportError::MissingResponse(id));
            }
            Ok(parsed)
        } else {
            Err(TransportError::UnexpectedContentType(ctype))
        }
    }

    async fn send_notification(&self, method: &str) -> Result<(), TransportError> {
        let notif = JsonRpcNotification::new(method);
        tracing::debug!(method, "sending MCP notification");
        self.post(&notif, self.request_timeout).await.map(|_| ())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        let Some(sid) = self.session_id.lock().take() else {
            return;
        };
        // Servers may answer 405 when they do not support explicit
        // termination; either way the session is ours to forget.
        match self
            .client
            .delete(&self.url)
            .header(SESSION_HEADER, &sid)
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(resp) => {
                tracing::debug!(session = %sid, status = resp.status().as_u16(), "MCP session terminated");
            }
            Err(e) => {
                tracing::debug!(session = %sid, error = %e, "error terminating MCP session");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_response_filters_by_id() {
        let id = RequestId::from(3);
        let other = r#"{"jsonrpc":"2.0","id":2,"result":{}}"#;
        let notif = r#"{"jsonrpc":"2.0","method":"notifications/progress","params":{}}"#;
        let ours = r#"{"jsonrpc":"2.0","id":3,"result":{"ok":true}}"#;
        assert!(match_response(other, &id).is_none());
        assert!(match_response(notif, &id).is_none());
        let resp = match_response(ours, &id).unwrap();
        assert_eq!(resp.result.unwrap()["ok"], true);
    }

    #[test]
    fn tool_calls_use_the_read_timeout() {
        let t = HttpTransport::new("http://127.0.0.1:9/mcp", Duration::from_secs(30))
            .unwrap()
            .with_read_timeout(Duration::from_secs(300));
        assert_eq!(t.timeout_for("tools/call"), Duration::from_secs(300));
        assert_eq!(t.timeout_for("tools/list"), Duration::from_secs(30));
        assert_eq!(t.timeout_for("initialize"), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn closed_transport_refuses_requests() {
        let t = HttpTransport::new("http://127.0.0.1:9/mcp", Duration::from_secs(1)).unwrap();
        t.shutdown().await;
        assert!(!t.is_alive());
        let err = t.send_request("ping", None).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn unreachable_server_is_http_error() {
        let t = HttpTransport::new("http://127.0.0.1:9/mcp", Duration::from_secs(2)).unwrap();
        let err = t.send_request("initialize", None).await.unwrap_err();
        assert!(matches!(err, TransportError::Http(_) | TransportError::Timeout));
    }
}
