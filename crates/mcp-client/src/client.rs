//! MCP client: one connection to one tool server: handshake, tool
//! discovery, and dispatch.

use std::time::Duration;

use serde_json::Value;

use crate::protocol::{
    self, InitializeResult, McpToolDef, ToolCallParams, ToolCallResult, ToolsListResult,
};
use crate::transport::{HttpTransport, McpTransport, TransportError};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// McpClient
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An initialized connection to an MCP server.
pub struct McpClient {
    /// Server identity and instructions from `initialize`.
    pub server: InitializeResult,
    /// Tools discovered via `tools/list`.
    tools: Vec<McpToolDef>,
    transport: Box<dyn McpTransport>,
}

impl McpClient {
    /// Connect over streamable HTTP, perform the MCP handshake, and
    /// discover tools.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, McpError> {
        Self::connect_with_read_timeout(url, timeout, timeout).await
    }

    /// Like [`connect`](Self::connect), with a separate bound on how long a
    /// `tools/call` reply may take.
    pub async fn connect_with_read_timeout(
        url: &str,
        timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, McpError> {
        tracing::info!(url = %url, read_timeout_secs = read_timeout.as_secs(), "connecting to MCP server");
        let transport = HttpTransport::new(url, timeout)?.with_read_timeout(read_timeout);
        Self::initialize(Box::new(transport)).await
    }

    /// Run the handshake over an arbitrary transport.
    pub async fn initialize(transport: Box<dyn McpTransport>) -> Result<Self, McpError> {
        // Step 1: Send `initialize` request.
        let init_params = protocol::initialize_params();
        let params_value = serde_json::to_value(&init_params)
            .map_err(|e| McpError::Protocol(format!("failed to serialize initialize params: {e}")))?;

        let resp = transport
            .send_request("initialize", Some(params_value))
            .await?;

        let result = resp
            .into_result()
            .map_err(|err| McpError::Protocol(format!("initialize failed: {err}")))?;
        let server: InitializeResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("failed to parse initialize result: {e}")))?;

        tracing::debug!(
            server = %server.server_info.name,
            protocol_version = %server.protocol_version,
            "MCP initialize response received"
        );

        // Step 2: Send `notifications/initialized` notification.
        transport
            .send_notification("notifications/initialized")
            .await?;

        // Step 3: Discover tools via `tools/list`.
        let tools_resp = transport.send_request("tools/list", None).await?;
        let tools = match tools_resp.into_result() {
            Ok(value) => serde_json::from_value::<ToolsListResult>(value)
                .map_err(|e| McpError::Protocol(format!("failed to parse tools/list result: {e}")))?
                .tools,
            Err(err) => return Err(McpError::Protocol(format!("tools/list failed: {err}"))),
        };

        tracing::info!(
            server = %server.server_info.name,
            tool_count = tools.len(),
            tools = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "MCP server initialized"
        );

        Ok(Self {
            server,
            tools,
            transport,
        })
    }

    /// Tools advertised by the server at connect time.
    pub fn tools(&self) -> &[McpToolDef] {
        &self.tools
    }

    /// Check if the transport is still usable.
    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    /// Call a tool on the server.
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        if !self.transport.is_alive() {
            return Err(McpError::ServerDown(self.server.server_info.name.clone()));
        }

        let params = serde_json::to_value(ToolCallParams {
            name: tool_name.to_string(),
            arguments,
        })
        .map_err(|e| McpError::Protocol(format!("failed to serialize tools/call params: {e}")))?;

        let resp = self
            .transport
            .send_request("tools/call", Some(params))
            .await?;

        let result_value = resp
            .into_result()
            .map_err(|err| McpError::Protocol(format!("tools/call failed: {err}")))?;
        serde_json::from_value::<ToolCallResult>(result_value)
            .map_err(|e| McpError::Protocol(format!("failed to parse tools/call result: {e}")))
    }

    /// End the MCP session. Safe to call more than once.
    pub async fn close(&self) {
        tracing::info!(server = %self.server.server_info.name, "closing MCP connection");
        self.transport.shutdown().await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Errors specific to MCP operations.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("MCP transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("MCP server is down: {0}")]
    ServerDown(String),
}

impl From<McpError> for dq_domain::error::Error {
    fn from(e: McpError) -> Self {
        match e {
            McpError::Transport(TransportError::Timeout) => {
                dq_domain::error::Error::Timeout("MCP request".into())
            }
            other => dq_domain::error::Error::Mcp(other.to_string()),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{JsonRpcResponse, RequestId};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    /// Transport that answers from a fixed script and records traffic.
    struct ScriptedTransport {
        log: Arc<Mutex<Vec<String>>>,
        tools_error: bool,
    }

    #[async_trait]
    impl McpTransport for ScriptedTransport {
        async fn send_request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse, TransportError> {
            self.log.lock().push(method.to_string());
            let id = RequestId::from(1);
            Ok(match method {
                "initialize" => JsonRpcResponse::success(
                    id,
                    json!({
                        "protocolVersion": "2025-03-26",
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": "fake", "version": "0"},
                        "instructions": "be nice"
                    }),
                ),
                "tools/list" if self.tools_error => {
                    JsonRpcResponse::failure(Some(id), -32603, "boom")
                }
                "tools/list" => JsonRpcResponse::success(
                    id,
                    json!({"tools": [{"name": "echo", "description": "Echo", "inputSchema": {"type": "object"}}]}),
                ),
                "tools/call" => {
                    let params = params.unwrap_or(Value::Null);
                    let text = params["arguments"]["text"].as_str().unwrap_or("").to_string();
                    JsonRpcResponse::success(id, json!({"content": [{"type": "text", "text": text}]}))
                }
                _ => JsonRpcResponse::failure(Some(id), -32601, "Method not found"),
            })
        }

        async fn send_notification(&self, method: &str) -> Result<(), TransportError> {
            self.log.lock().push(format!("notify:{method}"));
            Ok(())
        }

        fn is_alive(&self) -> bool {
            true
        }

        async fn shutdown(&self) {
            self.log.lock().push("shutdown".into());
        }
    }

    #[tokio::test]
    async fn handshake_order_and_tool_discovery() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let client = McpClient::initialize(Box::new(ScriptedTransport {
            log: log.clone(),
            tools_error: false,
        }))
        .await
        .unwrap();

        assert_eq!(
            *log.lock(),
            vec!["initialize", "notify:notifications/initialized", "tools/list"]
        );
        assert_eq!(client.server.server_info.name, "fake");
        assert_eq!(client.server.instructions.as_deref(), Some("be nice"));
        assert_eq!(client.tools().len(), 1);
        assert_eq!(client.tools()[0].name, "echo");

        let result = client.call_tool("echo", json!({"text": "hi"})).await.unwrap();
        assert_eq!(result.joined_text(), "hi");

        client.close().await;
        assert_eq!(log.lock().last().map(String::as_str), Some("shutdown"));
    }

    #[tokio::test]
    async fn tools_list_error_fails_initialize() {
        let err = McpClient::initialize(Box::new(ScriptedTransport {
            log: Arc::new(Mutex::new(Vec::new())),
            tools_error: true,
        }))
        .await
        .err()
        .expect("initialize should fail");
        assert!(err.to_string().contains("tools/list failed"));
    }

    #[test]
    fn mcp_error_maps_into_domain_error() {
        let e: dq_domain::error::Error = McpError::Protocol("bad".into()).into();
        assert!(matches!(e, dq_domain::error::Error::Mcp(_)));
        let e: dq_domain::error::Error = McpError::Transport(TransportError::Timeout).into();
        assert!(matches!(e, dq_domain::error::Error::Timeout(_)));
    }
}
