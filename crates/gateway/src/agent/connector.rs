//! Tool-server connection seam.
//!
//! The agent only sees [`ToolConnector`] and [`ToolSession`]; production
//! wires [`McpConnector`], tests substitute in-memory doubles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dq_domain::config::McpConfig;
use dq_domain::error::Result;
use dq_domain::tool::ToolDefinition;
use dq_mcp_client::McpClient;
use serde_json::Value;

/// An open connection to a tool server.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Tools discovered at connect time.
    fn tools(&self) -> Vec<ToolDefinition>;

    /// Invoke `name` and return its text output. Tool-level failures come
    /// back as text; only transport problems are errors.
    async fn call(&self, name: &str, arguments: Value) -> Result<String>;

    /// End the session. Best effort and idempotent.
    async fn close(&self);
}

/// Opens [`ToolSession`]s.
#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ToolSession>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MCP over streamable HTTP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct McpConnector {
    url: String,
    timeout: Duration,
    read_timeout: Duration,
}

impl McpConnector {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            read_timeout: timeout,
        }
    }

    /// Allow `tools/call` replies up to `timeout`.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn from_config(cfg: &McpConfig) -> Self {
        Self::new(
            cfg.server_url.clone(),
            Duration::from_secs(cfg.request_timeout_secs),
        )
        .with_read_timeout(Duration::from_secs(cfg.read_timeout_secs))
    }
}

#[async_trait]
impl ToolConnector for McpConnector {
    async fn connect(&self) -> Result<Arc<dyn ToolSession>> {
        let client = McpClient::connect_with_read_timeout(&self.url, self.timeout, self.read_timeout).await?;
        Ok(Arc::new(McpSession { client }))
    }
}

struct McpSession {
    client: McpClient,
}

#[async_trait]
impl ToolSession for McpSession {
    fn tools(&self) -> Vec<ToolDefinition> {
        self.client.tools().iter().cloned().map(Into::into).collect()
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<String> {
        let result = self.client.call_tool(name, arguments).await?;
        if result.is_error {
            tracing::debug!(tool = %name, "tool reported an error result");
        }
        Ok(result.joined_text())
    }

    async fn close(&self) {
        self.client.close().await;
    }
}
