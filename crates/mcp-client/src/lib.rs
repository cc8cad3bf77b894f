//! `dq-mcp-client`: MCP (Model Context Protocol) client for DocQA.
//!
//! This crate provides:
//! - JSON-RPC 2.0 protocol types shared by the client and the tool server.
//! - A streamable-HTTP transport: every message is an HTTP POST whose reply
//!   is either a JSON body or an SSE stream carrying the response.
//! - An `McpClient` that performs the handshake, caches the tool list,
//!   and dispatches `tools/call`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dq_mcp_client::McpClient;
//!
//! let client = McpClient::connect("http://127.0.0.1:8001/mcp", Duration::from_secs(30)).await?;
//! for tool in client.tools() {
//!     println!("{}", tool.name);
//! }
//! let result = client.call_tool("search_documentation", json!({"query": "axum", "sites": ["docs.rs"]})).await?;
//! client.close().await;
//! ```

pub mod client;
pub mod protocol;
pub(crate) mod sse;
pub mod transport;

// Re-exports for convenience.
pub use client::{McpClient, McpError};
pub use protocol::{McpToolDef, ToolCallResult};
pub use transport::{HttpTransport, McpTransport, TransportError};
