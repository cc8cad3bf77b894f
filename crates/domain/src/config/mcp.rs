//! MCP (Model Context Protocol) configuration.
//!
//! One section covers both ends of the connection: the URL the gateway's
//! agents dial and the address the tool server binds.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Streamable-HTTP endpoint of the tool server.
    #[serde(default = "d_server_url")]
    pub server_url: String,
    /// Per-request timeout for MCP calls and other outbound HTTP.
    #[serde(default = "d_30")]
    pub request_timeout_secs: u64,
    /// Upper bound on a `tools/call` reply. Covers the tool server's own
    /// work: a browser render, a search, and an optional summary.
    #[serde(default = "d_300")]
    pub read_timeout_secs: u64,
    /// Open MCP sessions the tool server keeps; the least recently used
    /// is dropped past this.
    #[serde(default = "d_2000")]
    pub max_sessions: usize,
    /// Idle time after which the tool server forgets an MCP session a
    /// client never closed. 0 disables expiry.
    #[serde(default = "d_7200")]
    pub session_idle_ttl_secs: u64,
    /// Bind host for the tool server.
    #[serde(default = "d_host")]
    pub host: String,
    /// Bind port for the tool server.
    #[serde(default = "d_8001")]
    pub port: u16,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server_url: d_server_url(),
            request_timeout_secs: d_30(),
            read_timeout_secs: d_300(),
            max_sessions: d_2000(),
            session_idle_ttl_secs: d_7200(),
            host: d_host(),
            port: d_8001(),
        }
    }
}

fn d_server_url() -> String {
    "http://127.0.0.1:8001/mcp".into()
}
fn d_30() -> u64 {
    30
}
fn d_300() -> u64 {
    300
}
fn d_2000() -> usize {
    2000
}
fn d_7200() -> u64 {
    7200
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_8001() -> u16 {
    8001
}
