//! Test doubles for the agent seams.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dq_domain::error::{Error, Result};
use dq_domain::tool::{ToolCall, ToolDefinition};
use dq_providers::{ChatRequest, ChatResponse, LlmProvider};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Replies from a fixed script and records every request.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().push(req.clone());
        let content = self.replies.lock().pop_front().ok_or_else(|| Error::Provider {
            provider: "scripted".into(),
            message: "script exhausted".into(),
        })?;
        Ok(ChatResponse {
            content,
            usage: None,
            model: "scripted".into(),
            finish_reason: Some("stop".into()),
        })
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

/// Tool session that answers every call with the same text.
pub struct RecordingTools {
    output: Option<String>,
    calls: Mutex<Vec<ToolCall>>,
    closes: AtomicUsize,
}

impl RecordingTools {
    pub fn new(output: &str) -> Self {
        Self {
            output: Some(output.to_string()),
            calls: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        }
    }

    /// Every call fails at the transport level.
    pub fn failing() -> Self {
        Self {
            output: None,
            ..Self::new("")
        }
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl super::connector::ToolSession for RecordingTools {
    fn tools(&self) -> Vec<ToolDefinition> {
        ["search_documentation", "scrape_website"]
            .into_iter()
            .map(|name| ToolDefinition {
                name: name.into(),
                description: format!("{name} test double"),
                parameters: json!({"type": "object", "properties": {}}),
            })
            .collect()
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<String> {
        self.calls.lock().push(ToolCall {
            tool_name: name.into(),
            arguments,
        });
        self.output
            .clone()
            .ok_or_else(|| Error::Mcp("connection reset".into()))
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
