//! Per-session conversational agent.
//!
//! An agent owns its conversation history and, after the first chat, one
//! tool-server session. Errors never escape [`ConversationalAgent::chat`];
//! they are logged and returned as `Error: ...` answers.

pub mod connector;
pub mod react;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dq_domain::config::AgentConfig;
use dq_domain::error::Result;
use dq_domain::tool::Message;
use dq_providers::LlmProvider;
use dq_sessions::{ConversationHistory, SessionResource};
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::catalog::Catalog;
use crate::prompt;
use connector::{ToolConnector, ToolSession};
use react::{ActionParser, ReasoningLoop};

/// State established on the first chat.
struct Ready {
    tools: Arc<dyn ToolSession>,
    tool_names: Vec<String>,
    system_prompt: String,
}

pub struct ConversationalAgent {
    session_id: String,
    catalog: Catalog,
    provider: Arc<dyn LlmProvider>,
    connector: Arc<dyn ToolConnector>,
    parser: Arc<ActionParser>,
    max_iterations: usize,
    history_window: usize,
    ready: OnceCell<Ready>,
    history: Mutex<ConversationHistory>,
    closed: AtomicBool,
}

impl ConversationalAgent {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Answer one user message. Never fails; errors become the answer text.
    pub async fn chat(&self, text: &str) -> String {
        match self.try_chat(text).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(session_id = %self.session_id, error = ?e, "chat failed");
                format!("Error: {e}")
            }
        }
    }

    async fn try_chat(&self, text: &str) -> Result<String> {
        let ready = self.ready().await?;

        let mut prefix = vec![Message::system(ready.system_prompt.clone())];
        prefix.extend(self.history.lock().recent(self.history_window));

        let outcome = ReasoningLoop {
            provider: &self.provider,
            tools: ready.tools.as_ref(),
            tool_names: &ready.tool_names,
            parser: &self.parser,
            max_iterations: self.max_iterations,
        }
        .run(&prefix, text)
        .await?;

        tracing::debug!(
            session_id = %self.session_id,
            iterations = outcome.iterations,
            "chat answered"
        );
        self.history.lock().push_exchange(text, outcome.answer.as_str());
        Ok(outcome.answer)
    }

    /// Connect to the tool server once; concurrent first chats share the
    /// attempt and a failed attempt is retried by the next chat.
    async fn ready(&self) -> Result<&Ready> {
        self.ready
            .get_or_try_init(|| async {
                let tools = self.connector.connect().await?;
                let defs = tools.tools();
                let system_prompt = prompt::system_prompt(&self.catalog, &defs);
                let tool_names = defs.into_iter().map(|d| d.name).collect::<Vec<_>>();
                tracing::info!(
                    session_id = %self.session_id,
                    tools = ?tool_names,
                    "agent connected to tool server"
                );
                Ok(Ready {
                    tools,
                    tool_names,
                    system_prompt,
                })
            })
            .await
    }

    pub fn reset_memory(&self) {
        self.history.lock().clear();
        tracing::info!(session_id = %self.session_id, "conversation memory reset");
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    /// Release the tool-server session, if one was opened.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(ready) = self.ready.get() {
            ready.tools.close().await;
        }
    }
}

#[async_trait]
impl SessionResource for ConversationalAgent {
    async fn close(&self) -> Result<()> {
        ConversationalAgent::close(self).await;
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Factory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Builds agents for new sessions from process-wide parts.
pub struct AgentFactory {
    config: AgentConfig,
    provider: Arc<dyn LlmProvider>,
    connector: Arc<dyn ToolConnector>,
    parser: Arc<ActionParser>,
}

impl AgentFactory {
    pub fn new(
        config: AgentConfig,
        provider: Arc<dyn LlmProvider>,
        connector: Arc<dyn ToolConnector>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            provider,
            connector,
            parser: Arc::new(ActionParser::new()?),
        })
    }

    /// Load the catalog and assemble an agent. No network I/O happens here.
    pub fn build(&self, session_id: &str) -> Result<ConversationalAgent> {
        let catalog = Catalog::load(&self.config.sites_csv_path)?;
        Ok(ConversationalAgent {
            session_id: session_id.to_string(),
            catalog,
            provider: self.provider.clone(),
            connector: self.connector.clone(),
            parser: self.parser.clone(),
            max_iterations: self.config.max_iterations,
            history_window: self.config.history_window,
            ready: OnceCell::new(),
            history: Mutex::new(ConversationHistory::new()),
            closed: AtomicBool::new(false),
        })
    }
}
