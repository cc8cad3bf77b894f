//! AppState construction and background-task spawning extracted from `main.rs`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use dq_domain::config::Config;
use dq_providers::{GoogleProvider, LlmProvider};
use dq_sessions::SessionRegistry;

use crate::agent::connector::{McpConnector, ToolConnector};
use crate::agent::AgentFactory;
use crate::catalog::Catalog;
use crate::state::AppState;

/// How often idle sessions are swept when no request triggers expiry.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Wire the production LLM provider and MCP connector into an [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let provider: Arc<dyn LlmProvider> = Arc::new(
        GoogleProvider::from_config(&config.llm).context("initializing Gemini provider")?,
    );
    tracing::info!(model = %config.llm.model, "LLM provider ready");

    let connector: Arc<dyn ToolConnector> = Arc::new(McpConnector::from_config(&config.mcp));
    tracing::info!(url = %config.mcp.server_url, "tool server configured");

    build_app_state_with(config, provider, connector)
}

/// Same as [`build_app_state`] with caller-supplied seams.
pub fn build_app_state_with(
    config: Arc<Config>,
    provider: Arc<dyn LlmProvider>,
    connector: Arc<dyn ToolConnector>,
) -> anyhow::Result<AppState> {
    // Agents reload the catalog on construction; check it once up front so
    // a bad file shows in the startup log rather than only in answers.
    match Catalog::load(&config.agent.sites_csv_path) {
        Ok(catalog) => tracing::info!(domains = ?catalog.domains(), "knowledge catalog ok"),
        Err(e) => tracing::warn!(error = %e, "knowledge catalog unusable; chats will report it"),
    }

    let agents = Arc::new(
        AgentFactory::new(config.agent.clone(), provider, connector)
            .context("building agent factory")?,
    );

    let ttl = match config.sessions.idle_ttl_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let sessions = Arc::new(SessionRegistry::new(config.sessions.max_active, ttl));
    tracing::info!(
        max_active = config.sessions.max_active,
        idle_ttl_secs = config.sessions.idle_ttl_secs,
        "session registry ready"
    );

    Ok(AppState {
        config,
        sessions: Some(sessions),
        agents,
    })
}

pub fn spawn_background_tasks(state: &AppState) {
    // ── Periodic idle-session sweep ──────────────────────────────────
    if let Some(sessions) = state.sessions.clone() {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let closed = sessions.sweep_expired().await;
                if closed > 0 {
                    tracing::info!(closed, remaining = sessions.len(), "idle sessions swept");
                }
            }
        });
    }
}
