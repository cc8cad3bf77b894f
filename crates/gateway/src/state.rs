use std::sync::Arc;

use dq_domain::config::Config;
use dq_sessions::SessionRegistry;

use crate::agent::{AgentFactory, ConversationalAgent};

pub type Sessions = SessionRegistry<ConversationalAgent>;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// `None` until bootstrap installs the registry; handlers answer 500.
    pub sessions: Option<Arc<Sessions>>,
    pub agents: Arc<AgentFactory>,
}

impl AppState {
    pub fn active_sessions(&self) -> usize {
        self.sessions.as_ref().map_or(0, |s| s.len())
    }
}
