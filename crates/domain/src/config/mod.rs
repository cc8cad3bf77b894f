mod agent;
mod env;
mod llm;
mod mcp;
mod scrape;
mod search;
mod server;
mod sessions;

pub use agent::*;
pub use llm::*;
pub use mcp::*;
pub use scrape::*;
pub use search::*;
pub use server::*;
pub use sessions::*;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use env::EnvOverlay;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Environment variable naming an optional TOML config file.
pub const CONFIG_PATH_ENV: &str = "DOCQA_CONFIG";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Loading
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Config {
    /// Load defaults, then `$DOCQA_CONFIG` (if set), then `.env` and the
    /// process environment.
    ///
    /// Returns the overlay warnings alongside the config so callers can
    /// report them together with [`Config::validate`] issues.
    pub fn load() -> Result<(Config, Vec<ConfigError>)> {
        // A missing .env is the normal case in production.
        let _ = dotenvy::dotenv();

        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Config::from_file(Path::new(path.trim()))?,
            _ => Config::default(),
        };
        let warnings = config.apply_env();
        Ok((config, warnings))
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Vec<ConfigError> {
        self.apply_env_with(&|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary lookup. Invalid values keep the
    /// current setting and are reported as warnings.
    pub fn apply_env_with(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Vec<ConfigError> {
        let mut env = EnvOverlay::new(lookup);

        env.opt_string("GOOGLE_API_KEY", &mut self.llm.google_api_key);
        env.string("LLM_MODEL", &mut self.llm.model);
        env.parse("LLM_TEMPERATURE", &mut self.llm.temperature);
        env.parse("LLM_MAX_TOKENS", &mut self.llm.max_tokens);
        env.parse("LLM_TIMEOUT", &mut self.llm.timeout_secs);
        env.string("GEMINI_BASE_URL", &mut self.llm.base_url);
        env.string("SUMMARIZER_MODEL", &mut self.llm.summarizer_model);

        env.string("MCP_SERVER_URL", &mut self.mcp.server_url);
        env.parse("REQUEST_TIMEOUT", &mut self.mcp.request_timeout_secs);
        env.parse("MCP_READ_TIMEOUT", &mut self.mcp.read_timeout_secs);
        env.parse("MCP_MAX_SESSIONS", &mut self.mcp.max_sessions);
        env.parse("MCP_SESSION_IDLE_TTL", &mut self.mcp.session_idle_ttl_secs);
        env.string("MCP_HOST", &mut self.mcp.host);
        env.parse("MCP_PORT", &mut self.mcp.port);

        env.string("HOST", &mut self.server.host);
        env.parse("PORT", &mut self.server.port);

        env.opt_string("TAVILY_API_KEY", &mut self.search.tavily_api_key);
        env.string("TAVILY_BASE_URL", &mut self.search.base_url);
        env.parse("MAX_RESULTS", &mut self.search.max_results);
        env.parse("SEARCH_DEPTH", &mut self.search.depth);
        env.parse("MAX_CONTENT_SIZE", &mut self.search.max_content_size);
        env.flag("ENABLE_SEARCH_SUMMARIZATION", &mut self.search.enable_summarization);

        env.parse("SCRAPE_BACKEND", &mut self.scrape.backend);
        env.string("CHROMIUM_PATH", &mut self.scrape.chromium_path);
        env.parse("SCRAPE_TIMEOUT_SECS", &mut self.scrape.timeout_secs);
        env.parse("MAX_SCRAPE_LENGTH", &mut self.scrape.max_scrape_length);

        env.parse("SESSION_MAX_ACTIVE", &mut self.sessions.max_active);
        env.parse("SESSION_IDLE_TTL_SECS", &mut self.sessions.idle_ttl_secs);
        env.parse("SESSION_COOKIE_MAX_AGE", &mut self.sessions.cookie_max_age_secs);
        env.flag("SESSION_COOKIE_SECURE", &mut self.sessions.cookie_secure);

        let mut csv_path = self.agent.sites_csv_path.display().to_string();
        env.string("SITES_CSV_PATH", &mut csv_path);
        self.agent.sites_csv_path = PathBuf::from(csv_path);
        env.parse("AGENT_MAX_ITERATIONS", &mut self.agent.max_iterations);
        env.parse("AGENT_HISTORY_WINDOW", &mut self.agent.history_window);

        env.issues
    }

    /// JSON view of the config with every `*_api_key` entry removed,
    /// suitable for logging.
    pub fn redacted(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        strip_api_keys(&mut value);
        value
    }
}

fn strip_api_keys(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.retain(|k, _| !k.ends_with("_api_key"));
            for v in map.values_mut() {
                strip_api_keys(v);
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(strip_api_keys),
        _ => {}
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

/// Which binary is validating; each needs a different credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Gateway,
    ToolServer,
}

impl Config {
    /// Longest a single tool call may legitimately take on the tool server:
    /// a browser render, or a search followed by an optional summary.
    pub fn tool_call_budget_secs(&self) -> u64 {
        let summary = if self.search.enable_summarization {
            self.llm.timeout_secs
        } else {
            0
        };
        self.scrape
            .timeout_secs
            .max(self.mcp.request_timeout_secs + summary)
    }

    /// Validate the configuration for `component` and return a list of
    /// issues. Empty when everything looks good.
    pub fn validate(&self, component: Component) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        match component {
            Component::Gateway => {
                if self.llm.usable_api_key().is_none() {
                    errors.push(ConfigError::error(
                        "GOOGLE_API_KEY",
                        "GOOGLE_API_KEY environment variable is required for the client LLM",
                    ));
                }
                if self.server.port == 0 {
                    errors.push(ConfigError::error("server.port", "port must be greater than 0"));
                }
                if self.server.host.is_empty() {
                    errors.push(ConfigError::error("server.host", "host must not be empty"));
                }
                if !self.mcp.server_url.starts_with("http://")
                    && !self.mcp.server_url.starts_with("https://")
                {
                    errors.push(ConfigError::error(
                        "MCP_SERVER_URL",
                        format!("'{}' is not an http(s) URL", self.mcp.server_url),
                    ));
                }
                if self.agent.max_iterations == 0 {
                    errors.push(ConfigError::error(
                        "agent.max_iterations",
                        "must be at least 1",
                    ));
                }
                if self.sessions.max_active == 0 {
                    errors.push(ConfigError::error(
                        "sessions.max_active",
                        "must be at least 1",
                    ));
                }
                let tool_budget = self.tool_call_budget_secs();
                if self.mcp.read_timeout_secs < tool_budget {
                    errors.push(ConfigError::warning(
                        "MCP_READ_TIMEOUT",
                        format!(
                            "{}s is below the tool server's own budget of {tool_budget}s; slow tool calls will time out in the gateway",
                            self.mcp.read_timeout_secs
                        ),
                    ));
                }
                if self.sessions.idle_ttl_secs == 0 {
                    errors.push(ConfigError::warning(
                        "sessions.idle_ttl_secs",
                        "idle expiry disabled; sessions live until evicted by capacity",
                    ));
                } else if self.sessions.idle_ttl_secs < self.sessions.cookie_max_age_secs {
                    errors.push(ConfigError::warning(
                        "sessions.idle_ttl_secs",
                        "shorter than the cookie max-age; idle browsers lose history before their cookie expires",
                    ));
                }
            }
            Component::ToolServer => {
                let tavily = self.search.tavily_api_key.as_deref().map(str::trim);
                if tavily.map_or(true, str::is_empty) {
                    errors.push(ConfigError::error(
                        "TAVILY_API_KEY",
                        "TAVILY_API_KEY environment variable is required",
                    ));
                }
                if self.mcp.port == 0 {
                    errors.push(ConfigError::error("mcp.port", "port must be greater than 0"));
                }
                if self.mcp.host.is_empty() {
                    errors.push(ConfigError::error("mcp.host", "host must not be empty"));
                }
                if self.search.max_results == 0 {
                    errors.push(ConfigError::error("MAX_RESULTS", "must be at least 1"));
                }
                if self.mcp.session_idle_ttl_secs != 0
                    && self.mcp.session_idle_ttl_secs < self.sessions.idle_ttl_secs
                {
                    errors.push(ConfigError::warning(
                        "MCP_SESSION_IDLE_TTL",
                        "shorter than the gateway's session TTL; idle agents may find their tool session gone",
                    ));
                }
                if self.search.enable_summarization && self.llm.usable_api_key().is_none() {
                    errors.push(ConfigError::warning(
                        "ENABLE_SEARCH_SUMMARIZATION",
                        "summarization requested but GOOGLE_API_KEY is not set; results will not be summarized",
                    ));
                }
            }
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
