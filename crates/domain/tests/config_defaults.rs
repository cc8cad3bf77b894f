use std::io::Write;

use dq_domain::config::{Component, Config, ScrapeBackend, SearchDepth};

#[test]
fn default_front_door_binds_all_interfaces() {
    let config = Config::default();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8000);
}

#[test]
fn default_tool_server_is_local() {
    let config = Config::default();
    assert_eq!(config.mcp.host, "127.0.0.1");
    assert_eq!(config.mcp.port, 8001);
    assert_eq!(config.mcp.server_url, "http://127.0.0.1:8001/mcp");
    assert_eq!(config.mcp.request_timeout_secs, 30);
    assert_eq!(config.mcp.read_timeout_secs, 300);
    assert_eq!(config.mcp.max_sessions, 2000);
    assert!(config.mcp.session_idle_ttl_secs > config.sessions.idle_ttl_secs);
}

#[test]
fn tool_call_timeout_covers_server_budget() {
    let mut config = Config::default();
    config.search.enable_summarization = true;
    assert_eq!(config.tool_call_budget_secs(), 90);
    assert!(config.mcp.read_timeout_secs >= config.tool_call_budget_secs());

    config.mcp.read_timeout_secs = 30;
    let issues = config.validate(Component::Gateway);
    assert!(issues.iter().any(|i| i.field == "MCP_READ_TIMEOUT"));
}

#[test]
fn default_limits() {
    let config = Config::default();
    assert_eq!(config.search.max_results, 10);
    assert_eq!(config.search.depth, SearchDepth::Basic);
    assert_eq!(config.search.max_content_size, 10_000);
    assert_eq!(config.scrape.max_scrape_length, 20_000);
    assert_eq!(config.scrape.backend, ScrapeBackend::Chromium);
    assert_eq!(config.agent.max_iterations, 10);
    assert_eq!(config.agent.history_window, 5);
    assert_eq!(config.llm.max_tokens, 3000);
    assert_eq!(config.llm.timeout_secs, 60);
}

#[test]
fn session_ttl_matches_cookie_by_default() {
    let config = Config::default();
    assert_eq!(config.sessions.idle_ttl_secs, config.sessions.cookie_max_age_secs);
}

#[test]
fn sections_parse_from_toml() {
    let toml_str = r#"
[server]
port = 9000

[search]
max_results = 4
depth = "advanced"

[scrape]
backend = "http"
default_tags = ["pre", "code"]

[sessions]
max_active = 50
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.search.max_results, 4);
    assert_eq!(config.search.depth, SearchDepth::Advanced);
    assert_eq!(config.scrape.backend, ScrapeBackend::Http);
    assert_eq!(config.scrape.default_tags, vec!["pre", "code"]);
    assert_eq!(config.sessions.max_active, 50);
    assert_eq!(config.sessions.idle_ttl_secs, 3600);
}

#[test]
fn from_file_reads_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[llm]\nmodel = \"gemini-1.5-flash\"").unwrap();
    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.llm.model, "gemini-1.5-flash");
}

#[test]
fn from_file_reports_bad_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[llm\nmodel = ").unwrap();
    let err = Config::from_file(file.path()).unwrap_err();
    assert!(err.to_string().starts_with("config: parsing"));
}

#[test]
fn env_then_validate_for_both_components() {
    let mut config = Config::default();
    let warnings = config.apply_env_with(&|k| match k {
        "GOOGLE_API_KEY" => Some("g".into()),
        "TAVILY_API_KEY" => Some("t".into()),
        _ => None,
    });
    assert!(warnings.is_empty());
    assert!(config
        .validate(Component::Gateway)
        .iter()
        .all(|i| i.severity != dq_domain::config::ConfigSeverity::Error));
    assert!(config
        .validate(Component::ToolServer)
        .iter()
        .all(|i| i.severity != dq_domain::config::ConfigSeverity::Error));
}
