//! The HTTP front door over a real listener, with a scripted LLM and the
//! real MCP tool server backed by in-memory search and page doubles.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dq_domain::config::{Config, ScrapeConfig, SearchConfig};
use dq_domain::error::{Error, Result};
use dq_gateway::agent::connector::McpConnector;
use dq_gateway::api::chat::ChatResponse;
use dq_gateway::state::AppState;
use dq_providers::{ChatRequest, ChatResponse as LlmResponse, LlmProvider};
use dq_tools::scrape::{PageLoader, ScrapeTool};
use dq_tools::search::{SearchBackend, SearchHit, SearchRequest, SearchTool};
use dq_tools::{McpServer, ToolRegistry};
use parking_lot::Mutex;
use reqwest::header::{COOKIE, SET_COOKIE};
use serde_json::{json, Value};

const CSV: &str = "site,domain,description\ndocs.rs,Rust,Crate documentation\ntokio.rs,Async,Tokio guides\n";

// ── Doubles ─────────────────────────────────────────────────────────

struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<LlmResponse> {
        self.requests.lock().push(req.clone());
        let content = self.replies.lock().pop_front().ok_or_else(|| Error::Provider {
            provider: "scripted".into(),
            message: "script exhausted".into(),
        })?;
        Ok(LlmResponse {
            content,
            usage: None,
            model: "scripted".into(),
            finish_reason: None,
        })
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

struct OneHit;

#[async_trait]
impl SearchBackend for OneHit {
    fn name(&self) -> &'static str {
        "one-hit"
    }

    async fn search(&self, req: &SearchRequest) -> Result<Vec<SearchHit>> {
        Ok(vec![SearchHit {
            title: Some(format!("About {}", req.query)),
            url: Some(format!("https://{}/guide", req.sites[0])),
            content: Some("Handlers are async functions.".into()),
        }])
    }
}

struct Page;

#[async_trait]
impl PageLoader for Page {
    fn name(&self) -> &'static str {
        "page"
    }

    async fn load(&self, _url: &str) -> Result<String> {
        Ok("<html><body><p>Routing guide</p></body></html>".into())
    }
}

// ── Harness ─────────────────────────────────────────────────────────

struct Harness {
    base: String,
    state: AppState,
    provider: Arc<ScriptedProvider>,
    tool_server: Arc<McpServer>,
    http: reqwest::Client,
    _dir: tempfile::TempDir,
}

async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn start_tools() -> (String, Arc<McpServer>) {
    let registry = ToolRegistry::new(
        SearchTool::new(Arc::new(OneHit), &SearchConfig::default()),
        ScrapeTool::new(Arc::new(Page), &ScrapeConfig::default()),
    );
    let server = Arc::new(McpServer::new(registry));
    let base = serve(dq_tools::router(server.clone())).await;
    (format!("{base}/mcp"), server)
}

async fn start_with(replies: &[&str], csv: Option<&str>, mcp_url: Option<String>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("sites_data.csv");
    if let Some(csv) = csv {
        std::fs::write(&csv_path, csv).unwrap();
    }

    let (tools_url, tool_server) = start_tools().await;
    let mut config = Config::default();
    config.agent.sites_csv_path = csv_path;
    config.mcp.server_url = mcp_url.unwrap_or(tools_url);

    let provider = Arc::new(ScriptedProvider::new(replies));
    let connector = Arc::new(McpConnector::new(config.mcp.server_url.clone(), Duration::from_secs(5)));
    let state = dq_gateway::bootstrap::build_app_state_with(Arc::new(config), provider.clone(), connector)
        .unwrap();

    let base = serve(dq_gateway::api::router().with_state(state.clone())).await;
    Harness {
        base,
        state,
        provider,
        tool_server,
        http: reqwest::Client::new(),
        _dir: dir,
    }
}

async fn start(replies: &[&str]) -> Harness {
    start_with(replies, Some(CSV), None).await
}

fn final_answer(text: &str) -> String {
    json!({"action": "Final Answer", "action_input": text}).to_string()
}

impl Harness {
    async fn chat(&self, token: Option<&str>, body: Value) -> (Option<String>, ChatResponse) {
        let mut req = self.http.post(format!("{}/chat", self.base)).json(&body);
        if let Some(token) = token {
            req = req.header(COOKIE, format!("session_id={token}"));
        }
        let resp = req.send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let set_cookie = resp
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        (set_cookie, resp.json().await.unwrap())
    }

    async fn health(&self) -> Value {
        self.http
            .get(format!("{}/health", self.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

fn cookie_token(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|kv| kv.trim().strip_prefix("session_id="))
        .unwrap()
        .to_string()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_counts_active_sessions() {
    let answer = final_answer("hello");
    let h = start(&[answer.as_str()]).await;

    assert_eq!(
        h.health().await,
        json!({
            "message": "Domain Q&A Agent API is running",
            "status": "healthy",
            "version": "1.0.0",
            "active_sessions": 0
        })
    );

    h.chat(None, json!({"message": "hi"})).await;
    assert_eq!(h.health().await["active_sessions"], 1);
}

#[tokio::test]
async fn first_chat_mints_a_cookie() {
    let (a, b) = (final_answer("one"), final_answer("two"));
    let h = start(&[a.as_str(), b.as_str()]).await;

    let (set_cookie, body) = h.chat(None, json!({"message": "What is axum?"})).await;
    let set_cookie = set_cookie.expect("cookie minted");
    for attr in ["HttpOnly", "Secure", "SameSite=Lax", "Max-Age=3600", "Path=/"] {
        assert!(set_cookie.contains(attr), "{set_cookie} lacks {attr}");
    }
    let token = cookie_token(&set_cookie);
    assert_eq!(token.len(), 36);
    assert_eq!(body.session_id, token);
    assert_eq!(body.status, "success");
    assert_eq!(body.response, "one");

    let (second, body) = h.chat(None, json!({"message": "again"})).await;
    assert_ne!(cookie_token(&second.unwrap()), token);
    assert_eq!(body.response, "two");
    assert_eq!(h.state.active_sessions(), 2);
}

#[tokio::test]
async fn returning_cookie_keeps_history() {
    let (a, b, c) = (final_answer("first"), final_answer("second"), final_answer("third"));
    let h = start(&[a.as_str(), b.as_str(), c.as_str()]).await;

    let (set_cookie, _) = h.chat(None, json!({"message": "q1"})).await;
    let token = cookie_token(&set_cookie.unwrap());

    let (set_cookie, body) = h.chat(Some(&token), json!({"message": "q2"})).await;
    assert!(set_cookie.is_none());
    assert_eq!(body.session_id, token);
    assert_eq!(body.response, "second");

    let requests = h.provider.requests();
    let contents: Vec<&str> = requests[1].messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents.len(), 4);
    assert_eq!(&contents[1..3], &["q1", "first"]);

    // reset_memory clears before answering.
    h.chat(Some(&token), json!({"message": "q3", "reset_memory": true})).await;
    assert_eq!(h.provider.requests()[2].messages.len(), 2);
    assert_eq!(h.state.active_sessions(), 1);
}

#[tokio::test]
async fn tool_round_trip_through_mcp() {
    let search = json!({
        "action": "search_documentation",
        "action_input": {"query": "axum routing", "sites": ["docs.rs"]}
    })
    .to_string();
    let fenced = format!("Thought: search first\nAction:\n```json\n{search}\n```");
    let done = final_answer("Handlers are async functions. (https://docs.rs/guide)");
    let h = start(&[fenced.as_str(), done.as_str()]).await;

    let (_, body) = h.chat(None, json!({"message": "How does axum routing work?"})).await;
    assert_eq!(body.response, "Handlers are async functions. (https://docs.rs/guide)");

    let requests = h.provider.requests();
    let system = &requests[0].messages[0].content;
    assert!(system.contains("\n## Rust\n\n- docs.rs: Crate documentation\n"));
    assert!(system.contains("available knowledge sources: ['Rust', 'Async']"));
    assert!(system.contains("or search_documentation, scrape_website"));

    let second = &requests[1].messages.last().unwrap().content;
    assert!(second.contains("Title: About axum routing"), "{second}");
    assert!(second.contains("URL: https://docs.rs/guide"));
    assert_eq!(h.tool_server.session_count(), 1);
}

#[tokio::test]
async fn parse_failures_and_iteration_cap() {
    let junk = "I am not sure what to do";
    let replies = vec![junk; 10];
    let h = start(&replies).await;

    let (_, body) = h.chat(None, json!({"message": "loop forever"})).await;
    assert_eq!(body.response, "Agent stopped due to iteration limit or time limit.");

    let requests = h.provider.requests();
    assert_eq!(requests.len(), 10);
    let last = &requests[9].messages.last().unwrap().content;
    assert_eq!(last.matches("Observation: Invalid or incomplete response").count(), 9);
}

#[tokio::test]
async fn reset_requires_a_cookie() {
    let h = start(&[]).await;

    let resp = h.http.post(format!("{}/reset", h.base)).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"detail": "No active session"}));

    let resp = h
        .http
        .post(format!("{}/reset", h.base))
        .header(COOKIE, "session_id=abc")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({"message": "Conversation memory has been reset", "status": "success"})
    );
    assert_eq!(h.state.active_sessions(), 1);
}

#[tokio::test]
async fn missing_registry_is_a_server_error() {
    let h = start(&[]).await;
    let mut state = h.state.clone();
    state.sessions = None;
    let base = serve(dq_gateway::api::router().with_state(state)).await;

    let resp = h
        .http
        .post(format!("{base}/reset"))
        .header(COOKIE, "session_id=abc")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"detail": "Session store not initialized"}));

    let resp = h
        .http
        .post(format!("{base}/chat"))
        .json(&json!({"message": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);
}

#[tokio::test]
async fn construction_failure_is_reported_in_the_answer() {
    let h = start_with(&[], None, None).await;

    let (_, body) = h.chat(None, json!({"message": "hi"})).await;
    assert!(body.response.starts_with("Error: catalog: cannot open"), "{}", body.response);
    assert_eq!(h.state.active_sessions(), 0);
}

#[tokio::test]
async fn unreachable_tool_server_is_reported_in_the_answer() {
    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let h = start_with(&[], Some(CSV), Some(format!("http://{closed}/mcp"))).await;

    let (set_cookie, body) = h.chat(None, json!({"message": "hi"})).await;
    assert!(body.response.starts_with("Error: "), "{}", body.response);
    assert!(set_cookie.is_some());
    // The agent stays registered and retries the connection next time.
    assert_eq!(h.state.active_sessions(), 1);
}

#[tokio::test]
async fn close_all_ends_tool_sessions() {
    let (a, b) = (final_answer("a"), final_answer("b"));
    let h = start(&[a.as_str(), b.as_str()]).await;
    h.chat(None, json!({"message": "one"})).await;
    h.chat(None, json!({"message": "two"})).await;
    assert_eq!(h.tool_server.session_count(), 2);

    let sessions = h.state.sessions.clone().unwrap();
    sessions.close_all().await;
    assert_eq!(h.tool_server.session_count(), 0);
    assert_eq!(h.state.active_sessions(), 0);
}
