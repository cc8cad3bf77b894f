//! `search_documentation`: domain-restricted web search via Tavily.
//!
//! The backend is a trait so tests (and alternative providers) can stand in
//! for the hosted API. Results are flattened into a numbered text block and
//! optionally condensed by the summarizer model.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dq_domain::config::{SearchConfig, SearchDepth};
use dq_domain::error::{Error, Result};
use dq_domain::tool::Message;
use dq_providers::util::{from_reqwest, http_client, truncate_chars};
use dq_providers::{ChatRequest, LlmProvider};
use serde::Deserialize;

use crate::outcome::ToolOutcome;

pub const NO_RESULTS: &str =
    "No results found. Try a different search query or check if domains are accessible.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One provider query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub sites: Vec<String>,
    pub max_results: u32,
    pub depth: SearchDepth,
}

/// One search hit. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SearchHit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, req: &SearchRequest) -> Result<Vec<SearchHit>>;
}

/// Tavily `/search` client.
pub struct TavilyBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl TavilyBackend {
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: format!("{}/search", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(cfg: &SearchConfig, timeout: Duration) -> Result<Self> {
        let key = cfg
            .tavily_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("TAVILY_API_KEY environment variable is required".into()))?;
        Self::new(&cfg.base_url, key, timeout)
    }
}

#[async_trait]
impl SearchBackend for TavilyBackend {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, req: &SearchRequest) -> Result<Vec<SearchHit>> {
        let body = serde_json::json!({
            "query": req.query,
            "max_results": req.max_results,
            "search_depth": req.depth.as_str(),
            "include_domains": req.sites,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: "tavily".into(),
                message: format!("HTTP {} - {}", status.as_u16(), truncate_chars(&text, 300)),
            });
        }

        let parsed: TavilyResponse = resp.json().await.map_err(from_reqwest)?;
        Ok(parsed.results)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `search_documentation` arguments as sent by the model.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    pub sites: Vec<String>,
    #[serde(default)]
    pub max_results: Option<u32>,
    #[serde(default)]
    pub depth: Option<String>,
}

pub struct SearchTool {
    backend: Arc<dyn SearchBackend>,
    summarizer: Option<Arc<dyn LlmProvider>>,
    default_max_results: u32,
    default_depth: SearchDepth,
    max_content_size: usize,
}

impl SearchTool {
    pub fn new(backend: Arc<dyn SearchBackend>, cfg: &SearchConfig) -> Self {
        Self {
            backend,
            summarizer: None,
            default_max_results: cfg.max_results,
            default_depth: cfg.depth,
            max_content_size: cfg.max_content_size,
        }
    }

    /// Condense result blocks with `summarizer` before returning them.
    pub fn with_summarizer(mut self, summarizer: Arc<dyn LlmProvider>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn summarizes(&self) -> bool {
        self.summarizer.is_some()
    }

    pub async fn run(&self, args: SearchArgs) -> ToolOutcome {
        match self.search(args).await {
            Ok(text) => ToolOutcome::Text(text),
            Err(e) => {
                tracing::error!(error = %e, "search failed");
                ToolOutcome::SearchFailed(e)
            }
        }
    }

    async fn search(&self, args: SearchArgs) -> Result<String> {
        let req = self.request_from(args)?;
        tracing::info!(
            query = %req.query,
            sites = ?req.sites,
            max_results = req.max_results,
            depth = %req.depth,
            backend = self.backend.name(),
            "searching"
        );

        let hits = self.backend.search(&req).await?;
        tracing::info!(count = hits.len(), "search results received");
        if hits.is_empty() {
            tracing::warn!(query = %req.query, "no search results returned");
            return Ok(NO_RESULTS.to_string());
        }

        let block = format_results(&hits, req.max_results as usize, self.max_content_size);
        tracing::info!(chars = block.chars().count(), "formatted search results");

        match &self.summarizer {
            Some(summarizer) => Ok(summarize(summarizer.as_ref(), &block, &req.query).await),
            None => Ok(block),
        }
    }

    fn request_from(&self, args: SearchArgs) -> Result<SearchRequest> {
        if args.query.trim().is_empty() {
            return Err(Error::Parse("query must not be empty".into()));
        }
        let sites: Vec<String> = args
            .sites
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if sites.is_empty() {
            return Err(Error::Parse("sites must name at least one domain".into()));
        }
        let depth = match args.depth.as_deref() {
            Some(d) => d.parse::<SearchDepth>().map_err(Error::Parse)?,
            None => self.default_depth,
        };
        Ok(SearchRequest {
            query: args.query,
            sites,
            max_results: args.max_results.filter(|n| *n > 0).unwrap_or(self.default_max_results),
            depth,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Formatting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Render at most `max_results` hits as numbered blocks.
pub fn format_results(hits: &[SearchHit], max_results: usize, max_content_size: usize) -> String {
    hits.iter()
        .take(max_results)
        .enumerate()
        .map(|(i, hit)| {
            let title = hit.title.as_deref().unwrap_or("No title");
            let url = hit.url.as_deref().unwrap_or("No URL");
            let content = hit.content.as_deref().unwrap_or("No content available");
            let content = clip(content, max_content_size);
            format!("\nResult {}:\nTitle: {title}\nURL: {url}\nContent: {content}\n---\n", i + 1)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn clip(content: &str, max_chars: usize) -> String {
    let head = truncate_chars(content, max_chars);
    if head.len() < content.len() {
        format!("{head}...")
    } else {
        content.to_string()
    }
}

pub fn summary_prompt(results: &str, query: &str) -> String {
    format!(
        r#"
You are a technical documentation summarizer. Your job is to extract and summarize only the most relevant information from search results.

Original User Query: "{query}"

Search Results to Summarize:
{results}

Instructions:
1. Focus ONLY on information directly relevant to answering the user's query
2. Remove redundant content, boilerplate text, and navigation elements
3. Preserve specific technical details, code examples, and step-by-step instructions
4. Maintain source URLs for attribution
5. Keep the summary comprehensive but concise
6. Format clearly for easy reading

Relevant Summary:
"#
    )
}

/// Summarize `block`; falls back to the unsummarized text on failure.
async fn summarize(summarizer: &dyn LlmProvider, block: &str, query: &str) -> String {
    let req = ChatRequest::new(vec![Message::user(summary_prompt(block, query))]);
    match summarizer.chat(&req).await {
        Ok(resp) if !resp.content.trim().is_empty() => {
            let before = block.chars().count();
            let after = resp.content.chars().count();
            let reduction = 100 - (after * 100 / before.max(1)) as i64;
            tracing::info!(before, after, reduction_pct = reduction, "search results summarized");
            resp.content
        }
        Ok(_) => {
            tracing::warn!("summarizer returned empty text, returning original results");
            block.to_string()
        }
        Err(e) => {
            tracing::error!(error = %e, "summarization failed, returning original results");
            block.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dq_providers::ChatResponse;
    use parking_lot::Mutex;

    struct FixedBackend {
        hits: Vec<SearchHit>,
        seen: Mutex<Vec<SearchRequest>>,
    }

    impl FixedBackend {
        fn new(hits: Vec<SearchHit>) -> Arc<Self> {
            Arc::new(Self {
                hits,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SearchBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn search(&self, req: &SearchRequest) -> Result<Vec<SearchHit>> {
            self.seen.lock().push(req.clone());
            Ok(self.hits.clone())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl SearchBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn search(&self, _req: &SearchRequest) -> Result<Vec<SearchHit>> {
            Err(Error::Provider {
                provider: "tavily".into(),
                message: "HTTP 401 - unauthorized".into(),
            })
        }
    }

    struct EchoSummarizer {
        fail: bool,
    }

    #[async_trait]
    impl LlmProvider for EchoSummarizer {
        async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
            if self.fail {
                return Err(Error::Timeout("summarizer".into()));
            }
            assert!(req.messages[0].content.contains("Relevant Summary:"));
            Ok(ChatResponse {
                content: "short".into(),
                usage: None,
                model: "lite".into(),
                finish_reason: None,
            })
        }

        fn provider_id(&self) -> &str {
            "echo"
        }
    }

    fn hit(title: &str, content: &str) -> SearchHit {
        SearchHit {
            title: Some(title.into()),
            url: Some(format!("https://docs.test/{title}")),
            content: Some(content.into()),
        }
    }

    fn args(query: &str, sites: &[&str]) -> SearchArgs {
        SearchArgs {
            query: query.into(),
            sites: sites.iter().map(|s| s.to_string()).collect(),
            max_results: None,
            depth: None,
        }
    }

    #[test]
    fn formats_numbered_blocks() {
        let text = format_results(&[hit("a", "alpha"), hit("b", "beta")], 10, 100);
        assert_eq!(
            text,
            "\nResult 1:\nTitle: a\nURL: https://docs.test/a\nContent: alpha\n---\n\n\
             \nResult 2:\nTitle: b\nURL: https://docs.test/b\nContent: beta\n---\n"
        );
    }

    #[test]
    fn missing_fields_use_placeholders() {
        let text = format_results(&[SearchHit::default()], 10, 100);
        assert!(text.contains("Title: No title"));
        assert!(text.contains("URL: No URL"));
        assert!(text.contains("Content: No content available"));
    }

    #[test]
    fn long_content_is_clipped_by_characters() {
        let content = "é".repeat(12);
        let text = format_results(&[hit("a", &content)], 10, 10);
        assert!(text.contains(&format!("Content: {}...\n", "é".repeat(10))));

        let exact = "x".repeat(10);
        let text = format_results(&[hit("a", &exact)], 10, 10);
        assert!(text.contains(&format!("Content: {exact}\n")));
    }

    #[test]
    fn extra_hits_are_dropped() {
        let hits: Vec<_> = (0..5).map(|i| hit(&i.to_string(), "c")).collect();
        let text = format_results(&hits, 2, 100);
        assert!(text.contains("Result 2:"));
        assert!(!text.contains("Result 3:"));
    }

    #[tokio::test]
    async fn empty_results_give_fixed_message() {
        let tool = SearchTool::new(FixedBackend::new(vec![]), &SearchConfig::default());
        let out = tool.run(args("tokio select", &["docs.rs"])).await;
        assert_eq!(out.into_text(), NO_RESULTS);
    }

    #[tokio::test]
    async fn defaults_fill_missing_arguments() {
        let backend = FixedBackend::new(vec![hit("a", "alpha")]);
        let tool = SearchTool::new(backend.clone(), &SearchConfig::default());
        tool.run(args("axum routing", &[" docs.rs ", ""])).await;

        let seen = backend.seen.lock();
        assert_eq!(
            seen[0],
            SearchRequest {
                query: "axum routing".into(),
                sites: vec!["docs.rs".into()],
                max_results: 10,
                depth: SearchDepth::Basic,
            }
        );
    }

    #[tokio::test]
    async fn bad_input_is_search_error_text() {
        let tool = SearchTool::new(FixedBackend::new(vec![]), &SearchConfig::default());
        let text = tool.run(args("q", &[])).await.into_text();
        assert!(text.starts_with("❌ Search error: "), "{text}");

        let mut a = args("q", &["docs.rs"]);
        a.depth = Some("deep".into());
        let text = tool.run(a).await.into_text();
        assert!(text.contains("unknown search depth"), "{text}");
    }

    #[tokio::test]
    async fn provider_error_is_search_error_text() {
        let tool = SearchTool::new(Arc::new(FailingBackend), &SearchConfig::default());
        let text = tool.run(args("q", &["docs.rs"])).await.into_text();
        assert_eq!(text, "❌ Search error: provider tavily: HTTP 401 - unauthorized");
    }

    #[tokio::test]
    async fn summarizer_replaces_block_and_falls_back() {
        let cfg = SearchConfig::default();
        let tool = SearchTool::new(FixedBackend::new(vec![hit("a", "alpha")]), &cfg)
            .with_summarizer(Arc::new(EchoSummarizer { fail: false }));
        assert!(tool.summarizes());
        assert_eq!(tool.run(args("q", &["docs.rs"])).await.into_text(), "short");

        let tool = SearchTool::new(FixedBackend::new(vec![hit("a", "alpha")]), &cfg)
            .with_summarizer(Arc::new(EchoSummarizer { fail: true }));
        let text = tool.run(args("q", &["docs.rs"])).await.into_text();
        assert!(text.contains("Result 1:"));
    }

    #[test]
    fn summary_prompt_quotes_query() {
        let p = summary_prompt("BLOCK", "how to route");
        assert!(p.contains("Original User Query: \"how to route\""));
        assert!(p.contains("Search Results to Summarize:\nBLOCK\n"));
        assert!(p.trim_end().ends_with("Relevant Summary:"));
    }
}
