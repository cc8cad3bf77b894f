//! Tool catalog: names, descriptions, input schemas, and dispatch.

use std::sync::Arc;
use std::time::Duration;

use dq_domain::config::Config;
use dq_domain::error::Result;
use dq_mcp_client::McpToolDef;
use dq_providers::{GoogleProvider, LlmProvider};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::outcome::ToolOutcome;
use crate::scrape::{loader_from_config, ScrapeArgs, ScrapeTool};
use crate::search::{SearchArgs, SearchTool, TavilyBackend};

pub const SEARCH_TOOL: &str = "search_documentation";
pub const SCRAPE_TOOL: &str = "scrape_website";

const SEARCH_DESCRIPTION: &str = "Search documentation websites using Tavily web search.

Args:
    query: Search query with relevant keywords - what you want to find
    sites: Website domains to search within (e.g., ['docs.langchain.com', 'fastapi.tiangolo.com'])
    max_results: Maximum number of search results to return (default: 10)
    depth: Search depth - 'basic' for quick searches or 'advanced' for comprehensive searches (default: 'basic')

Usage Guidelines:
1. Create keyword-rich search query from user's question
2. Select relevant website domains based on technologies mentioned
3. Use 'basic' depth for quick answers, 'advanced' for thorough research
4. Adjust max_results based on how comprehensive you need the answer to be

Examples:
- Quick search: query=\"LangChain custom tools\", sites=[\"docs.langchain.com\"], depth=\"basic\", max_results=5
- Comprehensive search: query=\"FastAPI authentication middleware\", sites=[\"fastapi.tiangolo.com\"], depth=\"advanced\", max_results=15

Best Practices:
- Include technical terms and framework names in queries
- Choose appropriate domains for the question context
- Prefer official documentation sites over third-party sources
- Use specific queries rather than broad terms for better results";

const SCRAPE_DESCRIPTION: &str = "Scrape complete website content using Chromium browser for comprehensive page extraction.

Args:
    url: Complete URL to scrape (must include https:// or http://)
    tags_to_extract: HTML tags to extract content from
        Default: [\"p\", \"li\", \"div\", \"a\", \"span\", \"h1\", \"h2\", \"h3\", \"h4\", \"h5\", \"h6\"]
        Custom examples: [\"pre\", \"code\"] for code examples, [\"table\", \"tr\", \"td\"] for tables

When to Use:
- Search results are incomplete or insufficient
- Need complete page content including code examples
- Page has dynamic JavaScript content that search missed
- Need specific formatting or structure that search doesn't capture

Examples:
- Basic scraping: url=\"https://docs.langchain.com/docs/modules/agents\"
- Code-focused scraping: url=\"https://fastapi.tiangolo.com/tutorial/\", tags_to_extract=[\"pre\", \"code\", \"p\"]
- Table extraction: url=\"https://docs.python.org/3/library/\", tags_to_extract=[\"table\", \"tr\", \"td\", \"th\"]

Best Practices:
- Only use after search_documentation provides insufficient information
- Prefer URLs from previous search results for relevance
- Use specific tag extraction for targeted content (faster processing)
- Be aware: ~3-10x slower than search, use sparingly for performance

Limitations:
- Content truncated at configured limit to prevent excessive token usage
- Some sites may block automated scraping
- Slower than search - reserve for when search is inadequate";

/// The two documentation tools behind one dispatch point.
pub struct ToolRegistry {
    search: SearchTool,
    scrape: ScrapeTool,
}

impl ToolRegistry {
    pub fn new(search: SearchTool, scrape: ScrapeTool) -> Self {
        Self { search, scrape }
    }

    /// Wire up Tavily, the optional summarizer and the configured page
    /// loader.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(cfg.mcp.request_timeout_secs.max(1));
        let backend = TavilyBackend::from_config(&cfg.search, timeout)?;
        tracing::info!("Tavily client initialized");

        let mut search = SearchTool::new(Arc::new(backend), &cfg.search);
        if cfg.search.enable_summarization && cfg.llm.usable_api_key().is_some() {
            let summarizer: Arc<dyn LlmProvider> =
                Arc::new(GoogleProvider::summarizer_from_config(&cfg.llm)?);
            search = search.with_summarizer(summarizer);
            tracing::info!(model = %cfg.llm.summarizer_model, "search result summarization enabled");
        } else {
            tracing::info!("search result summarization disabled");
        }

        let loader = loader_from_config(&cfg.scrape)?;
        tracing::info!(loader = loader.name(), "page loader ready");

        Ok(Self::new(search, ScrapeTool::new(loader, &cfg.scrape)))
    }

    pub fn definitions(&self) -> Vec<McpToolDef> {
        vec![
            McpToolDef {
                name: SEARCH_TOOL.into(),
                description: SEARCH_DESCRIPTION.into(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {"title": "Query", "type": "string"},
                        "sites": {"title": "Sites", "type": "array", "items": {"type": "string"}},
                        "max_results": {
                            "title": "Max Results",
                            "anyOf": [{"type": "integer"}, {"type": "null"}],
                            "default": null
                        },
                        "depth": {
                            "title": "Depth",
                            "anyOf": [{"type": "string", "enum": ["basic", "advanced"]}, {"type": "null"}],
                            "default": null
                        }
                    },
                    "required": ["query", "sites"]
                }),
            },
            McpToolDef {
                name: SCRAPE_TOOL.into(),
                description: SCRAPE_DESCRIPTION.into(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "url": {"title": "Url", "type": "string"},
                        "tags_to_extract": {
                            "title": "Tags To Extract",
                            "anyOf": [{"type": "array", "items": {"type": "string"}}, {"type": "null"}],
                            "default": null
                        }
                    },
                    "required": ["url"]
                }),
            },
        ]
    }

    pub async fn call(&self, name: &str, arguments: Value) -> ToolOutcome {
        tracing::debug!(tool = %name, "tool call");
        match name {
            SEARCH_TOOL => match parse_args::<SearchArgs>(name, arguments) {
                Ok(args) => self.search.run(args).await,
                Err(outcome) => outcome,
            },
            SCRAPE_TOOL => match parse_args::<ScrapeArgs>(name, arguments) {
                Ok(args) => self.scrape.run(args).await,
                Err(outcome) => outcome,
            },
            other => {
                tracing::warn!(tool = %other, "unknown tool requested");
                ToolOutcome::UnknownTool(other.to_string())
            }
        }
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> std::result::Result<T, ToolOutcome> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|e| ToolOutcome::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}
