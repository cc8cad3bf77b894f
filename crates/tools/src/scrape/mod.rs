//! `scrape_website`: full-page content extraction.
//!
//! A [`PageLoader`] produces HTML, [`extract::extract_text`] keeps the text
//! of the requested tags, and the result is clipped and wrapped for the
//! model. Every path returns text; load failures become
//! [`ToolOutcome::ScrapeFailed`].

pub mod extract;
pub mod loader;

use std::sync::Arc;

use dq_domain::config::ScrapeConfig;
use dq_providers::util::truncate_chars;
use serde::Deserialize;

use crate::outcome::ToolOutcome;

pub use extract::extract_text;
pub use loader::{loader_from_config, ChromiumLoader, HttpLoader, PageLoader};

const TRUNCATION_MARKER: &str = "\n\n... (content truncated)";

/// `scrape_website` arguments as sent by the model.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeArgs {
    pub url: String,
    #[serde(default)]
    pub tags_to_extract: Option<Vec<String>>,
}

pub struct ScrapeTool {
    loader: Arc<dyn PageLoader>,
    default_tags: Vec<String>,
    max_length: usize,
}

impl ScrapeTool {
    pub fn new(loader: Arc<dyn PageLoader>, cfg: &ScrapeConfig) -> Self {
        Self {
            loader,
            default_tags: cfg.default_tags.clone(),
            max_length: cfg.max_scrape_length,
        }
    }

    pub async fn run(&self, args: ScrapeArgs) -> ToolOutcome {
        let url = args.url.trim().to_string();
        let tags = match args.tags_to_extract {
            Some(tags) if !tags.is_empty() => tags,
            _ => self.default_tags.clone(),
        };
        tracing::info!(url = %url, tags = ?tags, loader = self.loader.name(), "scraping");

        let html = match self.loader.load(&url).await {
            Ok(html) => html,
            Err(error) => {
                tracing::error!(url = %url, error = %error, "scrape failed");
                return ToolOutcome::ScrapeFailed { url, error };
            }
        };
        if html.trim().is_empty() {
            return ToolOutcome::Text(format!("Failed to load content from {url}"));
        }

        let content = extract_text(&html, &tags);
        if content.is_empty() {
            return ToolOutcome::Text(format!("No content extracted from {url}"));
        }

        let content = self.clip(content);
        tracing::info!(url = %url, chars = content.chars().count(), "scraped");
        ToolOutcome::Text(wrap(&url, &content))
    }

    fn clip(&self, content: String) -> String {
        let head = truncate_chars(&content, self.max_length);
        if head.len() < content.len() {
            format!("{head}{TRUNCATION_MARKER}")
        } else {
            content
        }
    }
}

fn wrap(url: &str, content: &str) -> String {
    format!(
        "\n**Website Scraped:** {url}\n**Content Extracted:**\n\n{content}\n\n**Note:** Complete website content for comprehensive analysis.\n"
    )
}
