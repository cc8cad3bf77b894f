use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Search (Tavily)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Usually supplied through `TAVILY_API_KEY`.
    #[serde(default)]
    pub tavily_api_key: Option<String>,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_10")]
    pub max_results: u32,
    #[serde(default)]
    pub depth: SearchDepth,
    /// Per-result content limit in characters.
    #[serde(default = "d_10000")]
    pub max_content_size: usize,
    #[serde(default)]
    pub enable_summarization: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: None,
            base_url: d_base_url(),
            max_results: d_10(),
            depth: SearchDepth::default(),
            max_content_size: d_10000(),
            enable_summarization: false,
        }
    }
}

/// Tavily `search_depth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

impl SearchDepth {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}

impl fmt::Display for SearchDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(SearchDepth::Basic),
            "advanced" => Ok(SearchDepth::Advanced),
            other => Err(format!("unknown search depth '{other}'")),
        }
    }
}

fn d_base_url() -> String {
    "https://api.tavily.com".into()
}
fn d_10() -> u32 {
    10
}
fn d_10000() -> usize {
    10_000
}
