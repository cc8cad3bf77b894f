use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scrape (page loading + tag extraction)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default)]
    pub backend: ScrapeBackend,
    /// Chromium/Chrome executable used by the `chromium` backend.
    #[serde(default = "d_chromium")]
    pub chromium_path: String,
    /// Hard limit for loading a single page.
    #[serde(default = "d_30")]
    pub timeout_secs: u64,
    /// Extracted text limit in characters.
    #[serde(default = "d_20000")]
    pub max_scrape_length: usize,
    /// Tags read when the caller does not name any.
    #[serde(default = "default_tags")]
    pub default_tags: Vec<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            backend: ScrapeBackend::default(),
            chromium_path: d_chromium(),
            timeout_secs: d_30(),
            max_scrape_length: d_20000(),
            default_tags: default_tags(),
        }
    }
}

/// How pages are fetched before extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeBackend {
    /// Headless Chromium; runs page JavaScript before the DOM is read.
    #[default]
    Chromium,
    /// Plain HTTP GET; no script execution.
    Http,
}

impl fmt::Display for ScrapeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScrapeBackend::Chromium => "chromium",
            ScrapeBackend::Http => "http",
        })
    }
}

impl FromStr for ScrapeBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(ScrapeBackend::Chromium),
            "http" => Ok(ScrapeBackend::Http),
            other => Err(format!("unknown scrape backend '{other}'")),
        }
    }
}

/// `p, li, div, a, span, h1..h6`.
pub fn default_tags() -> Vec<String> {
    ["p", "li", "div", "a", "span", "h1", "h2", "h3", "h4", "h5", "h6"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn d_chromium() -> String {
    "chromium".into()
}
fn d_30() -> u64 {
    30
}
fn d_20000() -> usize {
    20_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tag_set() {
        let tags = default_tags();
        assert_eq!(tags.len(), 11);
        assert_eq!(tags.first().map(String::as_str), Some("p"));
        assert_eq!(tags.last().map(String::as_str), Some("h6"));
    }

    #[test]
    fn backend_from_str() {
        assert_eq!("HTTP".parse::<ScrapeBackend>().unwrap(), ScrapeBackend::Http);
        assert_eq!("chrome".parse::<ScrapeBackend>().unwrap(), ScrapeBackend::Chromium);
        assert!("firefox".parse::<ScrapeBackend>().is_err());
    }
}
