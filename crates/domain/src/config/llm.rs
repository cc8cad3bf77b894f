use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM (Gemini)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Value shipped in `.env.example`; treated the same as a missing key.
pub const GOOGLE_API_KEY_PLACEHOLDER: &str = "your_google_api_key_here";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Usually supplied through `GOOGLE_API_KEY` rather than the file.
    #[serde(default)]
    pub google_api_key: Option<String>,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default = "d_3000")]
    pub max_tokens: u32,
    #[serde(default = "d_60")]
    pub timeout_secs: u64,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Model used by the tool server to condense search results.
    #[serde(default = "d_summarizer_model")]
    pub summarizer_model: String,
    #[serde(default = "d_1000")]
    pub summarizer_max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            google_api_key: None,
            model: d_model(),
            temperature: d_temperature(),
            max_tokens: d_3000(),
            timeout_secs: d_60(),
            base_url: d_base_url(),
            summarizer_model: d_summarizer_model(),
            summarizer_max_tokens: d_1000(),
        }
    }
}

impl LlmConfig {
    /// The API key, unless it is missing, blank, or the placeholder.
    pub fn usable_api_key(&self) -> Option<&str> {
        self.google_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && *k != GOOGLE_API_KEY_PLACEHOLDER)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_model() -> String {
    "gemini-2.0-flash".into()
}
fn d_temperature() -> f32 {
    0.1
}
fn d_3000() -> u32 {
    3000
}
fn d_60() -> u64 {
    60
}
fn d_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn d_summarizer_model() -> String {
    "gemini-2.0-flash-lite".into()
}
fn d_1000() -> u32 {
    1000
}
