//! Google Gemini adapter.
//!
//! Implements the Gemini `generateContent` API.
//! Auth is via an API key passed as a query parameter (`key={api_key}`).

use std::time::Duration;

use dq_domain::config::LlmConfig;
use dq_domain::error::{Error, Result};
use dq_domain::tool::{Message, Role};
use serde_json::Value;

use crate::traits::{ChatRequest, ChatResponse, LlmProvider, Usage};
use crate::util::{from_reqwest, http_client, redact_url_key};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An LLM provider adapter for the Google Gemini API.
pub struct GoogleProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    default_temperature: f32,
    default_max_tokens: u32,
    client: reqwest::Client,
}

impl GoogleProvider {
    /// Create the conversational model from the `[llm]` section.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = cfg
            .usable_api_key()
            .ok_or_else(|| Error::Config("GOOGLE_API_KEY is not set".into()))?
            .to_string();

        Ok(Self {
            id: "google".into(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: cfg.model.clone(),
            default_temperature: cfg.temperature,
            default_max_tokens: cfg.max_tokens,
            client: http_client(Duration::from_secs(cfg.timeout_secs))?,
        })
    }

    /// Create the search-result summarizer from the `[llm]` section.
    pub fn summarizer_from_config(cfg: &LlmConfig) -> Result<Self> {
        let mut provider = Self::from_config(cfg)?;
        provider.id = "google-summarizer".into();
        provider.default_model = cfg.summarizer_model.clone();
        provider.default_temperature = 0.1;
        provider.default_max_tokens = cfg.summarizer_max_tokens;
        Ok(provider)
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        )
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let mut contents: Vec<Value> = Vec::new();
        let mut system_parts: Vec<Value> = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => system_parts.push(serde_json::json!({"text": msg.content})),
                Role::User | Role::Assistant => contents.push(message_to_gemini(msg)),
            }
        }

        let mut body = serde_json::json!({
            "contents": contents,
        });

        if !system_parts.is_empty() {
            body["systemInstruction"] = serde_json::json!({ "parts": system_parts });
        }

        let mut gen_config = serde_json::json!({
            "temperature": req.temperature.unwrap_or(self.default_temperature),
            "maxOutputTokens": req.max_tokens.unwrap_or(self.default_max_tokens),
        });
        if !req.stop.is_empty() {
            gen_config["stopSequences"] = serde_json::json!(req.stop);
        }
        body["generationConfig"] = gen_config;

        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn message_to_gemini(msg: &Message) -> Value {
    let role = match msg.role {
        Role::Assistant => "model",
        _ => "user",
    };
    serde_json::json!({
        "role": role,
        "parts": [{"text": msg.content}],
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_gemini_response(body: &Value, model: &str) -> Result<ChatResponse> {
    let candidate = body
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| {
            let reason = body
                .pointer("/promptFeedback/blockReason")
                .and_then(|v| v.as_str())
                .map(|r| format!("prompt blocked: {r}"))
                .unwrap_or_else(|| "no candidates in response".into());
            Error::Provider {
                provider: "google".into(),
                message: reason,
            }
        })?;

    let mut text_content = String::new();
    if let Some(parts) = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
    {
        for part in parts {
            if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                text_content.push_str(text);
            }
        }
    }

    let finish_reason = candidate
        .get("finishReason")
        .and_then(|v| v.as_str())
        .map(|s| match s {
            "STOP" => "stop".to_string(),
            "MAX_TOKENS" => "length".to_string(),
            other => other.to_lowercase(),
        });

    let usage = body.get("usageMetadata").and_then(parse_gemini_usage);

    Ok(ChatResponse {
        content: text_content,
        usage,
        model: model.to_string(),
        finish_reason,
    })
}

fn parse_gemini_usage(v: &Value) -> Option<Usage> {
    let prompt = v.get("promptTokenCount")?.as_u64()? as u32;
    let completion = v
        .get("candidatesTokenCount")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;
    let total = v
        .get("totalTokenCount")
        .and_then(|v| v.as_u64())
        .unwrap_or((prompt + completion) as u64) as u32;
    Some(Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: total,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for GoogleProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let model = req
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let url = self.generate_url(&model);
        let body = self.build_body(req);

        tracing::debug!(provider = %self.id, url = %redact_url_key(&url), "google chat request");

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        let response = parse_gemini_response(&resp_json, &model)?;
        if let Some(usage) = response.usage {
            tracing::debug!(
                provider = %self.id,
                model = %model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "google chat usage"
            );
        }
        Ok(response)
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> GoogleProvider {
        let cfg = LlmConfig {
            google_api_key: Some("test-key".into()),
            base_url: "https://gemini.example/".into(),
            ..Default::default()
        };
        GoogleProvider::from_config(&cfg).unwrap()
    }

    #[test]
    fn from_config_requires_key() {
        let err = GoogleProvider::from_config(&LlmConfig::default())
            .err()
            .expect("missing key must fail");
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn generate_url_trims_base() {
        let p = provider();
        assert_eq!(
            p.generate_url("gemini-2.0-flash"),
            "https://gemini.example/v1beta/models/gemini-2.0-flash:generateContent?key=test-key"
        );
    }

    #[test]
    fn body_splits_system_and_maps_roles() {
        let p = provider();
        let req = ChatRequest {
            messages: vec![
                Message::system("be brief"),
                Message::user("hi"),
                Message::assistant("hello"),
                Message::user("again"),
            ],
            stop: vec!["\nObservation".into()],
            ..Default::default()
        };
        let body = p.build_body(&req);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "again");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 3000);
        assert_eq!(body["generationConfig"]["stopSequences"], json!(["\nObservation"]));
    }

    #[test]
    fn request_overrides_defaults() {
        let p = provider();
        let req = ChatRequest {
            messages: vec![Message::user("x")],
            temperature: Some(0.5),
            max_tokens: Some(10),
            ..Default::default()
        };
        let body = p.build_body(&req);
        assert_eq!(body["generationConfig"]["temperature"], json!(0.5));
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 10);
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn summarizer_uses_lite_model() {
        let cfg = LlmConfig {
            google_api_key: Some("k".into()),
            ..Default::default()
        };
        let p = GoogleProvider::summarizer_from_config(&cfg).unwrap();
        assert_eq!(p.default_model(), "gemini-2.0-flash-lite");
        assert_eq!(p.provider_id(), "google-summarizer");
        let body = p.build_body(&ChatRequest::new(vec![Message::user("x")]));
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1000);
    }

    #[test]
    fn parses_text_parts_and_usage() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"text": "Hello "}, {"text": "world"}], "role": "model"},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3}
        });
        let resp = parse_gemini_response(&body, "gemini-2.0-flash").unwrap();
        assert_eq!(resp.content, "Hello world");
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        let usage = resp.usage.unwrap();
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn blocked_prompt_is_provider_error() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = parse_gemini_response(&body, "m").unwrap_err();
        assert!(err.to_string().contains("prompt blocked: SAFETY"));
    }

    #[test]
    fn max_tokens_finish_reason_maps_to_length() {
        let body = json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "MAX_TOKENS"}]
        });
        let resp = parse_gemini_response(&body, "m").unwrap();
        assert_eq!(resp.content, "");
        assert_eq!(resp.finish_reason.as_deref(), Some("length"));
    }
}
