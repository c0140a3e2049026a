//! OpenAI-compatible provider implementation
//!
//! Works with OpenAI, Azure OpenAI, vLLM, Ollama, and other OpenAI-compatible APIs.

use super::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// OpenAI-compatible provider
pub struct OpenAIProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAIProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.unwrap_or(120)))
            .build()
            .map_err(|e| ProviderError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1")
            .trim_end_matches('/')
    }
}

impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        self.config.default_model.as_deref().unwrap_or("gpt-4o")
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let model = request.model.as_deref().unwrap_or(self.default_model());

        let api_request = OpenAIRequest {
            model: model.to_string(),
            messages: request.messages.iter().map(OpenAIMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stop: request.stop,
        };

        let mut req = self.client
            .post(format!("{}/chat/completions", self.base_url()))
            .json(&api_request);

        if let Some(api_key) = &self.config.api_key {
            if !api_key.is_empty() {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }
        }

        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }

        debug!(model, messages = api_request.messages.len(), "openai chat completion");

        let response = req.send().await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();

            if status == 429 {
                return Err(ProviderError::RateLimited { retry_after: None });
            } else if status == 401 {
                return Err(ProviderError::AuthenticationFailed);
            }

            return Err(ProviderError::Api { status, message: text });
        }

        let raw: serde_json::Value = response.json().await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parse_response(&raw, model))
    }
}

/// Build a completion response from a raw `/chat/completions` payload
fn parse_response(raw: &serde_json::Value, requested_model: &str) -> CompletionResponse {
    let finish_reason = match raw.pointer("/choices/0/finish_reason").and_then(|v| v.as_str()) {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Unknown,
    };

    let usage = raw
        .get("usage")
        .cloned()
        .and_then(|u| serde_json::from_value::<OpenAIUsage>(u).ok())
        .map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        })
        .unwrap_or_default();

    CompletionResponse {
        id: raw.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        model: raw
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or(requested_model)
            .to_string(),
        content: extract_text(raw),
        finish_reason,
        usage,
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

impl From<&ChatMessage> for OpenAIMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = OpenAIRequest {
            model: "gpt-4o".into(),
            messages: vec![
                OpenAIMessage::from(&ChatMessage::system("sys")),
                OpenAIMessage::from(&ChatMessage::user("hi")),
            ],
            temperature: None,
            max_tokens: Some(64),
            stop: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
        assert_eq!(value["max_tokens"], 64);
        assert!(value.get("temperature").is_none());
    }

    #[test]
    fn test_parse_response() {
        let raw = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-2024",
            "choices": [{
                "message": { "role": "assistant", "content": "CALCULATE: 6*7" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14 }
        });

        let response = parse_response(&raw, "gpt-4o");
        assert_eq!(response.id, "chatcmpl-1");
        assert_eq!(response.model, "gpt-4o-2024");
        assert_eq!(response.content, "CALCULATE: 6*7");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage.total_tokens, 14);
    }

    #[test]
    fn test_parse_response_unexpected_shape() {
        let raw = json!({ "weird": true });
        let response = parse_response(&raw, "gpt-4o");
        assert_eq!(response.model, "gpt-4o");
        assert_eq!(response.content, r#"{"weird":true}"#);
        assert_eq!(response.finish_reason, FinishReason::Unknown);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let provider = OpenAIProvider::new(
            ProviderConfig::openai("sk").with_base_url("http://localhost:11434/v1/"),
        )
        .unwrap();
        assert_eq!(provider.base_url(), "http://localhost:11434/v1");
        assert_eq!(provider.default_model(), "gpt-4o");
        assert_eq!(provider.name(), "openai");
    }
}
