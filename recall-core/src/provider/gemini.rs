//! Google Gemini provider implementation
//!
//! Talks to the Generative Language REST API (`models/<model>:generateContent`).
//! System messages are sent as `systemInstruction`; assistant turns map to the
//! `model` role.

use super::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Gemini provider
pub struct GeminiProvider {
    client: Client,
    config: ProviderConfig,
}

impl GeminiProvider {
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
            .unwrap_or("https://generativelanguage.googleapis.com/v1beta")
            .trim_end_matches('/')
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.base_url(), model_path(model))
    }
}

/// Model identifiers may be given with or without the `models/` prefix
fn model_path(model: &str) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        self.config
            .default_model
            .as_deref()
            .unwrap_or("models/gemini-2.5-pro")
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let model = request.model.as_deref().unwrap_or(self.default_model());
        let api_request = GeminiRequest::from_request(&request);

        let api_key = self.config.api_key.as_ref()
            .ok_or(ProviderError::AuthenticationFailed)?;

        let mut req = self.client
            .post(self.endpoint(model))
            .header("x-goog-api-key", api_key)
            .json(&api_request);

        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }

        debug!(model, contents = api_request.contents.len(), "gemini generateContent");

        let response = req.send().await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();

            if status == 429 {
                return Err(ProviderError::RateLimited { retry_after: None });
            } else if status == 401 || status == 403 {
                return Err(ProviderError::AuthenticationFailed);
            }

            return Err(ProviderError::Api { status, message: text });
        }

        let raw: serde_json::Value = response.json().await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parse_response(&raw, model))
    }
}

fn parse_response(raw: &serde_json::Value, requested_model: &str) -> CompletionResponse {
    let finish_reason = match raw
        .pointer("/candidates/0/finishReason")
        .and_then(|v| v.as_str())
    {
        Some("STOP") => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") => FinishReason::ContentFilter,
        _ => FinishReason::Unknown,
    };

    let usage = raw
        .get("usageMetadata")
        .cloned()
        .and_then(|u| serde_json::from_value::<GeminiUsage>(u).ok())
        .map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        })
        .unwrap_or_default();

    CompletionResponse {
        id: raw
            .get("responseId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        model: raw
            .get("modelVersion")
            .and_then(|v| v.as_str())
            .unwrap_or(requested_model)
            .to_string(),
        content: extract_text(raw),
        finish_reason,
        usage,
    }
}

// ============================================================================
// Gemini API Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GeminiRequest {
    fn from_request(request: &CompletionRequest) -> Self {
        let mut system = Vec::new();
        let mut contents = Vec::new();

        for msg in &request.messages {
            let part = GeminiPart { text: msg.content.clone() };
            match msg.role {
                Role::System => system.push(part),
                Role::User => contents.push(GeminiContent { role: Some("user"), parts: vec![part] }),
                Role::Assistant => contents.push(GeminiContent { role: Some("model"), parts: vec![part] }),
            }
        }

        let generation_config = if request.temperature.is_some()
            || request.max_tokens.is_some()
            || request.stop.is_some()
        {
            Some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                stop_sequences: request.stop.clone(),
            })
        } else {
            None
        };

        Self {
            contents,
            system_instruction: (!system.is_empty()).then(|| GeminiContent { role: None, parts: system }),
            generation_config,
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
    #[serde(default)]
    total_token_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_path() {
        assert_eq!(model_path("models/gemini-2.5-pro"), "models/gemini-2.5-pro");
        assert_eq!(model_path("gemini-2.5-flash"), "models/gemini-2.5-flash");
    }

    #[test]
    fn test_endpoint() {
        let provider = GeminiProvider::new(ProviderConfig::gemini("key")).unwrap();
        assert_eq!(
            provider.endpoint("models/gemini-2.5-pro"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-pro:generateContent"
        );
    }

    #[test]
    fn test_request_mapping() {
        let request = CompletionRequest::new(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi"),
        ]);
        let value = serde_json::to_value(GeminiRequest::from_request(&request)).unwrap();

        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be brief");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][1]["role"], "model");
        assert!(value.get("generationConfig").is_none());
    }

    #[test]
    fn test_request_generation_config() {
        let request = CompletionRequest::new(vec![ChatMessage::user("x")]).with_max_tokens(128);
        let value = serde_json::to_value(GeminiRequest::from_request(&request)).unwrap();
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 128);
        assert!(value.get("systemInstruction").is_none());
    }

    #[test]
    fn test_parse_response() {
        let raw = json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "1) Look it up" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 5, "totalTokenCount": 17 },
            "modelVersion": "gemini-2.5-pro",
            "responseId": "abc"
        });

        let response = parse_response(&raw, "models/gemini-2.5-pro");
        assert_eq!(response.content, "1) Look it up");
        assert_eq!(response.model, "gemini-2.5-pro");
        assert_eq!(response.id, "abc");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage.prompt_tokens, 12);
        assert_eq!(response.usage.total_tokens, 17);
    }

    #[test]
    fn test_parse_blocked_response_falls_back_to_raw() {
        let raw = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let response = parse_response(&raw, "models/gemini-2.5-pro");
        assert!(response.content.contains("blockReason"));
        assert_eq!(response.model, "models/gemini-2.5-pro");
    }
}
