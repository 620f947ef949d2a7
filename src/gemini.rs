use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::constants;

/// The API key travels in this header, never in the URL.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Sampling knobs passed through to the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

/// One structured-output generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub user_content: String,
    pub response_schema: serde_json::Value,
    pub sampling: SamplingParams,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode API response: {0}")]
    Decode(String),
    #[error("model returned no text")]
    EmptyResponse,
}

/// The generative-AI collaborator. Returns the raw text of the model's reply.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, ClientError>;
}

// Structures matching Gemini's models/{model}:generateContent endpoint
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl GeminiRequest {
    fn from_generation(request: GenerationRequest) -> Self {
        Self {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: Some(request.system_instruction),
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(request.user_content),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json",
                response_schema: request.response_schema,
                temperature: request.sampling.temperature,
                top_p: request.sampling.top_p,
                top_k: request.sampling.top_k,
            },
        }
    }
}

impl GeminiResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Result<String, ClientError> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(ClientError::EmptyResponse)?;

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            debug!(finish_reason = ?candidate.finish_reason, "Candidate carried no text");
            return Err(ClientError::EmptyResponse);
        }
        Ok(text.trim().to_string())
    }
}

/// HTTP client for the Gemini API. Construct once at startup and share.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_base_url(api_key, model, constants::GEMINI_BASE_URL.as_str())
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(constants::REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn generate(&self, request: GenerationRequest) -> Result<String, ClientError> {
        let url = self.endpoint();
        debug!(
            system_len = request.system_instruction.len(),
            prompt_len = request.user_content.len(),
            temperature = request.sampling.temperature,
            "Sending Gemini generateContent request"
        );
        let payload = GeminiRequest::from_generation(request);

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&payload)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %body, "Gemini API request failed");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let gemini_response = response
            .json::<GeminiResponse>()
            .await
            .map_err(|e| ClientError::Decode(e.without_url().to_string()))?;

        let text = gemini_response.into_text()?;
        debug!(len = text.len(), "Received Gemini response");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> GenerationRequest {
        GenerationRequest {
            system_instruction: "be kind".to_string(),
            user_content: "hello".to_string(),
            response_schema: json!({"type": "ARRAY"}),
            sampling: SamplingParams {
                temperature: 0.3,
                top_p: None,
                top_k: None,
            },
        }
    }

    #[test]
    fn test_request_wire_format() {
        let value = serde_json::to_value(GeminiRequest::from_generation(request())).unwrap();
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be kind");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        let config = &value["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["type"], "ARRAY");
        assert!(config.get("topP").is_none());
        assert!(config.get("topK").is_none());
    }

    #[test]
    fn test_sampling_caps_serialized_when_present() {
        let mut req = request();
        req.sampling = SamplingParams {
            temperature: 0.7,
            top_p: Some(0.9),
            top_k: Some(40),
        };
        let value = serde_json::to_value(GeminiRequest::from_generation(req)).unwrap();
        assert_eq!(value["generationConfig"]["topK"], 40);
        assert!(value["generationConfig"]["topP"].as_f64().unwrap() > 0.89);
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": " [{\"source\""}, {"text": ": \"x\"}] "}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(response.into_text().unwrap(), "[{\"source\": \"x\"}]");
    }

    #[test]
    fn test_blocked_response_is_empty() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();
        assert!(matches!(
            response.into_text(),
            Err(ClientError::EmptyResponse)
        ));

        let response: GeminiResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            response.into_text(),
            Err(ClientError::EmptyResponse)
        ));
    }

    #[test]
    fn test_debug_output_redacts_api_key() {
        let client = GeminiClient::with_base_url("AIza-secret", "gemini-2.5-pro", "http://localhost/").unwrap();
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("AIza-secret"));
        assert!(rendered.contains("gemini-2.5-pro"));
    }
}
