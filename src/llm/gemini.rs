//! Google Gemini `generateContent` client

use super::{ChatModel, LlmError, ModelReply, Usage};
use crate::config::GenerationParams;
use crate::transcript::{Speaker, Turn};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gemini chat client
pub struct GeminiChat {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
    generation: GenerationParams,
}

impl GeminiChat {
    /// Build a client for the given hosted model revision.
    ///
    /// Fails only on HTTP client construction, which is fatal at startup.
    pub fn new(
        api_key: String,
        model_name: impl Into<String>,
        generation: GenerationParams,
    ) -> Result<Self, LlmError> {
        let model_name = model_name.into();
        let base_url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{model_name}:generateContent"
        );

        // Per-request timeouts are applied in send_message; no global timeout.
        let client = Client::builder()
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model_name,
            base_url,
            generation,
        })
    }

    fn translate_request(&self, context: &[Turn], text: &str) -> GeminiRequest {
        let mut contents: Vec<GeminiContent> = context.iter().map(GeminiContent::from_turn).collect();

        // The new utterance rides as the final user entry.
        contents.push(GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart {
                text: text.to_string(),
            }],
        });

        GeminiRequest {
            contents,
            generation_config: Some(GeminiGenerationConfig {
                temperature: Some(self.generation.temperature),
                max_output_tokens: Some(self.generation.max_output_tokens),
            }),
        }
    }

    fn normalize_response(resp: GeminiResponse) -> ModelReply {
        let usage = resp
            .usage_metadata
            .map(|u| Usage {
                prompt_tokens: u64::from(u.prompt_token_count),
                reply_tokens: u64::from(u.candidates_token_count),
            })
            .unwrap_or_default();

        let text = resp
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty());

        ModelReply { text, usage }
    }
}

#[async_trait]
impl ChatModel for GeminiChat {
    async fn send_message(
        &self,
        context: &[Turn],
        text: &str,
        timeout: Duration,
    ) -> Result<ModelReply, LlmError> {
        let request = self.translate_request(context, text);
        let url = format!("{}?key={}", self.base_url, self.api_key);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            if let Ok(error_resp) = serde_json::from_str::<GeminiErrorResponse>(&body) {
                let message = error_resp.error.message;
                return Err(match status.as_u16() {
                    400 => LlmError::invalid_request(format!("Invalid request: {message}")),
                    401 | 403 => LlmError::auth(format!("Authentication failed: {message}")),
                    429 => LlmError::rate_limit(format!("Rate limit exceeded: {message}")),
                    500..=599 => LlmError::server_error(format!("Server error: {message}")),
                    _ => LlmError::unknown(format!("HTTP {status}: {message}")),
                });
            }
            return Err(LlmError::unknown(format!("HTTP {status} error: {body}")));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::unknown(format!("Failed to parse response: {e} - body: {body}")))?;

        Ok(Self::normalize_response(gemini_response))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn from_turn(turn: &Turn) -> Self {
        let role = match turn.speaker {
            Speaker::User => "user",
            Speaker::Assistant => "model",
        };
        Self {
            role: Some(role.to_string()),
            parts: vec![GeminiPart {
                text: turn.text.clone(),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: GeminiCandidateContent,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: u32,
    candidates_token_count: u32,
    #[allow(dead_code)]
    total_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiApiError,
}

#[derive(Debug, Deserialize)]
struct GeminiApiError {
    message: String,
    #[allow(dead_code)]
    code: Option<i32>,
    #[allow(dead_code)]
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> GeminiChat {
        GeminiChat::new(
            "test-key".to_string(),
            "gemini-1.5-flash",
            GenerationParams::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_request_wire_shape() {
        let client = test_client();
        let context = vec![
            Turn::user("Kamu adalah Pemandu wisata alam."),
            Turn::assistant("Baik!"),
        ];
        let request = client.translate_request(&context, "Bandung");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][1]["role"], "model");
        assert_eq!(value["contents"][2]["role"], "user");
        assert_eq!(value["contents"][2]["parts"][0]["text"], "Bandung");
        let temperature = value["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.4).abs() < 1e-6);
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 500);
    }

    #[test]
    fn test_assistant_maps_to_model_role() {
        let content = GeminiContent::from_turn(&Turn::assistant("halo"));
        assert_eq!(content.role.as_deref(), Some("model"));
        assert_eq!(content.parts[0].text, "halo");
    }

    #[test]
    fn test_normalize_response_with_text() {
        let resp: GeminiResponse = serde_json::from_str(
            r#"{
                "candidates": [
                    {"content": {"parts": [{"text": "Coba Kebun Raya Bogor"}]}, "finishReason": "STOP"}
                ],
                "usageMetadata": {"promptTokenCount": 42, "candidatesTokenCount": 7, "totalTokenCount": 49}
            }"#,
        )
        .unwrap();

        let reply = GeminiChat::normalize_response(resp);
        assert_eq!(reply.text.as_deref(), Some("Coba Kebun Raya Bogor"));
        assert_eq!(reply.usage.prompt_tokens, 42);
        assert_eq!(reply.usage.reply_tokens, 7);
    }

    #[test]
    fn test_normalize_response_no_candidates() {
        let resp: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        let reply = GeminiChat::normalize_response(resp);
        assert!(reply.text.is_none());
    }

    #[test]
    fn test_normalize_response_empty_text() {
        let resp: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": ""}]}}]}"#,
        )
        .unwrap();
        let reply = GeminiChat::normalize_response(resp);
        assert!(reply.text.is_none());
    }

    #[test]
    fn test_error_body_parses() {
        let err: GeminiErrorResponse = serde_json::from_str(
            r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#,
        )
        .unwrap();
        assert_eq!(err.error.message, "Quota exceeded");
    }
}
