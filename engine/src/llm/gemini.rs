use super::{LLMError, LLMProvider, Message, MessageRole};
use crate::config::GeminiConfig;
use crate::secrets::SecretStore;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct GeminiProvider {
    config: GeminiConfig,
    secrets: Arc<SecretStore>,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig, secrets: Arc<SecretStore>) -> Self {
        Self {
            config,
            secrets,
            client: reqwest::Client::new(),
        }
    }

    fn build_payload(messages: &[Message], temperature: f32) -> serde_json::Value {
        let mut contents = Vec::new();
        let mut system_instruction = None;

        for msg in messages {
            if msg.role == MessageRole::System {
                system_instruction = Some(json!({
                    "parts": [{"text": msg.content}]
                }));
                continue;
            }

            let mut parts = vec![json!({"text": msg.content})];
            for media in &msg.media {
                parts.push(json!({
                    "inline_data": {
                        "mime_type": media.mime_type,
                        "data": media.data,
                    }
                }));
            }

            contents.push(json!({
                "role": if msg.role == MessageRole::Assistant { "model" } else { "user" },
                "parts": parts,
            }));
        }

        let mut payload = serde_json::Map::new();
        payload.insert("contents".to_string(), json!(contents));
        payload.insert(
            "generationConfig".to_string(),
            json!({ "temperature": temperature }),
        );

        if let Some(sys) = system_instruction {
            payload.insert("systemInstruction".to_string(), sys);
        }

        serde_json::Value::Object(payload)
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn is_local(&self) -> bool {
        false
    }

    fn estimated_cost(&self, tokens: usize) -> f64 {
        // approx $0.001 per 1k tokens
        (tokens as f64 / 1000.0) * 0.001
    }

    async fn check_health(&self) -> bool {
        self.secrets.get("gemini_api_key").is_some()
    }

    async fn generate(&self, messages: &[Message], temperature: f32) -> super::Result<String> {
        let api_key = self.secrets.get("gemini_api_key").ok_or_else(|| {
            LLMError::AuthenticationFailed("GEMINI_API_KEY is not set".to_string())
        })?;

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let payload = Self::build_payload(messages, temperature);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key.unsecure())
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                400 | 404 => LLMError::InvalidRequest(text),
                429 => LLMError::RateLimitExceeded,
                401 | 403 => LLMError::AuthenticationFailed(text),
                _ => LLMError::ProviderUnavailable(format!(
                    "Gemini API error ({}): {}",
                    status, text
                )),
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let candidate = data
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| LLMError::ParseError("No candidates in response".to_string()))?;

        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .ok_or_else(|| LLMError::ParseError("No parts in candidate content".to_string()))?;

        let full_text: String = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .collect();

        Ok(full_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MediaPart;

    #[test]
    fn test_payload_shape() {
        let media = MediaPart {
            name: "mock.png".into(),
            mime_type: "image/png".into(),
            data: "AAAA".into(),
        };
        let messages = vec![
            Message::system("be terse"),
            Message::user("describe this").with_media(&[media]),
        ];

        let payload = GeminiProvider::build_payload(&messages, 0.4);

        assert_eq!(payload["systemInstruction"]["parts"][0]["text"], "be terse");
        assert_eq!(payload["contents"].as_array().map(|c| c.len()), Some(1));
        assert_eq!(payload["contents"][0]["role"], "user");
        assert_eq!(
            payload["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/png"
        );
        let temperature = payload["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.4).abs() < 1e-6);
    }
}
