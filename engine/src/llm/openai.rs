use super::{LLMError, LLMProvider, Message, MessageRole};
use crate::config::OpenAIConfig;
use crate::secrets::SecretStore;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct OpenAIProvider {
    config: OpenAIConfig,
    secrets: Arc<SecretStore>,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig, secrets: Arc<SecretStore>) -> Self {
        Self {
            config,
            secrets,
            client: reqwest::Client::new(),
        }
    }

    /// Images become `image_url` parts; other media types are not accepted by
    /// the chat completions API and are dropped.
    fn convert_message(msg: &Message) -> serde_json::Value {
        let images: Vec<_> = msg.media.iter().filter(|m| m.is_image()).collect();
        let skipped = msg.media.len() - images.len();
        if skipped > 0 {
            tracing::debug!("OpenAI: dropping {} non-image attachment(s)", skipped);
        }

        if msg.role != MessageRole::User || images.is_empty() {
            return json!({
                "role": msg.role.to_string(),
                "content": msg.content,
            });
        }

        let mut parts = vec![json!({"type": "text", "text": msg.content})];
        for image in images {
            parts.push(json!({
                "type": "image_url",
                "image_url": {"url": image.data_url()},
            }));
        }

        json!({"role": "user", "content": parts})
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_local(&self) -> bool {
        false
    }

    fn estimated_cost(&self, tokens: usize) -> f64 {
        // Approx $0.002 per 1k tokens for gpt-4o-mini
        (tokens as f64 / 1000.0) * 0.002
    }

    async fn check_health(&self) -> bool {
        self.secrets.get("openai_api_key").is_some()
    }

    async fn generate(&self, messages: &[Message], temperature: f32) -> super::Result<String> {
        let api_key = self.secrets.get("openai_api_key").ok_or_else(|| {
            LLMError::AuthenticationFailed("OPENAI_API_KEY is not set".to_string())
        })?;

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let api_messages: Vec<_> = messages.iter().map(Self::convert_message).collect();

        let payload = json!({
            "model": self.config.model,
            "messages": api_messages,
            "temperature": temperature,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key.unsecure()))
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
                401 | 403 => LLMError::AuthenticationFailed(text),
                429 => LLMError::RateLimitExceeded,
                500..=599 => LLMError::ProviderUnavailable(format!(
                    "OpenAI API error ({}): {}",
                    status, text
                )),
                _ => LLMError::InvalidRequest(text),
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let choice = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| LLMError::ParseError("No choices in response".to_string()))?;

        choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| LLMError::ParseError("Empty content".to_string()))
    }
}
