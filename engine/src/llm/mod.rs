//! LLM Provider Abstraction Layer
//!
//! This module provides a common interface for the text generation providers
//! (Gemini, OpenAI-compatible, Ollama). The `LLMProvider` trait is the
//! contract each provider implements; the `Generator` trait is what workers
//! depend on, implemented by the failover router.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod router;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Inline binary content sent alongside a prompt (images, audio, video, PDF)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaPart {
    /// Original file name, for logging
    pub name: String,

    /// MIME type, e.g. `image/png`
    pub mime_type: String,

    /// Base64 encoded bytes
    pub data: String,
}

impl MediaPart {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }

    /// `data:` URL form used by OpenAI-compatible APIs
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Message sent to a provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system)
    pub role: MessageRole,

    /// Text content of the message
    pub content: String,

    /// Attached media, only honoured on user messages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaPart>,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            media: Vec::new(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            media: Vec::new(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            media: Vec::new(),
        }
    }

    /// Attach media to this message
    pub fn with_media(mut self, media: &[MediaPart]) -> Self {
        self.media.extend_from_slice(media);
        self
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Sampling profile requested by a worker
///
/// Creative output (code, plans, designs, chat) and analytical output
/// (routing, review verdicts) run at different temperatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStyle {
    Creative,
    Analytical,
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "gemini", "openai", "ollama")
    fn name(&self) -> &str;

    /// Returns true if this is a local provider (e.g., Ollama)
    fn is_local(&self) -> bool;

    /// Returns the estimated cost in USD for the given token count.
    /// Local providers should return 0.0
    fn estimated_cost(&self, tokens: usize) -> f64;

    /// Generate a text completion
    async fn generate(&self, messages: &[Message], temperature: f32) -> Result<String>;

    /// Check if the provider is currently healthy and available
    async fn check_health(&self) -> bool {
        true
    }
}

/// Text generation collaborator used by workers
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        media: &[MediaPart],
        style: GenerationStyle,
    ) -> Result<String>;
}

/// Find the JSON object in a model reply.
///
/// Handles multiple output formats:
/// 1. Raw JSON: the entire reply is an object
/// 2. Fenced JSON (with or without surrounding prose): ` ```json\n{...}\n``` `
/// 3. An object embedded in prose: the first balanced `{...}`
pub fn extract_json_object(content: &str) -> Option<serde_json::Value> {
    let trimmed = content.trim();

    if let Some(value) = parse_object(trimmed) {
        return Some(value);
    }

    if let Some(inner) = extract_fenced_block(trimmed) {
        if let Some(value) = parse_object(inner.trim()) {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    extract_balanced_json(&trimmed[start..]).and_then(parse_object)
}

fn parse_object(s: &str) -> Option<serde_json::Value> {
    serde_json::from_str::<serde_json::Value>(s)
        .ok()
        .filter(|v| v.is_object())
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing fence.
fn extract_fenced_block(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, MessageRole::User);
        assert_eq!(user_msg.content, "Hello");
        assert!(user_msg.media.is_empty());

        let system_msg = Message::system("You are a planner");
        assert_eq!(system_msg.role, MessageRole::System);
    }

    #[test]
    fn test_with_media() {
        let part = MediaPart {
            name: "mock.png".into(),
            mime_type: "image/png".into(),
            data: "AAAA".into(),
        };
        let msg = Message::user("describe").with_media(std::slice::from_ref(&part));
        assert_eq!(msg.media.len(), 1);
        assert!(part.is_image());
        assert!(!part.is_video());
        assert_eq!(part.data_url(), "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_extract_raw_json() {
        let value = extract_json_object(r#"{"approved": true, "feedback": null}"#).unwrap();
        assert_eq!(value["approved"], true);
    }

    #[test]
    fn test_extract_fenced_json() {
        let content = "```json\n{\"plan_type\": \"frontend_only\"}\n```\nHope this helps!";
        let value = extract_json_object(content).unwrap();
        assert_eq!(value["plan_type"], "frontend_only");
    }

    #[test]
    fn test_extract_embedded_json() {
        let content = r#"Here is my verdict: {"approved": false, "feedback": "add {braces}"} thanks"#;
        let value = extract_json_object(content).unwrap();
        assert_eq!(value["feedback"], "add {braces}");
    }

    #[test]
    fn test_extract_rejects_non_objects() {
        assert!(extract_json_object("[1, 2, 3]").is_none());
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("{ broken").is_none());
    }
}
