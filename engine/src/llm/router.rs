//! LLM Router
//!
//! Orders the configured providers (default provider first, then cloud
//! before local, cheaper first) and calls them in turn until one answers.
//! Each attempt runs under its own timeout.

use super::{GenerationStyle, Generator, LLMError, LLMProvider, MediaPart, Message};
use crate::config::LLMConfig;
use crate::llm::{gemini::GeminiProvider, ollama::OllamaProvider, openai::OpenAIProvider};
use crate::secrets::SecretStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Rough token estimate: ~4 characters per token
fn estimate_tokens(messages: &[Message]) -> usize {
    let total_chars: usize = messages.iter().map(|m| m.content.len()).sum();
    total_chars / 4
}

/// LLM Router with ordered failover
pub struct LLMRouter {
    providers: Vec<Box<dyn LLMProvider>>,
    config: Arc<LLMConfig>,
}

impl LLMRouter {
    pub fn new(providers: Vec<Box<dyn LLMProvider>>, config: Arc<LLMConfig>) -> Self {
        Self { providers, config }
    }

    /// Build every supported provider from configuration
    pub fn from_config(config: Arc<LLMConfig>, secrets: Arc<SecretStore>) -> Self {
        let providers: Vec<Box<dyn LLMProvider>> = vec![
            Box::new(GeminiProvider::new(
                config.gemini.clone(),
                Arc::clone(&secrets),
            )),
            Box::new(OpenAIProvider::new(
                config.openai.clone(),
                Arc::clone(&secrets),
            )),
            Box::new(OllamaProvider::new(
                config.ollama.base_url.clone(),
                config.ollama.model.clone(),
            )),
        ];

        Self::new(providers, config)
    }

    /// Rank providers for a request of `estimated_tokens`
    ///
    /// Returns a sorted list of providers (best first).
    pub fn rank_providers(&self, estimated_tokens: usize) -> Vec<&dyn LLMProvider> {
        let mut providers: Vec<&dyn LLMProvider> =
            self.providers.iter().map(|b| b.as_ref()).collect();

        let default_provider = self.config.default_provider.as_str();

        providers.sort_by(|a, b| {
            let score = |p: &dyn LLMProvider| {
                let mut score = 0.0_f64;
                // Strongly prefer the configured default provider
                if p.name() == default_provider {
                    score += 200.0;
                }
                // Multimodal prompts need the cloud context windows
                if !p.is_local() {
                    score += 50.0;
                }
                score - p.estimated_cost(estimated_tokens) * 1000.0
            };

            score(*b)
                .partial_cmp(&score(*a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        providers
    }

    fn timeout_for(&self, provider: &dyn LLMProvider) -> Duration {
        if provider.is_local() {
            Duration::from_secs(self.config.local_timeout_secs)
        } else {
            Duration::from_secs(self.config.cloud_timeout_secs)
        }
    }

    /// Call LLM providers with automatic failover
    ///
    /// Returns the generated text and the name of the provider that produced it.
    pub async fn call(
        &self,
        messages: &[Message],
        temperature: f32,
    ) -> super::Result<(String, String)> {
        if self.providers.is_empty() {
            return Err(LLMError::ProviderUnavailable(
                "No LLM providers configured".to_string(),
            ));
        }

        let ranked_providers = self.rank_providers(estimate_tokens(messages));

        for provider in ranked_providers {
            let timeout = self.timeout_for(provider);
            tracing::debug!(
                "Attempting provider: {} (timeout: {}s)",
                provider.name(),
                timeout.as_secs()
            );

            let result =
                tokio::time::timeout(timeout, provider.generate(messages, temperature)).await;

            match result {
                Ok(Ok(text)) => {
                    tracing::info!("Provider {} succeeded", provider.name());
                    return Ok((text, provider.name().to_string()));
                }
                Ok(Err(e)) => {
                    tracing::warn!("Provider {} failed: {}", provider.name(), e);
                }
                Err(_) => {
                    tracing::warn!(
                        "Provider {} timed out after {}s",
                        provider.name(),
                        timeout.as_secs()
                    );
                }
            }
        }

        tracing::error!("All LLM providers exhausted");
        Err(LLMError::ProviderUnavailable(
            "All LLM providers failed".to_string(),
        ))
    }

    /// Check the health of all registered providers
    /// Returns a list of (provider_name, is_healthy)
    pub async fn check_health(&self) -> Vec<(String, bool)> {
        let mut results = Vec::new();
        for provider in &self.providers {
            let is_healthy = provider.check_health().await;
            results.push((provider.name().to_string(), is_healthy));
        }
        results
    }

    /// Names of the registered providers in ranked order
    pub fn provider_names(&self) -> Vec<String> {
        self.rank_providers(0)
            .into_iter()
            .map(|p| p.name().to_string())
            .collect()
    }
}

#[async_trait]
impl Generator for LLMRouter {
    async fn generate(
        &self,
        prompt: &str,
        media: &[MediaPart],
        style: GenerationStyle,
    ) -> super::Result<String> {
        let temperature = match style {
            GenerationStyle::Creative => self.config.creative_temperature,
            GenerationStyle::Analytical => self.config.analytical_temperature,
        };

        let messages = [Message::user(prompt).with_media(media)];
        let (text, provider) = self.call(&messages, temperature).await?;
        tracing::debug!(provider = %provider, chars = text.len(), "generation complete");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Mock provider for testing
    struct MockProvider {
        name: String,
        is_local: bool,
        cost_per_1k: f64,
        reply: Option<String>,
        calls: Arc<AtomicUsize>,
    }

    impl MockProvider {
        fn new(name: &str, is_local: bool, cost_per_1k: f64, reply: Option<&str>) -> Self {
            Self {
                name: name.to_string(),
                is_local,
                cost_per_1k,
                reply: reply.map(str::to_string),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_local(&self) -> bool {
            self.is_local
        }

        fn estimated_cost(&self, tokens: usize) -> f64 {
            (tokens as f64 / 1000.0) * self.cost_per_1k
        }

        async fn generate(
            &self,
            _messages: &[Message],
            _temperature: f32,
        ) -> crate::llm::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .clone()
                .ok_or_else(|| LLMError::NetworkError("connection refused".to_string()))
        }
    }

    fn create_test_config(default_provider: &str) -> Arc<LLMConfig> {
        let mut config = Config::default_config().llm;
        config.default_provider = default_provider.to_string();
        Arc::new(config)
    }

    #[test]
    fn test_default_provider_ranks_first() {
        let providers: Vec<Box<dyn LLMProvider>> = vec![
            Box::new(MockProvider::new("openai", false, 0.002, None)),
            Box::new(MockProvider::new("ollama", true, 0.0, None)),
            Box::new(MockProvider::new("gemini", false, 0.001, None)),
        ];
        let router = LLMRouter::new(providers, create_test_config("ollama"));

        let ranked = router.rank_providers(1000);
        assert_eq!(ranked[0].name(), "ollama");
    }

    #[test]
    fn test_cloud_then_cost_ordering() {
        let providers: Vec<Box<dyn LLMProvider>> = vec![
            Box::new(MockProvider::new("ollama", true, 0.0, None)),
            Box::new(MockProvider::new("expensive", false, 0.010, None)),
            Box::new(MockProvider::new("cheap", false, 0.001, None)),
        ];
        let router = LLMRouter::new(providers, create_test_config("gemini"));

        let names: Vec<_> = router
            .rank_providers(1000)
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["cheap", "expensive", "ollama"]);
    }

    #[tokio::test]
    async fn test_failover_to_next_provider() {
        let failing = MockProvider::new("gemini", false, 0.001, None);
        let failing_calls = Arc::clone(&failing.calls);
        let providers: Vec<Box<dyn LLMProvider>> = vec![
            Box::new(failing),
            Box::new(MockProvider::new("ollama", true, 0.0, Some("local answer"))),
        ];
        let router = LLMRouter::new(providers, create_test_config("gemini"));

        let (text, provider) = router.call(&[Message::user("hi")], 0.0).await.unwrap();
        assert_eq!(text, "local answer");
        assert_eq!(provider, "ollama");
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_providers_failing() {
        let providers: Vec<Box<dyn LLMProvider>> =
            vec![Box::new(MockProvider::new("gemini", false, 0.001, None))];
        let router = LLMRouter::new(providers, create_test_config("gemini"));

        let err = router.call(&[Message::user("hi")], 0.0).await.unwrap_err();
        assert!(matches!(err, LLMError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn test_no_providers() {
        let router = LLMRouter::new(vec![], create_test_config("gemini"));
        let result = router
            .generate("hi", &[], GenerationStyle::Analytical)
            .await;
        assert!(result.is_err());
    }
}
