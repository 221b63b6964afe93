//! Configuration management
//!
//! This module handles loading, validation, and management of the DevTeam
//! configuration. Configuration is stored in TOML format at
//! ~/.devteam/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: log level, data directory, artifact/upload/knowledge directories
//! - **llm**: generation provider settings and sampling temperatures
//! - **orchestrator**: iteration cap, history window, delta buffer
//! - **retrieval**: knowledge base chunking and ranking
//! - **server**: bind address and public URL for artifact links
//!
//! # Path Expansion
//!
//! Every directory setting supports `~` and is created on load when missing.
//!
//! # Examples
//!
//! ```no_run
//! use devteam_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Output dir: {:?}", config.core.output_dir);
//! println!("Default provider: {}", config.llm.default_provider);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Providers the router knows how to build
pub const PROVIDERS: [&str; 3] = ["gemini", "openai", "ollama"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// Orchestration loop settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Knowledge base retrieval
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Root directory for generated artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory attachment references are resolved against
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Directory holding the `.md`/`.txt` knowledge base
    #[serde(default = "default_knowledge_dir")]
    pub knowledge_dir: PathBuf,

    /// Write artifacts under `<output_dir>/<session_id>/`
    #[serde(default = "default_true")]
    pub scope_artifacts_by_session: bool,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Default LLM provider (gemini, openai, ollama)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Temperature for code, plan and design generation
    #[serde(default = "default_creative_temperature")]
    pub creative_temperature: f32,

    /// Temperature for routing and review
    #[serde(default = "default_analytical_temperature")]
    pub analytical_temperature: f32,

    /// Per-request timeout for cloud providers (seconds)
    #[serde(default = "default_cloud_timeout")]
    pub cloud_timeout_secs: u64,

    /// Per-request timeout for local providers (seconds)
    #[serde(default = "default_local_timeout")]
    pub local_timeout_secs: u64,

    /// Gemini provider settings
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// OpenAI provider settings
    #[serde(default)]
    pub openai: OpenAIConfig,

    /// Ollama provider settings
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Base URL for Gemini API
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_gemini_model")]
    pub model: String,
    // Note: API key comes from the environment or OS keychain, not config
}

/// OpenAI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for OpenAI-compatible API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_openai_model")]
    pub model: String,
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// Orchestration loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum worker passes per session
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Number of history lines shown to the intent classifier
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Capacity of the per-session delta channel
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            output_dir: default_output_dir(),
            upload_dir: default_upload_dir(),
            knowledge_dir: default_knowledge_dir(),
            scope_artifacts_by_session: true,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            creative_temperature: default_creative_temperature(),
            analytical_temperature: default_analytical_temperature(),
            cloud_timeout_secs: default_cloud_timeout(),
            local_timeout_secs: default_local_timeout(),
            gemini: GeminiConfig::default(),
            openai: OpenAIConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            history_window: default_history_window(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

/// Knowledge base retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Number of chunks returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// When set, artifact links point at `<public_base_url>/outputs/...`
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: None,
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.devteam")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("~/.devteam/outputs")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("~/.devteam/uploads")
}

fn default_knowledge_dir() -> PathBuf {
    PathBuf::from("~/.devteam/knowledge")
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_creative_temperature() -> f32 {
    0.4
}

fn default_analytical_temperature() -> f32 {
    0.0
}

fn default_cloud_timeout() -> u64 {
    90
}

fn default_local_timeout() -> u64 {
    300
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-pro".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_max_iterations() -> u32 {
    10
}

fn default_history_window() -> usize {
    6
}

fn default_stream_buffer() -> usize {
    64
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    4
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.devteam/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;
        Self::load_or_create_at(&config_path)
    }

    /// Same as [`Config::load_or_create`] for an explicit path
    pub fn load_or_create_at(path: &Path) -> Result<Self, EngineError> {
        if path.exists() {
            Self::load_from_path(path)
        } else {
            Self::create_default(path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides();
        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default_config();

        // Written before processing so the file keeps the portable `~` paths
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = config;
        config.apply_env_overrides();
        config.validate_and_process()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.devteam/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".devteam").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig::default(),
            llm: LLMConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            retrieval: RetrievalConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Environment variables that override file values
    fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            if !model.trim().is_empty() {
                self.llm.gemini.model = model.trim().to_string();
            }
        }
    }

    /// Validate and process configuration
    ///
    /// Validates value ranges, expands `~` in every directory and creates
    /// directories that don't exist yet.
    pub fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if !PROVIDERS.contains(&self.llm.default_provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid default provider '{}'. Must be one of: {}",
                self.llm.default_provider,
                PROVIDERS.join(", ")
            )));
        }

        for (name, value) in [
            ("creative_temperature", self.llm.creative_temperature),
            ("analytical_temperature", self.llm.analytical_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(EngineError::Config(format!(
                    "{} must be between 0.0 and 2.0",
                    name
                )));
            }
        }

        if self.llm.cloud_timeout_secs == 0 || self.llm.local_timeout_secs == 0 {
            return Err(EngineError::Config(
                "provider timeouts must be at least 1 second".to_string(),
            ));
        }

        if self.orchestrator.max_iterations == 0 {
            return Err(EngineError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.orchestrator.stream_buffer == 0 {
            return Err(EngineError::Config(
                "stream_buffer must be at least 1".to_string(),
            ));
        }

        if self.retrieval.chunk_size == 0 {
            return Err(EngineError::Config(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(EngineError::Config(
                "chunk_overlap must be smaller than chunk_size".to_string(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(EngineError::Config("top_k must be at least 1".to_string()));
        }

        if let Some(url) = &self.server.public_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(EngineError::Config(format!(
                    "public_base_url must be an http(s) URL, got '{}'",
                    url
                )));
            }
            self.server.public_base_url = Some(url.trim_end_matches('/').to_string());
        }

        self.core.data_dir = canonicalize_or_create(&expand_path(&self.core.data_dir)?)?;
        self.core.output_dir = canonicalize_or_create(&expand_path(&self.core.output_dir)?)?;
        self.core.upload_dir = canonicalize_or_create(&expand_path(&self.core.upload_dir)?)?;
        self.core.knowledge_dir = expand_path(&self.core.knowledge_dir)?;

        Ok(())
    }

    /// SQLite database location
    pub fn database_path(&self) -> PathBuf {
        self.core.data_dir.join("devteam.db")
    }
}

/// Expand ~ in path to user's home directory
pub(crate) fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

/// Canonicalize path, creating it if it doesn't exist
fn canonicalize_or_create(path: &Path) -> Result<PathBuf, EngineError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            EngineError::Config(format!("Failed to create directory {:?}: {}", path, e))
        })?;
    }

    let canonical = path
        .canonicalize()
        .map_err(|e| EngineError::Config(format!("Invalid path {:?}: {}", path, e)))?;

    if !canonical.is_dir() {
        return Err(EngineError::Config(format!(
            "Path is not a directory: {:?}",
            canonical
        )));
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.llm.default_provider, "gemini");
        assert_eq!(config.orchestrator.max_iterations, 10);
        assert_eq!(config.orchestrator.history_window, 6);
        assert_eq!(config.retrieval.chunk_size, 1000);
        assert_eq!(config.retrieval.chunk_overlap, 200);
        assert_eq!(config.server.port, 8000);
        assert!(config.core.scope_artifacts_by_session);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = expand_path(&path).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        let expanded = expand_path(&path).unwrap();

        assert_eq!(expanded, path);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default_config();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.core.log_level, deserialized.core.log_level);
        assert_eq!(
            config.llm.default_provider,
            deserialized.llm.default_provider
        );
        assert_eq!(
            config.orchestrator.max_iterations,
            deserialized.orchestrator.max_iterations
        );
    }

    #[test]
    fn test_optional_sections_default() {
        let toml_string = r#"
            [core]
            [llm]
        "#;
        let config: Config = toml::from_str(toml_string).unwrap();
        assert_eq!(config.llm.default_provider, "gemini");
        assert_eq!(config.orchestrator.max_iterations, 10);
        assert!(config.retrieval.enabled);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default_config();
        config.llm.default_provider = "anthropic".to_string();
        assert!(config.validate_and_process().is_err());

        let mut config = Config::default_config();
        config.orchestrator.max_iterations = 0;
        assert!(config.validate_and_process().is_err());

        let mut config = Config::default_config();
        config.retrieval.chunk_overlap = config.retrieval.chunk_size;
        assert!(config.validate_and_process().is_err());

        let mut config = Config::default_config();
        config.server.public_base_url = Some("ftp://example.com".to_string());
        assert!(config.validate_and_process().is_err());
    }
}
