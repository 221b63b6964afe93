//! Integration tests for configuration management
//!
//! These tests verify that the Config struct can be loaded from disk,
//! validated, and processed with path expansion and directory creation.

use devteam_engine::config::Config;
use sdk::errors::EngineError;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    let header = format!(
        r#"
[core]
data_dir = "{data}"
output_dir = "{outputs}"
upload_dir = "{uploads}"
knowledge_dir = "{knowledge}"
"#,
        data = dir.join("data").display(),
        outputs = dir.join("outputs").display(),
        uploads = dir.join("uploads").display(),
        knowledge = dir.join("knowledge").display(),
    );
    std::fs::write(&path, format!("{}{}", header, body)).unwrap();
    path
}

#[test]
fn test_full_config_loads() {
    let temp = TempDir::new().unwrap();
    let path = write_config(
        temp.path(),
        r#"
[llm]
default_provider = "ollama"
creative_temperature = 0.7
analytical_temperature = 0.1

[llm.ollama]
base_url = "http://localhost:11434"
model = "qwen2.5-coder:7b"

[orchestrator]
max_iterations = 12
history_window = 4
stream_buffer = 32

[retrieval]
enabled = false
chunk_size = 500
chunk_overlap = 50
top_k = 2

[server]
host = "0.0.0.0"
port = 9000
public_base_url = "https://devteam.example.com/"
"#,
    );

    let config = Config::load_from_path(&path).unwrap();

    assert_eq!(config.llm.default_provider, "ollama");
    assert_eq!(config.llm.ollama.model, "qwen2.5-coder:7b");
    assert_eq!(config.orchestrator.max_iterations, 12);
    assert_eq!(config.orchestrator.history_window, 4);
    assert!(!config.retrieval.enabled);
    assert_eq!(config.server.port, 9000);
    // Trailing slash is dropped so links join cleanly
    assert_eq!(
        config.server.public_base_url.as_deref(),
        Some("https://devteam.example.com")
    );
    assert!(config.core.output_dir.is_dir());
    assert!(config.core.upload_dir.is_dir());
    assert!(config.database_path().starts_with(&config.core.data_dir));
}

#[test]
fn test_minimal_config_with_defaults() {
    let temp = TempDir::new().unwrap();
    let path = write_config(temp.path(), "\n[llm]\n");

    let config = Config::load_from_path(&path).unwrap();

    assert_eq!(config.core.log_level, "info");
    assert_eq!(config.llm.default_provider, "gemini");
    assert_eq!(config.orchestrator.max_iterations, 10);
    assert_eq!(config.orchestrator.history_window, 6);
    assert!(config.retrieval.enabled);
    assert_eq!(config.server.host, "127.0.0.1");
    assert!(config.server.public_base_url.is_none());
    assert!(config.core.scope_artifacts_by_session);
}

#[test]
fn test_load_or_create_writes_defaults() {
    let temp = TempDir::new().unwrap();
    // Default directories expand against $HOME
    std::env::set_var("HOME", temp.path());
    let path = temp.path().join("nested").join("config.toml");

    Config::load_or_create_at(&path).unwrap();
    assert!(path.exists());

    let written = std::fs::read_to_string(&path).unwrap();
    let parsed: toml::Value = toml::from_str(&written).expect("Failed to parse written TOML");
    assert!(parsed.get("core").is_some());
    assert!(parsed.get("llm").is_some());
    assert!(parsed.get("orchestrator").is_some());
    // Portable paths stay unexpanded on disk
    assert!(written.contains("~/.devteam"));
    assert!(temp.path().join(".devteam").join("outputs").is_dir());
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        ("[core]\nlog_level = \"loud\"\n", "log level"),
        ("[llm]\ndefault_provider = \"anthropic\"\n", "default provider"),
        ("[orchestrator]\nmax_iterations = 0\n", "max_iterations"),
        ("[retrieval]\nchunk_size = 100\nchunk_overlap = 100\n", "chunk_overlap"),
        ("[server]\npublic_base_url = \"ftp://host\"\n", "public_base_url"),
    ];

    for (body, expected) in cases {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, body).unwrap();

        match Config::load_from_path(&path) {
            Err(EngineError::Config(msg)) => {
                assert!(msg.contains(expected), "{:?} should mention {}", msg, expected)
            }
            other => panic!("expected config error for {:?}, got {:?}", body, other.map(|_| ())),
        }
    }
}

#[test]
fn test_sections_can_be_omitted() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    let data_dir = temp.path().join("data");
    std::fs::write(
        &path,
        format!(
            "[core]\ndata_dir = {:?}\noutput_dir = {:?}\nupload_dir = {:?}\n",
            data_dir,
            data_dir.join("outputs"),
            data_dir.join("uploads")
        ),
    )
    .unwrap();

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.llm.default_provider, "gemini");
    assert_eq!(config.orchestrator.max_iterations, 10);
    assert!(config.core.scope_artifacts_by_session);
}

#[test]
fn test_malformed_toml_is_a_config_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[core\nlog_level = ").unwrap();

    assert!(matches!(
        Config::load_from_path(&path),
        Err(EngineError::Config(_))
    ));
}
