//! DevTeam Engine Library
//!
//! This library provides the core functionality of the DevTeam engine.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// Database persistence module
pub mod db;

/// LLM provider abstraction layer
pub mod llm;

/// Knowledge base retrieval
pub mod retrieval;

/// Supervisor/worker orchestration
pub mod orchestrator;

/// HTTP and WebSocket server
pub mod server;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
