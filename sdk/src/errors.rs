//! Error types and handling
//!
//! This module provides the error types shared by the engine and its clients.
//! All errors implement the `DevTeamErrorExt` trait which provides
//! user-friendly hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Hints are static strings. Raw error payloads may contain provider
//! responses, so the engine scrubs them before they leave the process.

use thiserror::Error;

/// Trait for DevTeam error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information.
pub trait DevTeamErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and never contains secrets,
    /// file paths or provider payloads.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried with the same input. Non-recoverable
    /// errors need a configuration change first.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: invalid or missing configuration
/// - **Retrieval**: knowledge base loading failures
/// - **Artifacts**: generated files that cannot be written, unsupported attachments
/// - **Orchestration**: routing failures, worker failures and the iteration cap
///
/// # Examples
///
/// ```
/// use sdk::errors::{DevTeamErrorExt, EngineError};
///
/// let error = EngineError::Worker("planner".to_string(), "timeout".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::Config("unknown provider".to_string());
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Retrieval errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    // Artifact errors
    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Unsupported attachment: {0}")]
    UnsupportedAttachment(String),

    // Orchestration errors
    #[error("Routing failed: {0}")]
    Routing(String),

    #[error("Worker {0} failed: {1}")]
    Worker(String, String),

    #[error("Iteration limit of {0} exceeded")]
    MaxIterationsExceeded(u32),
}

impl DevTeamErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",

            Self::Retrieval(_) => "Knowledge base could not be read. Check knowledge_dir",

            Self::Artifact(_) => "Generated files could not be written. Check output_dir",
            Self::UnsupportedAttachment(_) => "Attach images, audio, video or PDF files only",

            Self::Routing(_) => "The task could not be routed. Try rephrasing it",
            Self::Worker(_, _) => "A worker failed while processing the task. Try again",
            Self::MaxIterationsExceeded(_) => {
                "Task too complex. Try breaking it into smaller steps"
            }
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::UnsupportedAttachment(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(!EngineError::Config("bad".into()).is_recoverable());
        assert!(!EngineError::UnsupportedAttachment("notes.docx".into()).is_recoverable());
        assert!(EngineError::Artifact("disk full".into()).is_recoverable());
        assert!(EngineError::MaxIterationsExceeded(10).is_recoverable());
    }

    #[test]
    fn test_display_includes_context() {
        let err = EngineError::Worker("planner".into(), "bad json".into());
        assert_eq!(err.to_string(), "Worker planner failed: bad json");
        assert_eq!(
            EngineError::MaxIterationsExceeded(4).to_string(),
            "Iteration limit of 4 exceeded"
        );
    }
}
