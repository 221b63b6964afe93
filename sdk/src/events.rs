//! Wire types for task submission and session results
//!
//! These types travel over the WebSocket stream (`/ws`) and the single-shot
//! endpoint (`POST /api/tasks`). Field aliases keep older clients that send
//! `user_input`, `file_names` and `chat_history` working.

use serde::{Deserialize, Serialize};

/// A task submitted by a client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSubmission {
    /// The user's request
    #[serde(alias = "user_input")]
    pub task_text: String,

    /// Attachment references, resolved against the upload directory
    #[serde(default, alias = "file_names")]
    pub attachment_references: Vec<String>,

    /// Prior conversation lines supplied by the caller
    #[serde(default, alias = "chat_history")]
    pub conversation_history: Vec<String>,
}

impl TaskSubmission {
    pub fn new(task_text: impl Into<String>) -> Self {
        Self {
            task_text: task_text.into(),
            ..Default::default()
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// The auditor approved the generated artifacts
    Approved,
    /// A worker produced the final answer directly
    Completed,
    /// The iteration cap was reached; partial results are attached
    IterationLimitExceeded,
    /// A worker or the router failed
    Failed,
    /// The client went away before the session finished
    Cancelled,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Completed => "completed",
            Self::IterationLimitExceeded => "iteration_limit_exceeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Approved and completed sessions count as successful
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Approved | Self::Completed)
    }
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Self::Approved),
            "completed" => Ok(Self::Completed),
            "iteration_limit_exceeded" => Ok(Self::IterationLimitExceeded),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown session outcome: {}", other)),
        }
    }
}

/// Final result of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub session_id: String,
    pub outcome: SessionOutcome,
    pub final_response: String,
    pub iterations: u32,
    pub development_passes: u32,
    /// Paths of every artifact written during the session
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Link to the entry artifact, when one was generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_link: Option<String>,
    /// Scrubbed error description for failed sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Event sent over the streaming channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// One merged worker update
    Delta {
        session_id: String,
        worker: String,
        iteration: u32,
        update: serde_json::Value,
    },
    /// The session finished
    Done { response: TaskResponse },
    /// Fatal failure before a response could be produced
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_accepts_legacy_field_names() {
        let json = r#"{"user_input":"build a site","file_names":["a.png"],"chat_history":["User: hi"]}"#;
        let submission: TaskSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(submission.task_text, "build a site");
        assert_eq!(submission.attachment_references, vec!["a.png"]);
        assert_eq!(submission.conversation_history, vec!["User: hi"]);
    }

    #[test]
    fn test_submission_defaults_optional_lists() {
        let submission: TaskSubmission = serde_json::from_str(r#"{"task_text":"x"}"#).unwrap();
        assert!(submission.attachment_references.is_empty());
        assert!(submission.conversation_history.is_empty());
    }

    #[test]
    fn test_stream_event_tagging() {
        let event = StreamEvent::Error {
            message: "boom".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], "boom");
    }

    #[test]
    fn test_outcome_string_forms() {
        for outcome in [
            SessionOutcome::Approved,
            SessionOutcome::Completed,
            SessionOutcome::IterationLimitExceeded,
            SessionOutcome::Failed,
            SessionOutcome::Cancelled,
        ] {
            let parsed: SessionOutcome = outcome.as_str().parse().unwrap();
            assert_eq!(parsed, outcome);
            let json = serde_json::to_string(&outcome).unwrap();
            assert_eq!(json, format!("\"{}\"", outcome.as_str()));
        }
        assert!(SessionOutcome::Approved.is_success());
        assert!(!SessionOutcome::IterationLimitExceeded.is_success());
    }
}
