//! Supervisor routing
//!
//! Decides which worker runs next. Precedence, first match wins:
//! terminal flags, deterministic state rules, then free-text intent
//! classification validated against the entry vocabulary.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::artifacts::ArtifactDir;
use super::classifier::IntentClassifier;
use super::state::{ArtifactCategory, SessionState};

/// Wire name of the terminal decision
pub const TERMINAL: &str = "__end__";

/// Final message used when an approved session has none of its own
pub const DEFAULT_COMPLETION: &str = "Task completed.";

/// Closed set of workers the supervisor can pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    ConversationalAgent,
    MultimodalAnalyzer,
    UiUxDesigner,
    Planner,
    DevelopFrontend,
    DevelopBackend,
    DevelopDatabase,
    ReviewCode,
}

impl WorkerKind {
    pub const ALL: [WorkerKind; 8] = [
        WorkerKind::ConversationalAgent,
        WorkerKind::MultimodalAnalyzer,
        WorkerKind::UiUxDesigner,
        WorkerKind::Planner,
        WorkerKind::DevelopFrontend,
        WorkerKind::DevelopBackend,
        WorkerKind::DevelopDatabase,
        WorkerKind::ReviewCode,
    ];

    /// Workers the intent classifier may start a session with
    pub const ENTRY: [WorkerKind; 4] = [
        WorkerKind::ConversationalAgent,
        WorkerKind::MultimodalAnalyzer,
        WorkerKind::UiUxDesigner,
        WorkerKind::Planner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::ConversationalAgent => "conversational_agent",
            WorkerKind::MultimodalAnalyzer => "multimodal_analyzer",
            WorkerKind::UiUxDesigner => "ui_ux_designer",
            WorkerKind::Planner => "planner",
            WorkerKind::DevelopFrontend => "develop_frontend",
            WorkerKind::DevelopBackend => "develop_backend",
            WorkerKind::DevelopDatabase => "develop_database",
            WorkerKind::ReviewCode => "review_code",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(label))
    }

    /// Developer responsible for `category`
    pub fn developer_for(category: ArtifactCategory) -> Option<Self> {
        match category {
            ArtifactCategory::Frontend => Some(WorkerKind::DevelopFrontend),
            ArtifactCategory::Backend => Some(WorkerKind::DevelopBackend),
            ArtifactCategory::Database => Some(WorkerKind::DevelopDatabase),
            ArtifactCategory::Unclassified => None,
        }
    }

    /// Category a developer produces
    pub fn artifact_category(&self) -> Option<ArtifactCategory> {
        match self {
            WorkerKind::DevelopFrontend => Some(ArtifactCategory::Frontend),
            WorkerKind::DevelopBackend => Some(ArtifactCategory::Backend),
            WorkerKind::DevelopDatabase => Some(ArtifactCategory::Database),
            _ => None,
        }
    }

    pub fn is_developer(&self) -> bool {
        self.artifact_category().is_some()
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Next step of a session
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingDecision {
    Worker(WorkerKind),
    /// End the session; `final_response` replaces the state's message when set
    Terminal { final_response: Option<String> },
}

impl RoutingDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingDecision::Worker(kind) => kind.as_str(),
            RoutingDecision::Terminal { .. } => TERMINAL,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RoutingDecision::Terminal { .. })
    }
}

/// Central routing component
pub struct Supervisor {
    classifier: Arc<dyn IntentClassifier>,
    history_window: usize,
    entry_label: Regex,
}

impl Supervisor {
    pub fn new(classifier: Arc<dyn IntentClassifier>, history_window: usize) -> Result<Self> {
        let labels: Vec<&str> = WorkerKind::ENTRY.iter().map(|k| k.as_str()).collect();
        let entry_label = Regex::new(&format!(r"(?i)\b({})\b", labels.join("|")))
            .context("Failed to compile entry label pattern")?;

        Ok(Self {
            classifier,
            history_window,
            entry_label,
        })
    }

    /// Pick the next step for `state`
    pub async fn route(&self, state: &SessionState, artifacts: &ArtifactDir) -> Result<RoutingDecision> {
        if let Some(decision) = Self::terminal_check(state, artifacts) {
            info!("Supervisor decision: {}", decision.as_str());
            return Ok(decision);
        }

        if let Some(kind) = Self::deterministic_route(state) {
            info!("Supervisor decision (state rule): {}", kind);
            return Ok(RoutingDecision::Worker(kind));
        }

        let start = state.history.len().saturating_sub(self.history_window);
        let raw = self
            .classifier
            .classify(&state.task, !state.attachments.is_empty(), &state.history[start..])
            .await
            .context("Intent classification failed")?;

        let kind = self.interpret(&raw, !state.attachments.is_empty());
        info!("Supervisor decision (classifier): {}", kind);
        Ok(RoutingDecision::Worker(kind))
    }

    /// Terminal flags take priority over everything else
    pub fn terminal_check(state: &SessionState, artifacts: &ArtifactDir) -> Option<RoutingDecision> {
        if state.approved {
            let mut message = state
                .final_response
                .clone()
                .unwrap_or_else(|| DEFAULT_COMPLETION.to_string());
            if let Some(link) = artifacts.entry_link_message(&state.written_paths) {
                message.push_str(&link);
            }
            return Some(RoutingDecision::Terminal {
                final_response: Some(message),
            });
        }

        if state.task_complete {
            return Some(RoutingDecision::Terminal {
                final_response: None,
            });
        }

        None
    }

    /// Routing implied by the state alone
    pub fn deterministic_route(state: &SessionState) -> Option<WorkerKind> {
        if state.feedback.is_some() {
            let category = state
                .last_artifact_category
                .filter(|c| *c != ArtifactCategory::Unclassified)
                .or_else(|| state.plan.as_ref().and_then(|p| p.targets().first().copied()))
                .unwrap_or(ArtifactCategory::Frontend);
            return WorkerKind::developer_for(category).or(Some(WorkerKind::DevelopFrontend));
        }

        if state.awaiting_review && state.has_artifacts() {
            return Some(WorkerKind::ReviewCode);
        }

        if let Some(plan) = &state.plan {
            let targets = plan.targets();
            let missing = |c: ArtifactCategory| targets.contains(&c) && state.artifacts_for(c).is_none();

            if missing(ArtifactCategory::Database) {
                return Some(WorkerKind::DevelopDatabase);
            }
            for category in [ArtifactCategory::Frontend, ArtifactCategory::Backend] {
                if missing(category) {
                    return WorkerKind::developer_for(category);
                }
            }
            if !plan.is_actionable() {
                return Some(WorkerKind::ConversationalAgent);
            }
            // Every target has artifacts but nothing is pending review
            return Some(WorkerKind::ReviewCode);
        }

        if state.design_spec.is_some() {
            return Some(WorkerKind::Planner);
        }

        None
    }

    /// Validate raw classifier output into an entry worker
    pub fn interpret(&self, raw: &str, has_attachments: bool) -> WorkerKind {
        let kind = self
            .entry_label
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .and_then(|m| WorkerKind::from_label(m.as_str()));

        match kind {
            Some(WorkerKind::UiUxDesigner) if !has_attachments => {
                debug!("Designer requested without attachments, routing to planner");
                WorkerKind::Planner
            }
            Some(kind) => kind,
            None => {
                warn!(
                    "Inconclusive classifier answer ({:?}), falling back to conversation",
                    raw.chars().take(80).collect::<String>()
                );
                WorkerKind::ConversationalAgent
            }
        }
    }
}
