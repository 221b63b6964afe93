//! Quality auditor
//!
//! Reviews the generated artifacts against the request, the plan and the
//! quality principles retrieved from the knowledge base. The verdict is a
//! JSON object `{approved, feedback}`.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use super::{render_artifacts, Worker, WorkerContext};
use crate::llm::{extract_json_object, GenerationStyle};
use crate::orchestrator::router::WorkerKind;
use crate::orchestrator::state::{ArtifactCategory, SessionState, StateUpdate};

/// Feedback used when the verdict cannot be parsed
pub const MALFORMED_VERDICT_FEEDBACK: &str = "Internal auditor error: the review verdict was not valid JSON. \
     Please regenerate the code, making sure every file is complete and correct.";

/// Feedback used when there is nothing to review
pub const MISSING_ARTIFACT_FEEDBACK: &str =
    "No generated code was found to review. Generate the complete code for the assigned task.";

const DEFAULT_REJECTION: &str = "The code does not meet the request yet. Review it and fix the problems.";

pub struct QualityAuditor;

#[derive(Debug, Deserialize)]
struct Verdict {
    approved: bool,
    #[serde(default)]
    feedback: Option<String>,
}

impl QualityAuditor {
    /// Plan task for the reviewed layer, falling back to the request
    fn retrieval_query(state: &SessionState) -> String {
        let plan = state.plan.as_ref();
        [
            ArtifactCategory::Frontend,
            ArtifactCategory::Backend,
            ArtifactCategory::Database,
        ]
        .into_iter()
        .find_map(|c| plan.and_then(|p| p.task_for(c)).map(|t| t.task.clone()))
        .unwrap_or_else(|| state.task.clone())
    }

    fn build_prompt(state: &SessionState, principles: &str) -> String {
        let plan = state
            .plan
            .as_ref()
            .and_then(|p| serde_json::to_string_pretty(p).ok())
            .unwrap_or_else(|| "(no plan)".to_string());

        let code = state
            .artifacts
            .iter()
            .filter(|(_, map)| !map.is_empty())
            .map(|(category, map)| format!("### {}\n{}", category, render_artifacts(map)))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "You are a meticulous software quality auditor. Decide whether the generated code satisfies \
             the user's request and the quality principles from our knowledge base.\n\n\
             **ORIGINAL USER REQUEST:** \"{task}\"\n\n\
             **DEVELOPMENT PLAN:**\n{plan}\n\n\
             **RELEVANT QUALITY PRINCIPLES:**\n---\n{principles}\n---\n\n\
             **GENERATED CODE:**\n{code}\n\n\
             **Audit criteria:**\n\
             1. Functional correctness: does the code implement what the request and plan ask for?\n\
             2. Principles: is it readable and maintainable, following the principles above?\n\
             3. Obvious errors: is there any syntax error that would stop it from working?\n\n\
             **Answer format (MANDATORY):** a JSON object and NOTHING else:\n\
             - \"approved\": boolean, true if the code passes the audit.\n\
             - \"feedback\": string. When rejecting, say clearly WHAT to change and WHY. When approving, \
             a short confirmation.",
            task = state.task,
        )
    }

    /// Plan targets that still have no artifacts
    fn pending_targets(state: &SessionState) -> Vec<ArtifactCategory> {
        state
            .plan
            .as_ref()
            .map(|p| p.targets())
            .unwrap_or_default()
            .into_iter()
            .filter(|c| state.artifacts_for(*c).is_none())
            .collect()
    }
}

#[async_trait]
impl Worker for QualityAuditor {
    fn kind(&self) -> WorkerKind {
        WorkerKind::ReviewCode
    }

    async fn run(&self, state: &SessionState, ctx: &WorkerContext) -> Result<StateUpdate> {
        if !state.has_artifacts() {
            warn!("Auditor invoked without artifacts");
            return Ok(StateUpdate::new()
                .awaiting_review(false)
                .feedback(MISSING_ARTIFACT_FEEDBACK));
        }

        let principles = ctx.retriever.retrieve(&Self::retrieval_query(state)).await;
        let prompt = Self::build_prompt(state, &principles);
        let output = ctx
            .generator
            .generate(&prompt, &[], GenerationStyle::Analytical)
            .await?;

        let verdict = extract_json_object(&output)
            .and_then(|value| serde_json::from_value::<Verdict>(value).ok());

        let Some(verdict) = verdict else {
            warn!("Auditor verdict was not valid JSON");
            return Ok(StateUpdate::new()
                .awaiting_review(false)
                .feedback(MALFORMED_VERDICT_FEEDBACK));
        };

        if !verdict.approved {
            let feedback = verdict
                .feedback
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REJECTION.to_string());
            info!("Audit rejected: {}", feedback);
            return Ok(StateUpdate::new().awaiting_review(false).feedback(feedback));
        }

        let pending = Self::pending_targets(state);
        if !pending.is_empty() {
            info!(pending = ?pending, "Audit passed, remaining plan targets still to build");
            return Ok(StateUpdate::new().awaiting_review(false).clear_feedback());
        }

        info!(
            "Audit approved: {}",
            verdict.feedback.as_deref().unwrap_or("no comment")
        );
        Ok(StateUpdate::new().awaiting_review(false).approved(true))
    }
}
