//! Development planner
//!
//! Turns the design spec (or the raw request when there is none) into a
//! structured plan. Output that is not a JSON object yields a `none` plan.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use super::{Worker, WorkerContext};
use crate::llm::{extract_json_object, GenerationStyle};
use crate::orchestrator::router::WorkerKind;
use crate::orchestrator::state::{Plan, PlanTask, PlanType, SessionState, StateUpdate};

pub struct Planner;

/// Shape requested from the model; every field is optional on the way in
#[derive(Debug, Default, Deserialize)]
struct RawPlan {
    plan_type: Option<String>,
    frontend_task: Option<String>,
    frontend_tech: Option<String>,
    backend_task: Option<String>,
    backend_tech: Option<String>,
    database_task: Option<String>,
    database_tech: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Planner {
    fn build_prompt(state: &SessionState) -> String {
        let (source, content) = match &state.design_spec {
            Some(spec) => ("UI/UX technical specification", spec.as_str()),
            None => ("Original user request", state.task.as_str()),
        };

        format!(
            "You are a technical project lead. Create a development plan from the information below.\n\n\
             **{source}:**\n---\n{content}\n---\n\n\
             Your plan states what is needed and which technologies to use.\n\n\
             **IMPORTANT:** Answer with a JSON object with exactly these fields and NOTHING else:\n\
             - `plan_type`: \"frontend\", \"backend\", \"both\" or \"none\".\n\
             - `frontend_task`: (string | null) a clear, concise task for the frontend developer.\n\
             - `frontend_tech`: (string | null) the frontend technology (e.g. \"HTML, CSS and JavaScript\").\n\
             - `backend_task`: (string | null) a clear task for the backend developer.\n\
             - `backend_tech`: (string | null) the backend technology (e.g. \"Python with Flask\").\n\
             - `database_task`: (string | null) schema or data work, only if persistence is required.\n\
             - `database_tech`: (string | null) the storage technology (e.g. \"SQLite\").\n\n\
             Use `none` when the request is not a software development task.\n\
             **CRITICAL RULE:** stick STRICTLY to the technologies the user asked for. Do not suggest \
             frameworks, libraries or build tools unless explicitly requested."
        )
    }

    /// Parse model output into a plan, normalizing missing pieces
    pub fn parse_plan(content: &str, fallback_task: &str) -> Plan {
        let Some(value) = extract_json_object(content) else {
            warn!("Planner output is not a JSON object, using an empty plan");
            return Plan::none();
        };

        let raw: RawPlan = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Planner JSON has an unexpected shape: {}", e);
                return Plan::none();
            }
        };

        let frontend_task = non_empty(raw.frontend_task);
        let backend_task = non_empty(raw.backend_task);
        let database_task = non_empty(raw.database_task);

        let plan_type = match non_empty(raw.plan_type)
            .map(|t| t.to_lowercase())
            .as_deref()
        {
            Some("frontend") => PlanType::Frontend,
            Some("backend") => PlanType::Backend,
            Some("both" | "full_stack" | "fullstack") => PlanType::Both,
            Some("none") => return Plan::none(),
            _ => match (frontend_task.is_some(), backend_task.is_some()) {
                (true, true) => PlanType::Both,
                (true, false) => PlanType::Frontend,
                (false, true) => PlanType::Backend,
                (false, false) if database_task.is_some() => PlanType::Backend,
                (false, false) => return Plan::none(),
            },
        };

        let needs_frontend = matches!(plan_type, PlanType::Frontend | PlanType::Both);
        let needs_backend = matches!(plan_type, PlanType::Backend | PlanType::Both);
        let task = |task: Option<String>, tech: Option<String>, implied: bool| {
            task.or_else(|| implied.then(|| fallback_task.to_string()))
                .map(|task| PlanTask {
                    task,
                    tech: non_empty(tech),
                })
        };

        Plan {
            plan_type,
            frontend: task(frontend_task, raw.frontend_tech, needs_frontend),
            backend: task(backend_task, raw.backend_tech, needs_backend),
            database: task(database_task, raw.database_tech, false),
        }
    }
}

#[async_trait]
impl Worker for Planner {
    fn kind(&self) -> WorkerKind {
        WorkerKind::Planner
    }

    async fn run(&self, state: &SessionState, ctx: &WorkerContext) -> Result<StateUpdate> {
        let prompt = Self::build_prompt(state);
        let output = ctx
            .generator
            .generate(&prompt, &[], GenerationStyle::Analytical)
            .await?;

        let plan = Self::parse_plan(&output, &state.task);
        info!(plan_type = ?plan.plan_type, targets = ?plan.targets(), "Development plan ready");
        Ok(StateUpdate::new().plan(plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::state::ArtifactCategory;
    use crate::orchestrator::testing::{test_context, ScriptedGenerator};
    use tempfile::TempDir;

    #[test]
    fn test_parse_fenced_plan() {
        let output = "```json\n{\"plan_type\": \"frontend\", \"frontend_task\": \"Snake game\", \"frontend_tech\": \"HTML, CSS and JavaScript\", \"backend_task\": null}\n```";
        let plan = Planner::parse_plan(output, "build a snake game");
        assert_eq!(plan.plan_type, PlanType::Frontend);
        assert_eq!(plan.targets(), vec![ArtifactCategory::Frontend]);
        let frontend = plan.frontend.unwrap();
        assert_eq!(frontend.task, "Snake game");
        assert_eq!(frontend.tech.as_deref(), Some("HTML, CSS and JavaScript"));
    }

    #[test]
    fn test_malformed_output_is_none_plan() {
        assert_eq!(Planner::parse_plan("I would build it in React", "x"), Plan::none());
        assert_eq!(
            Planner::parse_plan("{\"plan_type\": \"none\"}", "x"),
            Plan::none()
        );
        assert_eq!(
            Planner::parse_plan("{\"plan_type\": 5}", "x"),
            Plan::none()
        );
    }

    #[test]
    fn test_missing_task_falls_back_to_request() {
        let plan = Planner::parse_plan("{\"plan_type\": \"both\", \"frontend_task\": \"ui\"}", "todo app");
        assert_eq!(plan.backend.unwrap().task, "todo app");
        assert!(plan.database.is_none());
    }

    #[test]
    fn test_database_task_and_inferred_type() {
        let plan = Planner::parse_plan(
            "{\"backend_task\": \"api\", \"database_task\": \"users table\", \"database_tech\": \"SQLite\"}",
            "x",
        );
        assert_eq!(plan.plan_type, PlanType::Backend);
        assert_eq!(
            plan.targets(),
            vec![ArtifactCategory::Backend, ArtifactCategory::Database]
        );
    }

    #[test]
    fn test_prompt_prefers_design_spec() {
        let mut state = SessionState::new("make it", vec![], vec![]);
        assert!(Planner::build_prompt(&state).contains("Original user request"));

        state.apply(StateUpdate::new().design_spec("## 1. Layout"));
        let prompt = Planner::build_prompt(&state);
        assert!(prompt.contains("UI/UX technical specification"));
        assert!(prompt.contains("## 1. Layout"));
    }

    #[tokio::test]
    async fn test_run_sets_plan() {
        let temp = TempDir::new().unwrap();
        let generator = ScriptedGenerator::new(["{\"plan_type\": \"frontend\", \"frontend_task\": \"snake\"}"]);
        let ctx = test_context(temp.path(), generator.clone());
        let state = SessionState::new("build a snake game website", vec![], vec![]);

        let update = Planner.run(&state, &ctx).await.unwrap();
        let mut next = state.clone();
        next.apply(update);
        assert_eq!(next.plan.unwrap().plan_type, PlanType::Frontend);
        assert_eq!(generator.calls(), 1);
    }
}
