//! Session state and its merge policy
//!
//! `SessionState` is threaded through one task execution. Workers never
//! mutate it directly: they return a `StateUpdate` and the executor applies
//! it with [`SessionState::apply`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// filename -> content
pub type ArtifactMap = BTreeMap<String, String>;

/// Category an artifact is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactCategory {
    Frontend,
    Backend,
    Database,
    Unclassified,
}

impl ArtifactCategory {
    pub const ALL: [ArtifactCategory; 4] = [
        ArtifactCategory::Frontend,
        ArtifactCategory::Backend,
        ArtifactCategory::Database,
        ArtifactCategory::Unclassified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactCategory::Frontend => "frontend",
            ArtifactCategory::Backend => "backend",
            ArtifactCategory::Database => "database",
            ArtifactCategory::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ArtifactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the planner decided needs building
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Frontend,
    Backend,
    #[serde(alias = "full_stack", alias = "fullstack")]
    Both,
    None,
}

/// One unit of planned work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTask {
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech: Option<String>,
}

/// Structured development plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_type: PlanType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend: Option<PlanTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<PlanTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PlanTask>,
}

impl Plan {
    /// Plan with nothing to build
    pub fn none() -> Self {
        Self {
            plan_type: PlanType::None,
            frontend: None,
            backend: None,
            database: None,
        }
    }

    /// Categories that need artifacts, in build order
    pub fn targets(&self) -> Vec<ArtifactCategory> {
        if self.plan_type == PlanType::None {
            return Vec::new();
        }

        let mut targets = Vec::new();
        if self.frontend.is_some() {
            targets.push(ArtifactCategory::Frontend);
        }
        if self.backend.is_some() {
            targets.push(ArtifactCategory::Backend);
        }
        if self.database.is_some() {
            targets.push(ArtifactCategory::Database);
        }
        targets
    }

    pub fn task_for(&self, category: ArtifactCategory) -> Option<&PlanTask> {
        match category {
            ArtifactCategory::Frontend => self.frontend.as_ref(),
            ArtifactCategory::Backend => self.backend.as_ref(),
            ArtifactCategory::Database => self.database.as_ref(),
            ArtifactCategory::Unclassified => None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        !self.targets().is_empty()
    }
}

/// Per-field update operation for optional scalars
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "lowercase")]
pub enum Change<T> {
    #[default]
    Unchanged,
    Set(T),
    Cleared,
}

impl<T> Change<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Change::Unchanged)
    }

    fn apply_to(self, slot: &mut Option<T>) {
        match self {
            Change::Unchanged => {}
            Change::Set(value) => *slot = Some(value),
            Change::Cleared => *slot = None,
        }
    }
}

/// Partial update returned by a worker
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateUpdate {
    #[serde(default, skip_serializing_if = "Change::is_unchanged")]
    pub plan: Change<Plan>,
    #[serde(default, skip_serializing_if = "Change::is_unchanged")]
    pub design_spec: Change<String>,
    #[serde(default, skip_serializing_if = "Change::is_unchanged")]
    pub feedback: Change<String>,
    #[serde(default, skip_serializing_if = "Change::is_unchanged")]
    pub final_response: Change<String>,
    #[serde(default, skip_serializing_if = "Change::is_unchanged")]
    pub last_artifact_category: Change<ArtifactCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub awaiting_review: Option<bool>,
    /// Whole-map replacement per category
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<ArtifactCategory, ArtifactMap>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub written_paths: Vec<String>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn plan(mut self, plan: Plan) -> Self {
        self.plan = Change::Set(plan);
        self
    }

    pub fn design_spec(mut self, spec: impl Into<String>) -> Self {
        self.design_spec = Change::Set(spec.into());
        self
    }

    pub fn feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Change::Set(feedback.into());
        self
    }

    pub fn clear_feedback(mut self) -> Self {
        self.feedback = Change::Cleared;
        self
    }

    pub fn final_response(mut self, response: impl Into<String>) -> Self {
        self.final_response = Change::Set(response.into());
        self
    }

    pub fn last_artifact_category(mut self, category: ArtifactCategory) -> Self {
        self.last_artifact_category = Change::Set(category);
        self
    }

    pub fn approved(mut self, approved: bool) -> Self {
        self.approved = Some(approved);
        self
    }

    pub fn task_complete(mut self, complete: bool) -> Self {
        self.task_complete = Some(complete);
        self
    }

    pub fn awaiting_review(mut self, awaiting: bool) -> Self {
        self.awaiting_review = Some(awaiting);
        self
    }

    pub fn artifacts(mut self, category: ArtifactCategory, map: ArtifactMap) -> Self {
        self.artifacts.insert(category, map);
        self
    }

    pub fn history_entry(mut self, entry: impl Into<String>) -> Self {
        self.history.push(entry.into());
        self
    }

    pub fn written_paths(mut self, paths: impl IntoIterator<Item = String>) -> Self {
        self.written_paths.extend(paths);
        self
    }
}

/// Everything one session knows about its task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub task: String,
    pub attachments: Vec<PathBuf>,
    pub history: Vec<String>,
    pub plan: Option<Plan>,
    pub design_spec: Option<String>,
    pub artifacts: BTreeMap<ArtifactCategory, ArtifactMap>,
    pub feedback: Option<String>,
    pub approved: bool,
    pub task_complete: bool,
    pub iteration: u32,
    pub development_passes: u32,
    pub last_artifact_category: Option<ArtifactCategory>,
    pub awaiting_review: bool,
    pub final_response: Option<String>,
    /// Paths written by the extractor during this session
    pub written_paths: BTreeSet<String>,
}

impl SessionState {
    pub fn new(task: impl Into<String>, attachments: Vec<PathBuf>, history: Vec<String>) -> Self {
        Self {
            task: task.into(),
            attachments,
            history,
            ..Self::default()
        }
    }

    pub fn artifacts_for(&self, category: ArtifactCategory) -> Option<&ArtifactMap> {
        self.artifacts.get(&category).filter(|m| !m.is_empty())
    }

    pub fn has_artifacts(&self) -> bool {
        self.artifacts.values().any(|m| !m.is_empty())
    }

    pub fn is_terminal(&self) -> bool {
        self.approved || self.task_complete
    }

    /// Merge a worker's update
    ///
    /// Counters are owned by the executor and are not touched here.
    pub fn apply(&mut self, update: StateUpdate) {
        let setting_feedback = matches!(update.feedback, Change::Set(_));

        update.plan.apply_to(&mut self.plan);
        update.design_spec.apply_to(&mut self.design_spec);
        update.feedback.apply_to(&mut self.feedback);
        update.final_response.apply_to(&mut self.final_response);
        update
            .last_artifact_category
            .apply_to(&mut self.last_artifact_category);

        if setting_feedback {
            self.approved = false;
        }
        if let Some(approved) = update.approved {
            self.approved = approved;
            if approved {
                self.feedback = None;
            }
        }
        if let Some(complete) = update.task_complete {
            self.task_complete = complete;
        }
        if self.approved && self.task_complete {
            self.task_complete = false;
        }
        if let Some(awaiting) = update.awaiting_review {
            self.awaiting_review = awaiting;
        }

        for (category, map) in update.artifacts {
            self.artifacts.insert(category, map);
        }

        self.history.extend(update.history);
        self.written_paths.extend(update.written_paths);
    }
}
