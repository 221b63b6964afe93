//! Code developer
//!
//! One worker type parameterized by the category it builds. The model is
//! asked for delimited files; the extractor turns them into artifacts.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use super::{render_artifacts, Worker, WorkerContext};
use crate::llm::GenerationStyle;
use crate::orchestrator::router::WorkerKind;
use crate::orchestrator::state::{ArtifactCategory, SessionState, StateUpdate};

pub struct CodeDeveloper {
    category: ArtifactCategory,
}

impl CodeDeveloper {
    pub fn frontend() -> Self {
        Self {
            category: ArtifactCategory::Frontend,
        }
    }

    pub fn backend() -> Self {
        Self {
            category: ArtifactCategory::Backend,
        }
    }

    pub fn database() -> Self {
        Self {
            category: ArtifactCategory::Database,
        }
    }

    pub fn category(&self) -> ArtifactCategory {
        self.category
    }

    fn default_tech(&self) -> &'static str {
        match self.category {
            ArtifactCategory::Frontend => "HTML, CSS and JavaScript",
            ArtifactCategory::Backend => "Python with FastAPI",
            _ => "SQL",
        }
    }

    fn delimiter_rules(&self) -> &'static str {
        match self.category {
            ArtifactCategory::Frontend => {
                "Produce three files in separate delimited blocks, using these EXACT markers:\n\
                 <!--- index.html_CODE_START --->\n...\n<!--- index.html_CODE_END --->\n\
                 /* --- style.css_CODE_START --- */\n...\n/* --- style.css_CODE_END --- */\n\
                 // --- script.js_CODE_START ---\n...\n// --- script.js_CODE_END ---\n\
                 index.html must link style.css and script.js."
            }
            ArtifactCategory::Backend => {
                "Produce every file in its own delimited block, naming the file with its extension:\n\
                 # --- app.py_CODE_START ---\n...\n# --- app.py_CODE_END ---\n\
                 # --- requirements.txt_CODE_START ---\n...\n# --- requirements.txt_CODE_END ---\n\
                 Use the comment style of the language for the markers (`//` for JavaScript, `#` for Python)."
            }
            _ => {
                "Produce all data-layer code in one delimited block with a descriptive file name and the \
                 right extension, using the comment style of the language:\n\
                 -- --- create_tables.sql_CODE_START ---\n...\n-- --- create_tables.sql_CODE_END ---\n\
                 For JavaScript or JSON use `// --- seed_data.json_CODE_START ---`."
            }
        }
    }

    fn build_prompt(&self, state: &SessionState) -> String {
        let plan_task = state.plan.as_ref().and_then(|p| p.task_for(self.category));
        let task = plan_task
            .map(|t| t.task.as_str())
            .unwrap_or(state.task.as_str());
        let tech = plan_task
            .and_then(|t| t.tech.as_deref())
            .unwrap_or(self.default_tech());

        let mut prompt = format!(
            "You are a senior {category} developer, expert in {tech}.\n\
             Generate complete, working code for the task below.\n\n\
             **Assigned task:**\n---\n{task}\n---\n\n\
             **Original user request:**\n---\n{request}\n---\n",
            category = self.category,
            request = state.task,
        );

        if self.category == ArtifactCategory::Frontend {
            if let Some(spec) = &state.design_spec {
                prompt.push_str(&format!(
                    "\n**UI/UX specification (follow it closely):**\n---\n{}\n---\n",
                    spec
                ));
            }
        }

        prompt.push_str(&format!(
            "\n**CRITICAL instructions:**\n{}\n\
             Comment the code where it helps. Do not add explanations outside the delimited blocks.\n",
            self.delimiter_rules()
        ));

        if let Some(feedback) = &state.feedback {
            prompt.push_str(&format!(
                "\n**Feedback from the previous review (you MUST address it):**\n---\n{}\n---\n",
                feedback
            ));
            if let Some(existing) = state.artifacts_for(self.category) {
                prompt.push_str(&format!(
                    "\n**EXISTING CODE (modify it to apply the corrections):**\n```\n{}\n```\n\
                     Generate the COMPLETE corrected version of every file, not just the changes.\n",
                    render_artifacts(existing)
                ));
            }
        }

        prompt
    }
}

#[async_trait]
impl Worker for CodeDeveloper {
    fn kind(&self) -> WorkerKind {
        match self.category {
            ArtifactCategory::Frontend => WorkerKind::DevelopFrontend,
            ArtifactCategory::Backend => WorkerKind::DevelopBackend,
            _ => WorkerKind::DevelopDatabase,
        }
    }

    async fn run(&self, state: &SessionState, ctx: &WorkerContext) -> Result<StateUpdate> {
        let prompt = self.build_prompt(state);
        let output = ctx
            .generator
            .generate(&prompt, &[], GenerationStyle::Creative)
            .await?;

        let report = ctx
            .extractor
            .extract_and_save(&output, &ctx.artifacts, Some(self.category))
            .await?;

        let update = StateUpdate::new()
            .last_artifact_category(self.category)
            .written_paths(report.written_paths());

        // Other layers keep their own generation; their developer still has to run
        for category in report.categories() {
            if category != self.category {
                warn!(
                    category = %category,
                    files = ?report.map_for(category).keys().collect::<Vec<_>>(),
                    "{} developer emitted files outside its layer, not committing them",
                    self.category
                );
            }
        }

        let own = report.map_for(self.category);
        if own.is_empty() {
            warn!(
                "{} developer produced no {} code blocks",
                self.category, self.category
            );
            return Ok(update.awaiting_review(false).feedback(format!(
                "The previous answer contained no delimited {} code blocks. Generate the complete \
                 code again using the exact CODE_START/CODE_END markers.",
                self.category
            )));
        }

        info!(
            category = %self.category,
            files = ?own.keys().collect::<Vec<_>>(),
            "Code generated"
        );

        Ok(update
            .artifacts(self.category, own)
            .awaiting_review(true)
            .clear_feedback())
    }
}
