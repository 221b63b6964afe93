//! Free-text intent classification
//!
//! The supervisor falls back to this when no state rule applies. The raw
//! answer is validated by the router, never trusted here.

use async_trait::async_trait;
use std::sync::Arc;

use crate::llm::{GenerationStyle, Generator};

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Raw classifier answer for the task
    async fn classify(
        &self,
        task: &str,
        has_attachments: bool,
        history: &[String],
    ) -> crate::llm::Result<String>;
}

/// Classifier backed by the analytical generation style
pub struct LlmIntentClassifier {
    generator: Arc<dyn Generator>,
}

impl LlmIntentClassifier {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    fn build_prompt(task: &str, has_attachments: bool, history: &[String]) -> String {
        let history = if history.is_empty() {
            "(no previous conversation)".to_string()
        } else {
            history.join("\n")
        };

        format!(
            "You are a routing component. Decide the next step of a workflow.\n\
             Answer ONLY with one node name from the list. No explanations.\n\n\
             Recent conversation:\n{history}\n\n\
             User request: \"{task}\"\n\
             Attachments provided: {has_attachments}\n\n\
             ROUTING RULES:\n\
             - If the user asks to implement, create, build or develop something, answer `ui_ux_designer`.\n\
             - If the user asks to analyze, summarize or describe attached files, answer `multimodal_analyzer`.\n\
             - If the request already describes the software precisely and needs no design work, answer `planner`.\n\
             - For any other conversational situation, answer `conversational_agent`.\n\
             - If unsure, answer `conversational_agent`.\n\n\
             Which node comes next?"
        )
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(
        &self,
        task: &str,
        has_attachments: bool,
        history: &[String],
    ) -> crate::llm::Result<String> {
        let prompt = Self::build_prompt(task, has_attachments, history);
        self.generator
            .generate(&prompt, &[], GenerationStyle::Analytical)
            .await
    }
}
