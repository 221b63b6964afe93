//! UI/UX designer
//!
//! Turns mockups (images or a video) into a Markdown design spec consumed
//! by the planner.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use super::{Worker, WorkerContext};
use crate::llm::GenerationStyle;
use crate::orchestrator::attachments::has_video;
use crate::orchestrator::router::WorkerKind;
use crate::orchestrator::state::{SessionState, StateUpdate};

pub struct UiUxDesigner;

const BASE_SECTIONS: &str = "## 1. Overall Structure and Layout\n\
     - Main arrangement of the interface, visual hierarchy and organization.\n\n\
     ## 2. Color Palette\n\
     - Main colors with hex codes and where they are used.\n\n\
     ## 3. Typography\n\
     - Fonts, sizes, weights and usage.\n\n\
     ## 4. Component Breakdown\n\
     - Reusable components, their content, style and states.\n\n\
     ## 5. Assets\n\
     - Images, icons, illustrations and other required resources.\n";

const BEHAVIOR_SECTION: &str = "\n## 6. Behavior and Animations\n\
     - **User events:** a table with columns `Time | Action | Element | State change`.\n\
     - **State transitions:** how the interface changes after each event.\n\
     - **Animations:** duration, direction and style.\n\
     - **JavaScript logic:** pseudocode or functions to implement.\n";

impl UiUxDesigner {
    fn build_prompt(task: &str, video: bool) -> String {
        let behavior = if video { BEHAVIOR_SECTION } else { "" };
        format!(
            "You are an expert UI/UX designer. Analyze the attached media and DO NOT SKIP ANY SECTION.\n\
             Produce the complete specification in Markdown, strictly in this order and format:\n\n\
             {BASE_SECTIONS}{behavior}\n\
             The user's original request is: \"{task}\".\n\
             Do not answer outside this format."
        )
    }
}

#[async_trait]
impl Worker for UiUxDesigner {
    fn kind(&self) -> WorkerKind {
        WorkerKind::UiUxDesigner
    }

    async fn run(&self, state: &SessionState, ctx: &WorkerContext) -> Result<StateUpdate> {
        if ctx.media.is_empty() {
            warn!("Designer has no usable media, planning from the request alone");
            return Ok(StateUpdate::new().design_spec(format!(
                "No visual reference was provided. Design directly from the request: {}",
                state.task
            )));
        }

        let prompt = Self::build_prompt(&state.task, has_video(&state.attachments));
        let spec = ctx
            .generator
            .generate(&prompt, &ctx.media, GenerationStyle::Creative)
            .await?
            .trim()
            .to_string();

        info!(chars = spec.len(), "Design spec generated");
        Ok(StateUpdate::new().design_spec(spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MediaPart;
    use crate::orchestrator::testing::{test_context, ScriptedGenerator};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_video_prompt_adds_behavior_section() {
        assert!(UiUxDesigner::build_prompt("x", true).contains("## 6. Behavior"));
        assert!(!UiUxDesigner::build_prompt("x", false).contains("## 6. Behavior"));
    }

    #[tokio::test]
    async fn test_spec_from_mockup() {
        let temp = TempDir::new().unwrap();
        let generator = ScriptedGenerator::new(["## 1. Layout\nCentered card"]);
        let mut ctx = test_context(temp.path(), generator.clone());
        ctx.media = vec![MediaPart {
            name: "mock.png".into(),
            mime_type: "image/png".into(),
            data: "AAAA".into(),
        }];
        let mut state = SessionState::new("implement this", vec![PathBuf::from("mock.png")], vec![]);

        state.apply(UiUxDesigner.run(&state, &ctx).await.unwrap());
        assert_eq!(state.design_spec.as_deref(), Some("## 1. Layout\nCentered card"));
        assert_eq!(generator.media_counts(), vec![1]);
    }

    #[tokio::test]
    async fn test_without_media_skips_generation() {
        let temp = TempDir::new().unwrap();
        let generator = ScriptedGenerator::new(Vec::<String>::new());
        let ctx = test_context(temp.path(), generator.clone());
        let mut state = SessionState::new("implement a todo app", vec![], vec![]);

        state.apply(UiUxDesigner.run(&state, &ctx).await.unwrap());
        assert!(state.design_spec.unwrap().contains("implement a todo app"));
        assert_eq!(generator.calls(), 0);
    }
}
