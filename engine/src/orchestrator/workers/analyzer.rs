//! Multimodal analyzer
//!
//! Describes the attachments. A video is treated as a UI walkthrough and
//! its analysis becomes the design spec for the planner; anything else is
//! answered directly and ends the session.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{Worker, WorkerContext};
use crate::llm::GenerationStyle;
use crate::orchestrator::attachments::has_video;
use crate::orchestrator::router::WorkerKind;
use crate::orchestrator::state::{SessionState, StateUpdate};

pub struct MultimodalAnalyzer;

impl MultimodalAnalyzer {
    fn build_prompt(task: &str, video: bool) -> String {
        if !video {
            return format!(
                "You are an expert analyst. The user's request is: \"{}\".\n\
                 Analyze the attached files and give a detailed, useful description that answers the request.",
                task
            );
        }

        format!(
            "You are an expert UI/UX analyst. The user's request is: \"{task}\".\n\
             You received a video walkthrough. Extract a DETAILED, STRUCTURED UI/UX specification for the frontend.\n\n\
             **CRITICAL:** ignore user actions (clicks, navigation, mouse movement). Focus only on the visual \
             and design aspects of the interface and never mention user actions.\n\n\
             Your answer MUST include these sections, with as much visual detail as possible:\n\
             1. Main color palette (dominant colors, hex codes when discernible).\n\
             2. Layout and structure (regions, columns, grids, alignment).\n\
             3. Sizes and spacing.\n\
             4. Typography.\n\
             5. Key UI components (buttons, inputs, icons, images, navigation).\n\
             6. Visible interactions and animations (hover effects, transitions, dialogs).\n\n\
             Your goal is an exhaustive visual guide for the frontend developer."
        )
    }
}

#[async_trait]
impl Worker for MultimodalAnalyzer {
    fn kind(&self) -> WorkerKind {
        WorkerKind::MultimodalAnalyzer
    }

    async fn run(&self, state: &SessionState, ctx: &WorkerContext) -> Result<StateUpdate> {
        let video = has_video(&state.attachments);
        let prompt = Self::build_prompt(&state.task, video);
        let analysis = ctx
            .generator
            .generate(&prompt, &ctx.media, GenerationStyle::Creative)
            .await?
            .trim()
            .to_string();

        info!(video, chars = analysis.len(), "Attachment analysis complete");

        if video {
            return Ok(StateUpdate::new().design_spec(analysis));
        }

        Ok(StateUpdate::new()
            .final_response(analysis)
            .task_complete(true))
    }
}
