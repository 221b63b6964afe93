//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use devteam_engine::llm::{GenerationStyle, Generator, LLMError, MediaPart};
use devteam_engine::orchestrator::{
    Collaborators, IntentClassifier, SessionSettings, SessionStore,
};
use devteam_engine::retrieval::DisabledRetriever;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Generator that replays canned replies in order
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _media: &[MediaPart],
        _style: GenerationStyle,
    ) -> devteam_engine::llm::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LLMError::ProviderUnavailable("script exhausted".to_string()))
    }
}

/// Classifier that always answers the same label
pub struct StaticClassifier(pub &'static str);

#[async_trait]
impl IntentClassifier for StaticClassifier {
    async fn classify(
        &self,
        _task: &str,
        _has_attachments: bool,
        _history: &[String],
    ) -> devteam_engine::llm::Result<String> {
        Ok(self.0.to_string())
    }
}

pub fn settings(temp: &TempDir, max_iterations: u32) -> SessionSettings {
    SessionSettings {
        max_iterations,
        history_window: 6,
        output_root: temp.path().join("outputs"),
        upload_dir: temp.path().join("uploads"),
        scope_by_session: true,
        public_base_url: None,
    }
}

/// Session store whose classifier always picks `entry`
pub fn store(
    temp: &TempDir,
    generator: Arc<ScriptedGenerator>,
    entry: &'static str,
    max_iterations: u32,
) -> SessionStore {
    let collaborators = Collaborators::new(generator, Arc::new(DisabledRetriever))
        .with_classifier(Arc::new(StaticClassifier(entry)));
    SessionStore::new(collaborators, settings(temp, max_iterations)).unwrap()
}

pub const FRONTEND_PLAN: &str =
    r#"{"plan_type": "frontend", "frontend_task": "Build a snake game in a single page", "frontend_tech": "HTML, CSS, JavaScript"}"#;

pub const SNAKE_PAGE: &str = "Here is the game.\n\
<!--- index.html_CODE_START --->\n\
<!DOCTYPE html>\n<html><body><canvas id=\"board\"></canvas><script src=\"game.js\"></script></body></html>\n\
<!--- index.html_CODE_END --->\n\
// --- game.js_CODE_START ---\n\
const board = document.getElementById('board');\n\
// --- game.js_CODE_END ---\n";

pub const APPROVE: &str = r#"{"approved": true, "feedback": "Meets the plan"}"#;

pub fn reject(feedback: &str) -> String {
    serde_json::json!({"approved": false, "feedback": feedback}).to_string()
}
