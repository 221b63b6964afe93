//! Specialist workers
//!
//! Every worker reads the session state and returns a partial update; the
//! executor owns merging. Workers reach generation and retrieval only
//! through the handles in [`WorkerContext`].

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::artifacts::ArtifactDir;
use super::extractor::CodeBlockExtractor;
use super::router::WorkerKind;
use super::state::{ArtifactMap, SessionState, StateUpdate};
use crate::llm::{Generator, MediaPart};
use crate::retrieval::Retriever;

pub mod analyzer;
pub mod auditor;
pub mod conversational;
pub mod designer;
pub mod developer;
pub mod planner;

pub use analyzer::MultimodalAnalyzer;
pub use auditor::QualityAuditor;
pub use conversational::ConversationalAgent;
pub use designer::UiUxDesigner;
pub use developer::CodeDeveloper;
pub use planner::Planner;

/// Collaborators available to a worker during one session
#[derive(Clone)]
pub struct WorkerContext {
    pub generator: Arc<dyn Generator>,
    pub retriever: Arc<dyn Retriever>,
    pub extractor: Arc<CodeBlockExtractor>,
    pub artifacts: ArtifactDir,
    /// Encoded attachments, loaded once per session
    pub media: Vec<MediaPart>,
    /// Conversation lines shown to the conversational worker
    pub history_window: usize,
}

#[async_trait]
pub trait Worker: Send + Sync {
    fn kind(&self) -> WorkerKind;

    async fn run(&self, state: &SessionState, ctx: &WorkerContext) -> Result<StateUpdate>;
}

/// Worker lookup by kind
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    workers: HashMap<WorkerKind, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in worker
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ConversationalAgent));
        registry.register(Arc::new(MultimodalAnalyzer));
        registry.register(Arc::new(UiUxDesigner));
        registry.register(Arc::new(Planner));
        registry.register(Arc::new(CodeDeveloper::frontend()));
        registry.register(Arc::new(CodeDeveloper::backend()));
        registry.register(Arc::new(CodeDeveloper::database()));
        registry.register(Arc::new(QualityAuditor));
        registry
    }

    /// Register a worker, replacing any previous one of the same kind
    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        self.workers.insert(worker.kind(), worker);
    }

    pub fn get(&self, kind: WorkerKind) -> Option<Arc<dyn Worker>> {
        self.workers.get(&kind).map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

/// Render an artifact map for a prompt
pub(crate) fn render_artifacts(map: &ArtifactMap) -> String {
    map.iter()
        .map(|(filename, content)| format!("--- {} ---\n{}", filename, content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_covers_every_kind() {
        let registry = WorkerRegistry::standard();
        assert_eq!(registry.len(), WorkerKind::ALL.len());
        for kind in WorkerKind::ALL {
            let worker = registry.get(kind).unwrap();
            assert_eq!(worker.kind(), kind);
        }
    }

    #[test]
    fn test_render_artifacts() {
        let map: ArtifactMap = [
            ("index.html".to_string(), "<html/>".to_string()),
            ("style.css".to_string(), "body{}".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            render_artifacts(&map),
            "--- index.html ---\n<html/>\n\n--- style.css ---\nbody{}"
        );
    }
}
