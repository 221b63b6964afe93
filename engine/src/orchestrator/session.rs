//! Session store
//!
//! Each submitted task gets its own id, state and artifact directory. A
//! [`SessionHandle`] owns that scope: dropping it (normal completion or a
//! disconnected client) unregisters the session and removes its uploads.

use anyhow::Result;
use sdk::events::{StreamEvent, TaskResponse, TaskSubmission};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{info, info_span, warn, Instrument};

use super::artifacts::{ArtifactDir, ArtifactStore};
use super::attachments::{load_media, remove_uploads, remove_uploads_blocking, resolve_upload};
use super::classifier::{IntentClassifier, LlmIntentClassifier};
use super::executor::{Execution, Executor};
use super::extractor::CodeBlockExtractor;
use super::router::Supervisor;
use super::state::SessionState;
use super::workers::{WorkerContext, WorkerRegistry};
use crate::config::Config;
use crate::db::sessions::{SessionRecord, SessionRepository};
use crate::llm::Generator;
use crate::retrieval::Retriever;

/// Process-wide collaborator handles shared by every session
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn Generator>,
    pub retriever: Arc<dyn Retriever>,
    pub classifier: Arc<dyn IntentClassifier>,
}

impl Collaborators {
    /// Classification runs on the same generator
    pub fn new(generator: Arc<dyn Generator>, retriever: Arc<dyn Retriever>) -> Self {
        let classifier = Arc::new(LlmIntentClassifier::new(Arc::clone(&generator)));
        Self {
            generator,
            retriever,
            classifier,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }
}

/// Knobs that shape every session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_iterations: u32,
    pub history_window: usize,
    pub output_root: PathBuf,
    pub upload_dir: PathBuf,
    pub scope_by_session: bool,
    pub public_base_url: Option<String>,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_iterations: config.orchestrator.max_iterations,
            history_window: config.orchestrator.history_window,
            output_root: config.core.output_dir.clone(),
            upload_dir: config.core.upload_dir.clone(),
            scope_by_session: config.core.scope_artifacts_by_session,
            public_base_url: config.server.public_base_url.clone(),
        }
    }
}

type ActiveSessions = Arc<Mutex<HashSet<String>>>;

/// Allocates isolated sessions
pub struct SessionStore {
    collaborators: Collaborators,
    executor: Arc<Executor>,
    extractor: Arc<CodeBlockExtractor>,
    artifacts: ArtifactStore,
    upload_dir: PathBuf,
    history_window: usize,
    active: ActiveSessions,
    history: Option<Arc<SessionRepository>>,
}

impl SessionStore {
    pub fn new(collaborators: Collaborators, settings: SessionSettings) -> Result<Self> {
        let supervisor = Supervisor::new(
            Arc::clone(&collaborators.classifier),
            settings.history_window,
        )?;
        let executor = Executor::new(
            Arc::new(supervisor),
            Arc::new(WorkerRegistry::standard()),
            settings.max_iterations,
        );

        Ok(Self {
            collaborators,
            executor: Arc::new(executor),
            extractor: Arc::new(CodeBlockExtractor::new()?),
            artifacts: ArtifactStore::new(
                settings.output_root,
                settings.scope_by_session,
                settings.public_base_url,
            ),
            upload_dir: settings.upload_dir,
            history_window: settings.history_window,
            active: Arc::new(Mutex::new(HashSet::new())),
            history: None,
        })
    }

    /// Record finished sessions in the database
    pub fn with_history(mut self, repository: SessionRepository) -> Self {
        self.history = Some(Arc::new(repository));
        self
    }

    pub fn artifact_store(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Open a session for a client submission
    ///
    /// Attachment references name files in the upload directory; missing
    /// ones are skipped.
    pub fn open_submission(&self, submission: &TaskSubmission) -> SessionHandle {
        let attachments = submission
            .attachment_references
            .iter()
            .filter_map(|reference| resolve_upload(&self.upload_dir, reference))
            .collect();

        self.open(
            &submission.task_text,
            attachments,
            submission.conversation_history.clone(),
        )
    }

    /// Open a session with already resolved attachment paths
    pub fn open(&self, task: &str, attachments: Vec<PathBuf>, history: Vec<String>) -> SessionHandle {
        let id = uuid::Uuid::new_v4().to_string();
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone());
        info!(session_id = %id, attachments = attachments.len(), "Session opened");

        SessionHandle {
            artifacts: self.artifacts.for_session(&id),
            state: SessionState::new(task, attachments, history),
            id,
            collaborators: self.collaborators.clone(),
            executor: Arc::clone(&self.executor),
            extractor: Arc::clone(&self.extractor),
            history_window: self.history_window,
            upload_dir: self.upload_dir.clone(),
            active: Arc::clone(&self.active),
            history: self.history.clone(),
            started_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Scoped ownership of one running session
pub struct SessionHandle {
    id: String,
    state: SessionState,
    artifacts: ArtifactDir,
    collaborators: Collaborators,
    executor: Arc<Executor>,
    extractor: Arc<CodeBlockExtractor>,
    history_window: usize,
    upload_dir: PathBuf,
    active: ActiveSessions,
    history: Option<Arc<SessionRepository>>,
    started_at: i64,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn artifacts(&self) -> &ArtifactDir {
        &self.artifacts
    }

    /// Run the session to its terminal outcome
    pub async fn run(self, events: Option<&mpsc::Sender<StreamEvent>>) -> TaskResponse {
        self.execute(events).await.response
    }

    /// Like [`SessionHandle::run`], also returning the final state
    pub async fn execute(mut self, events: Option<&mpsc::Sender<StreamEvent>>) -> Execution {
        let span = info_span!("session", id = %self.id);

        async {
            let ctx = WorkerContext {
                generator: Arc::clone(&self.collaborators.generator),
                retriever: Arc::clone(&self.collaborators.retriever),
                extractor: Arc::clone(&self.extractor),
                artifacts: self.artifacts.clone(),
                media: load_media(&self.state.attachments).await,
                history_window: self.history_window,
            };

            let state = std::mem::take(&mut self.state);
            let task = state.task.clone();
            // Drop still cleans up if this future is abandoned mid-run
            self.state.attachments = state.attachments.clone();
            let execution = self.executor.run(&self.id, state, &ctx, events).await;

            remove_uploads(&self.upload_dir, &self.state.attachments).await;
            self.state.attachments.clear();

            if let Some(repository) = &self.history {
                let record =
                    SessionRecord::from_response(&task, &execution.response, self.started_at);
                if let Err(e) = repository.record(&record).await {
                    warn!("Failed to record session history: {:#}", e);
                }
            }

            execution
        }
        .instrument(span)
        .await
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
        let leftover = std::mem::take(&mut self.state.attachments);
        if !leftover.is_empty() {
            let upload_dir = self.upload_dir.clone();
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn_blocking(move || remove_uploads_blocking(&upload_dir, &leftover));
                }
                Err(_) => remove_uploads_blocking(&upload_dir, &leftover),
            }
        }
        info!(session_id = %self.id, "Session released");
    }
}
