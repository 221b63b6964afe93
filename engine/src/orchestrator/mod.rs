//! Orchestration engine
//!
//! A session threads one [`SessionState`] through a supervisor/worker
//! loop: the supervisor picks a worker, the worker returns a partial
//! update, the executor merges it and asks the supervisor again until a
//! terminal outcome.

pub mod artifacts;
pub mod attachments;
pub mod classifier;
pub mod executor;
pub mod extractor;
pub mod router;
pub mod session;
pub mod state;
pub mod workers;

pub use artifacts::{ArtifactDir, ArtifactStore};
pub use classifier::{IntentClassifier, LlmIntentClassifier};
pub use executor::{Execution, Executor, Phase};
pub use extractor::{CodeBlockExtractor, ExtractionReport};
pub use router::{RoutingDecision, Supervisor, WorkerKind};
pub use session::{Collaborators, SessionHandle, SessionSettings, SessionStore};
pub use state::{ArtifactCategory, Plan, PlanType, SessionState, StateUpdate};
pub use workers::{Worker, WorkerContext, WorkerRegistry};
