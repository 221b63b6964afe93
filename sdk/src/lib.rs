//! DevTeam SDK
//!
//! Shared library providing the wire types and error taxonomy used by the
//! orchestration engine and by any client that talks to its server.

/// Error types and handling
pub mod errors;

/// Streaming and single-shot wire types
pub mod events;

// Re-export commonly used types
pub use errors::{DevTeamErrorExt, EngineError};
pub use events::{SessionOutcome, StreamEvent, TaskResponse, TaskSubmission};
