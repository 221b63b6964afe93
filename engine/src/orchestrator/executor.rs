//! Session executor
//!
//! Drives supervisor -> worker -> supervisor for one session, merging each
//! worker's update into the state and streaming it as a delta. The loop
//! always ends in a terminal outcome: the supervisor's terminal decision,
//! the iteration cap, a failure or a closed delta channel.

use sdk::errors::{DevTeamErrorExt, EngineError};
use sdk::events::{SessionOutcome, StreamEvent, TaskResponse};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::router::{RoutingDecision, Supervisor, WorkerKind, DEFAULT_COMPLETION};
use super::state::SessionState;
use super::workers::{WorkerContext, WorkerRegistry};
use crate::secrets::scrub_secrets;

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingRouting,
    RunningWorker(WorkerKind),
    Terminated(SessionOutcome),
}

/// Final state of a session plus the caller-facing response
#[derive(Debug, Clone)]
pub struct Execution {
    pub response: TaskResponse,
    pub state: SessionState,
}

pub struct Executor {
    supervisor: Arc<Supervisor>,
    workers: Arc<WorkerRegistry>,
    max_iterations: u32,
}

impl Executor {
    pub fn new(supervisor: Arc<Supervisor>, workers: Arc<WorkerRegistry>, max_iterations: u32) -> Self {
        Self {
            supervisor,
            workers,
            max_iterations,
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run a session to completion
    ///
    /// Deltas go to `events` when given, followed by one `done` or `error`
    /// event. A closed channel cancels the session at the next emit.
    pub async fn run(
        &self,
        session_id: &str,
        mut state: SessionState,
        ctx: &WorkerContext,
        events: Option<&mpsc::Sender<StreamEvent>>,
    ) -> Execution {
        let mut phase = Phase::AwaitingRouting;
        let mut failure: Option<EngineError> = None;

        let outcome = loop {
            phase = match phase {
                Phase::Terminated(outcome) => break outcome,

                Phase::AwaitingRouting => {
                    if !state.is_terminal() && state.iteration >= self.max_iterations {
                        warn!(
                            "Iteration limit of {} reached, stopping session",
                            self.max_iterations
                        );
                        Phase::Terminated(SessionOutcome::IterationLimitExceeded)
                    } else {
                        match self.supervisor.route(&state, &ctx.artifacts).await {
                            Ok(RoutingDecision::Terminal { final_response }) => {
                                if let Some(message) = final_response {
                                    state.final_response = Some(message);
                                }
                                if state.approved {
                                    Phase::Terminated(SessionOutcome::Approved)
                                } else {
                                    Phase::Terminated(SessionOutcome::Completed)
                                }
                            }
                            Ok(RoutingDecision::Worker(kind)) => Phase::RunningWorker(kind),
                            Err(e) => {
                                let err = EngineError::Routing(format!("{:#}", e));
                                error!(recoverable = err.is_recoverable(), "{}", err);
                                failure = Some(err);
                                Phase::Terminated(SessionOutcome::Failed)
                            }
                        }
                    }
                }

                Phase::RunningWorker(kind) => {
                    match self.run_worker(kind, session_id, &mut state, ctx, events).await {
                        Ok(next) => next,
                        Err(err) => {
                            error!(recoverable = err.is_recoverable(), "{}", err);
                            failure = Some(err);
                            Phase::Terminated(SessionOutcome::Failed)
                        }
                    }
                }
            };
        };

        let response = self.finish(session_id, &state, ctx, outcome, failure);
        info!(
            outcome = %response.outcome,
            iterations = response.iterations,
            development_passes = response.development_passes,
            "Session finished"
        );

        if outcome != SessionOutcome::Cancelled {
            let event = match &response.error {
                Some(message) => StreamEvent::Error {
                    message: message.clone(),
                },
                None => StreamEvent::Done {
                    response: response.clone(),
                },
            };
            emit(events, event).await;
        }

        Execution { response, state }
    }

    /// One worker pass: run, count, merge, emit
    async fn run_worker(
        &self,
        kind: WorkerKind,
        session_id: &str,
        state: &mut SessionState,
        ctx: &WorkerContext,
        events: Option<&mpsc::Sender<StreamEvent>>,
    ) -> Result<Phase, EngineError> {
        let worker = self
            .workers
            .get(kind)
            .ok_or_else(|| EngineError::Routing(format!("no worker registered for {}", kind)))?;

        debug!(worker = %kind, iteration = state.iteration, "Running worker");
        let result = worker.run(state, ctx).await;

        state.iteration += 1;
        if kind.is_developer() {
            state.development_passes += 1;
        }

        let update = result.map_err(|e| EngineError::Worker(kind.to_string(), format!("{:#}", e)))?;
        let delta = serde_json::to_value(&update).unwrap_or_default();
        state.apply(update);

        let event = StreamEvent::Delta {
            session_id: session_id.to_string(),
            worker: kind.as_str().to_string(),
            iteration: state.iteration,
            update: delta,
        };
        if emit(events, event).await {
            Ok(Phase::AwaitingRouting)
        } else {
            info!("Delta receiver closed, cancelling session");
            Ok(Phase::Terminated(SessionOutcome::Cancelled))
        }
    }

    fn finish(
        &self,
        session_id: &str,
        state: &SessionState,
        ctx: &WorkerContext,
        outcome: SessionOutcome,
        failure: Option<EngineError>,
    ) -> TaskResponse {
        let artifacts: Vec<String> = state.written_paths.iter().cloned().collect();
        let entry_link = ctx.artifacts.written_entry_link(&state.written_paths);
        let error = failure.as_ref().map(|e| scrub_secrets(&e.to_string()));

        let final_response = match outcome {
            SessionOutcome::Approved | SessionOutcome::Completed => state
                .final_response
                .clone()
                .unwrap_or_else(|| DEFAULT_COMPLETION.to_string()),
            SessionOutcome::IterationLimitExceeded => {
                let limit = EngineError::MaxIterationsExceeded(self.max_iterations);
                let mut message = format!("{}. {}.", limit, limit.user_hint());
                if !artifacts.is_empty() {
                    message.push_str("\n\nFiles generated so far:");
                    for path in &artifacts {
                        message.push_str(&format!("\n- {}", path));
                    }
                }
                if let Some(link) = ctx.artifacts.entry_link_message(&state.written_paths) {
                    message.push_str(&link);
                }
                message
            }
            SessionOutcome::Failed => match (&failure, &error) {
                (Some(err), Some(text)) => format!(
                    "The task could not be completed: {}\n\n{}.",
                    text,
                    err.user_hint()
                ),
                _ => "The task could not be completed.".to_string(),
            },
            SessionOutcome::Cancelled => "The session was cancelled.".to_string(),
        };

        TaskResponse {
            session_id: session_id.to_string(),
            outcome,
            final_response,
            iterations: state.iteration,
            development_passes: state.development_passes,
            artifacts,
            entry_link,
            error,
        }
    }
}

/// Send an event; `false` when the receiver is gone
async fn emit(events: Option<&mpsc::Sender<StreamEvent>>, event: StreamEvent) -> bool {
    match events {
        Some(tx) => tx.send(event).await.is_ok(),
        None => true,
    }
}
