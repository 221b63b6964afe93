//! Conversational worker
//!
//! Answers in a `[DECISION]` / `[RESPONSE]` envelope. The answer always
//! completes the session; a `CONTINUE` decision only means the bot invited a
//! follow-up turn.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Worker, WorkerContext};
use crate::llm::GenerationStyle;
use crate::orchestrator::router::WorkerKind;
use crate::orchestrator::state::{SessionState, StateUpdate};

pub struct ConversationalAgent;

/// Parsed conversational reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// `true` when the bot expects the conversation to continue
    pub continues: bool,
    pub response: String,
}

impl ConversationalAgent {
    fn build_prompt(task: &str, history: &[String]) -> String {
        format!(
            "You are DevTeam-Bot, a helpful AI assistant. Your job is twofold:\n\
             1. Decide whether the conversation warrants continuing with a development workflow (CONTINUE) \
             or is a simple interaction that can end (END).\n\
             2. Write a friendly, appropriate answer for the user.\n\n\
             Conversation history:\n<history>\n{history}\n</history>\n\n\
             User request: \"{task}\"\n\n\
             **Decision rules:**\n\
             - `CONTINUE`: the request is a development task, even a vague one, or you are asking for \
             clarification about a future task.\n\
             - `END`: a greeting, a farewell, or a general question you have fully answered.\n\n\
             **Mandatory output format**, with no other words:\n\n\
             [DECISION]\nCONTINUE or END\n[RESPONSE]\nYour answer for the user.\n\n\
             **Your output for the current request:**",
            history = history.join("\n"),
        )
    }

    /// Split the envelope; anything unparseable is used verbatim
    pub fn parse_reply(raw: &str) -> Reply {
        let raw = raw.trim();
        match raw.split_once("[RESPONSE]") {
            Some((decision, response)) => {
                let decision = decision.replace("[DECISION]", "").trim().to_uppercase();
                Reply {
                    continues: decision.contains("CONTINUE"),
                    response: response.trim().to_string(),
                }
            }
            None => {
                warn!("Conversational reply is missing the [RESPONSE] section, using raw output");
                Reply {
                    continues: false,
                    response: raw.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl Worker for ConversationalAgent {
    fn kind(&self) -> WorkerKind {
        WorkerKind::ConversationalAgent
    }

    async fn run(&self, state: &SessionState, ctx: &WorkerContext) -> Result<StateUpdate> {
        let start = state.history.len().saturating_sub(ctx.history_window);
        let prompt = Self::build_prompt(&state.task, &state.history[start..]);
        let raw = ctx
            .generator
            .generate(&prompt, &[], GenerationStyle::Creative)
            .await?;

        let reply = Self::parse_reply(&raw);
        debug!(continues = reply.continues, "Conversational reply parsed");

        Ok(StateUpdate::new()
            .history_entry(format!("User: {}", state.task))
            .history_entry(format!("Bot: {}", reply.response))
            .final_response(reply.response)
            .task_complete(true))
    }
}
