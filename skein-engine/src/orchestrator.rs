//! Session Orchestrator (spec §4.7): the entry point for one prompt. Owns
//! the run's interaction with the cancellation token and the
//! interruption-bookkeeping steps on cancellation or early failure.

use tokio_util::sync::CancellationToken;

use crate::agent::state::{AgentOutput, AgentTemplate, SessionState};
use crate::agent::step_loop::StepLoop;
use crate::error::AgentError;
use crate::message::{tags, Message};
use crate::protocol::{OutputShape, RunResult};

const INTERRUPTION_MARKER: &str =
    "<system>User interrupted the response. The assistant's previous work has been preserved.</system>";

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Runs the root Agent Step Loop for one prompt (spec §4.7).
pub struct Orchestrator {
    pub step_loop: StepLoop,
}

impl Orchestrator {
    /// `Run(prompt, sessionState, agentId, cancellation) -> RunResult` (spec §4.7).
    pub async fn run(
        &self,
        prompt: String,
        mut session_state: SessionState,
        template: &AgentTemplate,
        cancellation: CancellationToken,
    ) -> RunResult {
        let duplicate = session_state
            .main_agent_state
            .message_history
            .last()
            .map(|m| matches!(m, Message::User { .. }) && m.flatten_text() == prompt)
            .unwrap_or(false);

        if !duplicate {
            session_state
                .main_agent_state
                .message_history
                .push(Message::user(prompt, now_ms()).with_tag(tags::USER_PROMPT));
        }

        let root_state = session_state.main_agent_state.clone();

        let (final_state, result) = tokio::select! {
            outcome = self.step_loop.run_to_completion(template, root_state) => outcome,
            _ = cancellation.cancelled() => {
                // The loop's own tasks observe the same token and will wind
                // down; here we just stop waiting and fall into the
                // cancellation branch below with whatever state existed
                // going in, since run_to_completion did not get to return.
                (session_state.main_agent_state.clone(), Err(AgentError::Cancelled))
            }
        };

        session_state.main_agent_state = final_state;

        match result {
            Ok(()) => {
                let output = session_state
                    .main_agent_state
                    .output
                    .clone()
                    .unwrap_or(AgentOutput::Error("agent produced no output".to_string()));
                RunResult {
                    session_state,
                    output: output.into(),
                }
            }
            Err(AgentError::Cancelled) => {
                self.append_interruption_marker(&mut session_state);
                RunResult {
                    session_state,
                    output: OutputShape::Error {
                        message: AgentError::Cancelled.to_string(),
                    },
                }
            }
            Err(e) => {
                self.append_interruption_marker(&mut session_state);
                RunResult {
                    session_state,
                    output: OutputShape::Error { message: e.to_string() },
                }
            }
        }
    }

    /// Appends the interruption marker, preserving any partial assistant
    /// text already streamed and never appending an empty assistant message
    /// (spec §4.7 step 4).
    fn append_interruption_marker(&self, session_state: &mut SessionState) {
        let history = &mut session_state.main_agent_state.message_history;
        if let Some(Message::Assistant { parts, .. }) = history.last() {
            let empty = parts.iter().all(|p| match p {
                crate::message::AssistantPart::Text(t) => t.is_empty(),
                _ => false,
            });
            if empty {
                history.pop();
            }
        }
        history.push(Message::user(INTERRUPTION_MARKER, now_ms()));
    }
}
