//! Step Handler Driver (spec §4.3). Runs a template's `stepHandler` as a
//! cooperative coroutine on a dedicated task, communicating over two bounded
//! channels as spec §9 suggests, so the driver never interleaves two
//! directives from one handler (each channel has capacity 1: the handler
//! blocks sending its next directive until the driver's resume arrives).

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::agent::state::{Directive, ResumeValue};
use crate::error::AgentError;

/// Handle given to a running step handler to yield directives and receive resumes.
pub struct HandlerHandle {
    directive_tx: mpsc::Sender<Directive>,
    resume_rx: mpsc::Receiver<ResumeValue>,
}

impl HandlerHandle {
    /// Yields `directive` to the driver and awaits its resume value. Returns
    /// `None` if the driver has shut down (the handler should return promptly).
    pub async fn yield_directive(&mut self, directive: Directive) -> Option<ResumeValue> {
        if self.directive_tx.send(directive).await.is_err() {
            return None;
        }
        self.resume_rx.recv().await
    }
}

/// A template's step-handler program. Implementations drive `handle` through
/// whatever sequence of directives the agent's custom control flow needs,
/// then return; the driver terminates the agent when this returns (spec §4.3).
#[async_trait]
pub trait StepHandlerFactory: Send + Sync {
    async fn run(&self, handle: HandlerHandle) -> Result<(), AgentError>;
}

/// Runs `factory` to completion, executing each yielded directive via
/// `execute_directive` (which delegates `STEP*`/`GENERATE_N` to the Agent
/// Step Loop and `TOOL_CALL` to the Tool Gate, per spec §4.3).
///
/// An error returned by the handler (or a panic, surfaced as a join error)
/// becomes `HandlerFault`; history up to the last completed directive is
/// preserved by the caller, since only completed resumes ever touch state.
pub async fn drive<F>(
    factory: Arc<dyn StepHandlerFactory>,
    mut execute_directive: F,
) -> Result<(), AgentError>
where
    F: FnMut(Directive) -> BoxFuture<'static, Result<ResumeValue, AgentError>> + Send + 'static,
{
    let (directive_tx, mut directive_rx) = mpsc::channel(1);
    let (resume_tx, resume_rx) = mpsc::channel(1);
    let handle = HandlerHandle {
        directive_tx,
        resume_rx,
    };

    let handler_task = tokio::spawn(async move { factory.run(handle).await });

    while let Some(directive) = directive_rx.recv().await {
        let resume = match execute_directive(directive).await {
            Ok(resume) => resume,
            Err(e) => {
                // Stop driving; the handler task is dropped along with its
                // channels, which unblocks it on its next yield with `None`.
                return Err(e);
            }
        };
        if resume_tx.send(resume).await.is_err() {
            break;
        }
    }

    match handler_task.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(join_err) => Err(AgentError::HandlerFault(join_err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, LlmUsage, ResponsePart};
    use crate::agent::state::AgentState;

    /// Mirrors S4: `GENERATE_N(3)` then `STEP_TEXT("picked: blue")`.
    struct GenerateThenPick;

    #[async_trait]
    impl StepHandlerFactory for GenerateThenPick {
        async fn run(&self, mut handle: HandlerHandle) -> Result<(), AgentError> {
            let resume = handle
                .yield_directive(Directive::GenerateN(3))
                .await
                .ok_or_else(|| AgentError::HandlerFault("driver closed".into()))?;
            let responses = resume.n_responses.unwrap_or_default();
            let colors: Vec<_> = responses.iter().map(|r| r.text()).collect();
            assert_eq!(colors, vec!["red", "green", "blue"]);

            let _resume = handle
                .yield_directive(Directive::StepText("picked: blue".into()))
                .await
                .ok_or_else(|| AgentError::HandlerFault("driver closed".into()))?;
            Ok(())
        }
    }

    fn resume_with_responses(responses: Vec<LlmResponse>) -> ResumeValue {
        ResumeValue {
            agent_state: AgentState::new("a1", "test"),
            tool_result: None,
            steps_complete: 1,
            n_responses: Some(responses),
        }
    }

    fn resume_plain() -> ResumeValue {
        ResumeValue {
            agent_state: AgentState::new("a1", "test"),
            tool_result: None,
            steps_complete: 1,
            n_responses: None,
        }
    }

    #[tokio::test]
    async fn drives_generate_n_then_step_text_to_completion() {
        let mut directives_seen = Vec::new();
        let factory = Arc::new(GenerateThenPick);
        let result = drive(factory, move |directive| {
            directives_seen.push(format!("{directive:?}"));
            Box::pin(async move {
                match directive {
                    Directive::GenerateN(3) => Ok(resume_with_responses(vec![
                        LlmResponse {
                            parts: vec![ResponsePart::Text("red".into())],
                            usage: LlmUsage::default(),
                        },
                        LlmResponse {
                            parts: vec![ResponsePart::Text("green".into())],
                            usage: LlmUsage::default(),
                        },
                        LlmResponse {
                            parts: vec![ResponsePart::Text("blue".into())],
                            usage: LlmUsage::default(),
                        },
                    ])),
                    Directive::StepText(_) => Ok(resume_plain()),
                    other => Err(AgentError::HandlerFault(format!("unexpected {other:?}"))),
                }
            })
        })
        .await;
        assert!(result.is_ok());
    }

    struct FaultyHandler;

    #[async_trait]
    impl StepHandlerFactory for FaultyHandler {
        async fn run(&self, mut handle: HandlerHandle) -> Result<(), AgentError> {
            handle.yield_directive(Directive::Step).await;
            Err(AgentError::HandlerFault("boom".into()))
        }
    }

    #[tokio::test]
    async fn handler_error_surfaces_as_handler_fault() {
        let factory = Arc::new(FaultyHandler);
        let result = drive(factory, |_d| Box::pin(async { Ok(resume_plain()) })).await;
        assert!(matches!(result, Err(AgentError::HandlerFault(_))));
    }
}
