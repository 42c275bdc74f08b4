//! Agent Step Loop (spec §4.4): the engine's core. One iteration composes a
//! prompt, calls the model, extracts and executes tool calls, appends
//! results, and decides whether the agent continues.

use std::sync::Arc;

use futures::future::join_all;
use uuid::Uuid;

use crate::agent::state::{AgentOutput, AgentState, AgentTemplate, Directive, OutputMode, ResumeValue};
use crate::agent::step_handler::{drive, StepHandlerFactory};
use crate::cache_control;
use crate::error::AgentError;
use crate::event::EventStream;
use crate::llm::{GenerateRequest, LlmClient, LlmResponse, ResponsePart};
use crate::message::{tags, AssistantPart, Message, ToolOutputPart, UserPart};
use crate::tools::{ClientToolTransport, ExtractedToolCall, ToolCallContext, ToolCallExtractor, ToolRegistry};

/// Bookkeeping tools that do not, by themselves, force another step (spec
/// §4.4 step 5's named set) — when every tool invoked in a step is one of
/// these, the step still terminates ("continuation forcing", §4.4).
const SOFT_NO_OP_TOOLS: &[&str] = &[
    "think_deeply",
    "set_output",
    "set_messages",
    "add_message",
    "suggest_followups",
    "task_completed",
    "write_todos",
];

fn is_soft_no_op(name: &str) -> bool {
    SOFT_NO_OP_TOOLS.contains(&name) || name.starts_with("subgoal") || name.starts_with("plan")
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Outcome of one step (spec §4.4): whether the agent should keep going.
pub struct StepOutcome {
    pub terminated: bool,
    pub reason: Option<AgentError>,
}

/// Shared collaborators for running agent steps. Immutable for the lifetime
/// of a session (spec §5): the tool registry, the model client, and the
/// tool-call extractor are all session-wide singletons.
#[derive(Clone)]
pub struct StepLoop {
    pub llm: Arc<dyn LlmClient>,
    pub registry: Arc<ToolRegistry>,
    pub extractor: Arc<dyn ToolCallExtractor>,
    pub transport: Arc<dyn ClientToolTransport>,
    pub events: EventStream,
}

impl StepLoop {
    /// Composes the prompt for one generate call (spec §4.4 step 1): system
    /// + instructions + aggregated, retained history + step prompt, then
    /// applies the Cache-Control Annotator. Returns the list sent to the
    /// model; `state.message_history` is not touched here.
    pub fn compose_prompt(&self, template: &AgentTemplate, state: &AgentState) -> Vec<Message> {
        let mut composed = Vec::new();
        if let Some(system) = &template.system_prompt {
            composed.push(Message::system(system.clone(), now_ms()));
        }
        if let Some(instructions) = &template.instructions_prompt {
            composed.push(Message::user(instructions.clone(), now_ms()));
        }
        composed.extend(crate::message::aggregate(&state.message_history));
        if let Some(step_prompt) = &template.step_prompt {
            composed.push(Message::user(step_prompt.clone(), now_ms()).with_tag(tags::STEP_PROMPT));
        }
        cache_control::annotate(&composed)
    }

    /// Runs exactly one default generate+tools cycle (spec §4.4 steps 2-5).
    pub async fn run_step_once(
        &self,
        template: &AgentTemplate,
        state: &mut AgentState,
    ) -> Result<StepOutcome, AgentError> {
        let prompt = self.compose_prompt(template, state);
        let tool_specs = template
            .tool_names
            .iter()
            .filter_map(|name| self.registry.resolve(name).ok())
            .map(|t| t.spec())
            .collect::<Vec<_>>();

        let request = GenerateRequest::new(template.model.clone(), prompt, tool_specs);
        let response = self.llm.generate(request).await?;
        state.record_direct_usage(response.usage.total());
        self.stream_response_parts(&state.agent_id, &response).await?;

        let assistant_message = self.build_assistant_message(&response);
        self.clear_prior_tag(state, tags::LAST_ASSISTANT_MESSAGE);
        state
            .message_history
            .push(assistant_message.clone().with_tag(tags::LAST_ASSISTANT_MESSAGE));

        let text = assistant_message.flatten_text();
        let extracted = self.extractor.extract(&text);

        let mut calls: Vec<(String, String, serde_json::Value)> = Vec::new();
        if let Message::Assistant { parts, .. } = &assistant_message {
            for part in parts {
                if let AssistantPart::ToolCall { id, name, input } = part {
                    calls.push((id.clone(), name.clone(), input.clone()));
                }
            }
        }
        for ExtractedToolCall { id, name, input } in extracted {
            let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
            calls.push((id, name, input));
        }

        if calls.is_empty() {
            return Ok(StepOutcome {
                terminated: true,
                reason: None,
            });
        }

        let results = self.execute_tool_calls(state, &calls).await?;

        for (_, name, input) in &calls {
            if name == crate::tools::SET_OUTPUT_TOOL_NAME {
                let value = input.get("value").cloned().unwrap_or(serde_json::Value::Null);
                state.output = Some(AgentOutput::StructuredOutput(value));
            }
        }

        let terminates = calls
            .iter()
            .zip(results.iter())
            .all(|((_, name, _), ends)| *ends || is_soft_no_op(name));

        Ok(StepOutcome {
            terminated: terminates,
            reason: None,
        })
    }

    async fn stream_response_parts(
        &self,
        agent_id: &str,
        response: &LlmResponse,
    ) -> Result<(), AgentError> {
        for part in &response.parts {
            match part {
                ResponsePart::Text(t) => {
                    self.events
                        .emit(skein_stream::ProtocolEvent::Text {
                            agent_id: agent_id.to_string(),
                            text: t.clone(),
                        })
                        .await?
                }
                ResponsePart::Reasoning(r) => {
                    self.events
                        .emit(skein_stream::ProtocolEvent::ReasoningDelta {
                            agent_id: agent_id.to_string(),
                            delta: r.clone(),
                        })
                        .await?
                }
                ResponsePart::ToolCall { id, name, input } => {
                    self.events
                        .emit(skein_stream::ProtocolEvent::ToolCall {
                            agent_id: agent_id.to_string(),
                            tool_call_id: id.clone().unwrap_or_default(),
                            name: name.clone(),
                            input: input.clone(),
                        })
                        .await?
                }
            }
        }
        Ok(())
    }

    fn build_assistant_message(&self, response: &LlmResponse) -> Message {
        let parts = response
            .parts
            .iter()
            .map(|p| match p {
                ResponsePart::Text(t) => AssistantPart::Text(t.clone()),
                ResponsePart::Reasoning(r) => AssistantPart::Reasoning(r.clone()),
                ResponsePart::ToolCall { id, name, input } => AssistantPart::ToolCall {
                    id: id.clone().unwrap_or_else(|| Uuid::new_v4().to_string()),
                    name: name.clone(),
                    input: input.clone(),
                },
            })
            .collect::<Vec<_>>();
        let parts = if parts.is_empty() {
            vec![AssistantPart::Text(String::new())]
        } else {
            parts
        };
        Message::Assistant {
            parts,
            meta: crate::message::Metadata::new(now_ms()),
        }
    }

    fn clear_prior_tag(&self, state: &mut AgentState, tag: &str) {
        for msg in state.message_history.iter_mut() {
            msg.meta_mut().tags.remove(tag);
        }
    }

    /// Executes tool calls concurrently but appends results in call order
    /// (spec §4.4 ordering guarantee, §5). Returns, per call, whether it
    /// ends the agent step.
    async fn execute_tool_calls(
        &self,
        state: &mut AgentState,
        calls: &[(String, String, serde_json::Value)],
    ) -> Result<Vec<bool>, AgentError> {
        let futures = calls.iter().map(|(id, name, input)| {
            let registry = self.registry.clone();
            let transport = self.transport.clone();
            let agent_id = state.agent_id.clone();
            let id = id.clone();
            let name = name.clone();
            let input = input.clone();
            async move {
                let outcome = Self::execute_one_tool(registry, transport, &agent_id, &id, &name, &input).await;
                (id, name, outcome)
            }
        });
        let outcomes = join_all(futures).await;

        let mut ends = Vec::with_capacity(outcomes.len());
        for (tool_call_id, name, outcome) in outcomes {
            let ends_agent_step = match &outcome {
                Ok((outputs, ends)) => {
                    self.append_tool_result(state, &tool_call_id, &name, outputs.clone());
                    *ends
                }
                Err(err) if err.is_non_terminating() => {
                    let synthetic = vec![ToolOutputPart::Json(serde_json::json!({
                        "error": err.code(),
                        "message": err.to_string(),
                    }))];
                    self.append_tool_result(state, &tool_call_id, &name, synthetic);
                    true
                }
                Err(err) => return Err(err.clone()),
            };
            ends.push(ends_agent_step);
        }
        Ok(ends)
    }

    async fn execute_one_tool(
        registry: Arc<ToolRegistry>,
        transport: Arc<dyn ClientToolTransport>,
        agent_id: &str,
        tool_call_id: &str,
        name: &str,
        input: &serde_json::Value,
    ) -> Result<(Vec<ToolOutputPart>, bool), AgentError> {
        let tool = registry.resolve(name)?;
        registry.validate_input(name, input)?;
        let ctx = ToolCallContext {
            agent_id: agent_id.to_string(),
            tool_call_id: tool_call_id.to_string(),
            transport,
        };
        let outputs = tool
            .call(input.clone(), &ctx)
            .await
            .map_err(|e| match e {
                AgentError::ToolTimeout { .. } | AgentError::ToolFailed { .. } | AgentError::UnknownTool(_) | AgentError::ToolInputInvalid { .. } => e,
                other => AgentError::ToolFailed {
                    tool: name.to_string(),
                    message: other.to_string(),
                },
            })?;
        Ok((outputs, tool.ends_agent_step()))
    }

    /// Appends a tool result, applying the tool-as-media rewrite (spec §9):
    /// a `media` output becomes a `user`-role file message instead of a
    /// `tool` message.
    fn append_tool_result(
        &self,
        state: &mut AgentState,
        tool_call_id: &str,
        tool_name: &str,
        outputs: Vec<ToolOutputPart>,
    ) {
        let has_media = outputs.iter().any(|o| matches!(o, ToolOutputPart::Media { .. }));
        if has_media {
            let parts = outputs
                .into_iter()
                .map(|o| match o {
                    ToolOutputPart::Media { data, mime_type } => UserPart::File {
                        name: tool_name.to_string(),
                        data,
                        mime_type,
                    },
                    ToolOutputPart::Json(v) => UserPart::Text(v.to_string()),
                })
                .collect();
            if let Ok(msg) = Message::user_parts(parts, now_ms()) {
                state.message_history.push(msg.with_tag(tags::AGENT_STEP_EPHEMERAL));
            }
        } else {
            state.message_history.push(
                Message::tool(tool_call_id, tool_name, outputs, now_ms())
                    .with_tag(tags::AGENT_STEP_EPHEMERAL),
            );
        }
    }

    /// Runs the default generate/extract/execute cycle until termination or
    /// the step budget is exhausted (spec §4.4 step 6). Used for templates
    /// with no `stepHandler`; handler-driven templates call
    /// [`StepLoop::run_step_once`] directly per directive instead.
    ///
    /// Always returns the agent's state, even on failure or cancellation, so
    /// the Session Orchestrator can preserve partial work (spec §4.7 step 4).
    pub async fn run_to_completion(
        &self,
        template: &AgentTemplate,
        mut state: AgentState,
    ) -> (AgentState, Result<(), AgentError>) {
        if self.events.start(state.agent_id.clone()).await.is_err() {
            state.output = Some(AgentOutput::Error(AgentError::Cancelled.to_string()));
            return (state, Err(AgentError::Cancelled));
        }

        if let Some(handler) = template.step_handler.clone() {
            return self.run_with_handler(template, state, handler).await;
        }

        loop {
            if state.steps_run >= template.max_agent_steps {
                state.message_history.push(Message::tool(
                    "step-limit",
                    "__engine__",
                    vec![ToolOutputPart::Json(serde_json::json!({
                        "error": "STEP_LIMIT",
                        "message": "agent exceeded its step budget",
                    }))],
                    now_ms(),
                ));
                state.output = Some(self.shape_output(template, &state));
                self.events.finish(state.agent_id.clone()).await.ok();
                return (state, Ok(()));
            }

            let outcome = self.run_step_once(template, &mut state).await;
            state.steps_run += 1;
            match outcome {
                Ok(outcome) if outcome.terminated => {
                    state.output = Some(self.shape_output(template, &state));
                    self.events.finish(state.agent_id.clone()).await.ok();
                    return (state, Ok(()));
                }
                Ok(_) => continue,
                Err(e) => {
                    self.events.error(state.agent_id.clone(), e.to_string()).await.ok();
                    state.output = Some(AgentOutput::Error(e.to_string()));
                    return (state, Err(e));
                }
            }
        }
    }

    /// Convenience wrapper over [`StepLoop::run_to_completion`] for callers
    /// (the Spawner) that only need the final state on success.
    pub async fn run_to_completion_result(
        &self,
        template: &AgentTemplate,
        state: AgentState,
    ) -> Result<AgentState, AgentError> {
        let (state, result) = self.run_to_completion(template, state).await;
        result.map(|()| state)
    }

    /// Drives a `stepHandler`-bearing template (spec §4.3, §4.4 step 5's
    /// override: "if the template defines a step handler, termination is
    /// governed by the handler, not this rule"). The handler's directives
    /// are executed by [`StepLoop::execute_directive`]; the handler's own
    /// return, not the default no-tool-calls rule, ends the agent.
    async fn run_with_handler(
        &self,
        template: &AgentTemplate,
        state: AgentState,
        handler: Arc<dyn StepHandlerFactory>,
    ) -> (AgentState, Result<(), AgentError>) {
        let state = Arc::new(tokio::sync::Mutex::new(state));

        let result = {
            let step_loop = self.clone();
            let template = template.clone();
            let state = state.clone();
            drive(handler, move |directive| {
                let step_loop = step_loop.clone();
                let template = template.clone();
                let state = state.clone();
                Box::pin(async move { step_loop.execute_directive(&template, &state, directive).await })
            })
            .await
        };

        let mut state = match Arc::try_unwrap(state) {
            Ok(mutex) => mutex.into_inner(),
            Err(shared) => shared.lock().await.clone(),
        };

        match result {
            Ok(()) => {
                state.output = Some(self.shape_output(template, &state));
                self.events.finish(state.agent_id.clone()).await.ok();
                (state, Ok(()))
            }
            Err(e) => {
                self.events.error(state.agent_id.clone(), e.to_string()).await.ok();
                state.output = Some(AgentOutput::Error(e.to_string()));
                (state, Err(e))
            }
        }
    }

    /// Executes one directive yielded by a step handler (spec §4.3): `Step`/
    /// `StepAll`/`GenerateN` delegate to the Agent Step Loop, `ToolCall`
    /// invokes the tool gate directly without a model call.
    async fn execute_directive(
        &self,
        template: &AgentTemplate,
        state: &tokio::sync::Mutex<AgentState>,
        directive: Directive,
    ) -> Result<ResumeValue, AgentError> {
        match directive {
            Directive::Step => {
                let mut guard = state.lock().await;
                self.run_step_once(template, &mut guard).await?;
                guard.steps_run += 1;
                Ok(ResumeValue {
                    agent_state: guard.clone(),
                    tool_result: None,
                    steps_complete: 1,
                    n_responses: None,
                })
            }
            Directive::StepAll => {
                let mut guard = state.lock().await;
                let mut steps_complete = 0;
                loop {
                    if guard.steps_run >= template.max_agent_steps {
                        break;
                    }
                    let outcome = self.run_step_once(template, &mut guard).await?;
                    guard.steps_run += 1;
                    steps_complete += 1;
                    if outcome.terminated {
                        break;
                    }
                }
                Ok(ResumeValue {
                    agent_state: guard.clone(),
                    tool_result: None,
                    steps_complete,
                    n_responses: None,
                })
            }
            Directive::StepText(text) => {
                let mut guard = state.lock().await;
                self.clear_prior_tag(&mut guard, tags::LAST_ASSISTANT_MESSAGE);
                guard
                    .message_history
                    .push(Message::assistant(text, now_ms()).with_tag(tags::LAST_ASSISTANT_MESSAGE));
                guard.steps_run += 1;
                Ok(ResumeValue {
                    agent_state: guard.clone(),
                    tool_result: None,
                    steps_complete: 1,
                    n_responses: None,
                })
            }
            Directive::GenerateN(n) => {
                let prompt = {
                    let guard = state.lock().await;
                    self.compose_prompt(template, &guard)
                };
                let tool_specs = template
                    .tool_names
                    .iter()
                    .filter_map(|name| self.registry.resolve(name).ok())
                    .map(|t| t.spec())
                    .collect::<Vec<_>>();
                let mut request = GenerateRequest::new(template.model.clone(), prompt, tool_specs);
                request.n = n;
                let responses = self.llm.generate_n(request).await?;
                let total: u64 = responses.iter().map(|r| r.usage.total()).sum();
                let mut guard = state.lock().await;
                guard.record_direct_usage(total);
                Ok(ResumeValue {
                    agent_state: guard.clone(),
                    tool_result: None,
                    steps_complete: 0,
                    n_responses: Some(responses),
                })
            }
            Directive::ToolCall {
                name,
                input,
                include_tool_call,
            } => {
                let mut guard = state.lock().await;
                let agent_id = guard.agent_id.clone();
                let tool_call_id = Uuid::new_v4().to_string();
                let (outputs, _ends) =
                    Self::execute_one_tool(self.registry.clone(), self.transport.clone(), &agent_id, &tool_call_id, &name, &input)
                        .await?;
                if include_tool_call {
                    self.append_tool_result(&mut guard, &tool_call_id, &name, outputs.clone());
                }
                Ok(ResumeValue {
                    agent_state: guard.clone(),
                    tool_result: Some(outputs),
                    steps_complete: 0,
                    n_responses: None,
                })
            }
        }
    }

    fn shape_output(&self, template: &AgentTemplate, state: &AgentState) -> AgentOutput {
        match template.output_mode {
            OutputMode::LastMessage => {
                let last_assistant = state.message_history.iter().rev().find_map(|m| match m {
                    Message::Assistant { parts, .. } => Some(parts.clone()),
                    _ => None,
                });
                AgentOutput::LastMessage(last_assistant.unwrap_or_default())
            }
            OutputMode::AllMessages => AgentOutput::AllMessages(
                state
                    .message_history
                    .iter()
                    .filter(|m| !matches!(m, Message::System { .. }))
                    .cloned()
                    .collect(),
            ),
            OutputMode::StructuredOutput => match &state.output {
                Some(AgentOutput::StructuredOutput(v)) => AgentOutput::StructuredOutput(v.clone()),
                _ => AgentOutput::StructuredOutput(serde_json::Value::Null),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmUsage, MockLlm};
    use crate::tools::extractor::NullExtractor;
    use crate::tools::ToolRegistry;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct NoopTransport;

    #[async_trait]
    impl ClientToolTransport for NoopTransport {
        async fn call(
            &self,
            _request_id: &str,
            _tool_name: &str,
            _input: &serde_json::Value,
            _timeout_seconds: i64,
        ) -> Result<Vec<ToolOutputPart>, AgentError> {
            Ok(vec![])
        }
    }

    fn harness(responses: Vec<&str>) -> (StepLoop, crate::event::EventStreamHandle) {
        let (events, handle) = crate::event::channel(16, CancellationToken::new());
        let step_loop = StepLoop {
            llm: Arc::new(MockLlm::text_only(responses)),
            registry: Arc::new(ToolRegistry::new()),
            extractor: Arc::new(NullExtractor),
            transport: Arc::new(NoopTransport),
            events,
        };
        (step_loop, handle)
    }

    /// Mirrors S1: a plain text reply with no tool calls terminates in one step.
    #[tokio::test]
    async fn simple_text_reply_terminates_after_one_step() {
        let (step_loop, _handle) = harness(vec!["hello"]);
        let template = AgentTemplate::simple("root", "test-model", 10);
        let state = AgentState::new("a1", "root");
        let (state, result) = step_loop.run_to_completion(&template, state).await;
        result.unwrap();
        assert_eq!(state.steps_run, 1);
        assert!(matches!(state.output, Some(AgentOutput::LastMessage(_))));
    }

    #[tokio::test]
    async fn step_limit_terminates_with_synthetic_tool_message() {
        let (step_loop, _handle) = harness(vec!["a", "b", "c"]);
        let mut template = AgentTemplate::simple("root", "test-model", 10);
        template.max_agent_steps = 0;
        let state = AgentState::new("a1", "root");
        let (state, result) = step_loop.run_to_completion(&template, state).await;
        result.unwrap();
        assert!(state
            .message_history
            .iter()
            .any(|m| matches!(m, Message::Tool { tool_name, .. } if tool_name == "__engine__")));
    }

    #[tokio::test]
    async fn usage_accumulates_into_credits_used() {
        let mut mock_responses = vec![LlmResponse {
            parts: vec![ResponsePart::Text("hi".into())],
            usage: LlmUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        }];
        let llm = MockLlm::new(std::mem::take(&mut mock_responses));
        let (events, _handle) = crate::event::channel(16, CancellationToken::new());
        let step_loop = StepLoop {
            llm: Arc::new(llm),
            registry: Arc::new(ToolRegistry::new()),
            extractor: Arc::new(NullExtractor),
            transport: Arc::new(NoopTransport),
            events,
        };
        let template = AgentTemplate::simple("root", "test-model", 10);
        let state = AgentState::new("a1", "root");
        let (state, result) = step_loop.run_to_completion(&template, state).await;
        result.unwrap();
        assert_eq!(state.direct_credits_used, 15);
    }

    struct FixedTextHandler;

    #[async_trait]
    impl StepHandlerFactory for FixedTextHandler {
        async fn run(&self, mut handle: crate::agent::step_handler::HandlerHandle) -> Result<(), AgentError> {
            handle
                .yield_directive(Directive::StepText("handler reply".into()))
                .await;
            Ok(())
        }
    }

    /// A template with `step_handler` set must never reach the default
    /// generate/extract/execute cycle: the harness's model script is empty,
    /// so a fall-through to the default loop would fail immediately.
    #[tokio::test]
    async fn template_with_step_handler_bypasses_default_cycle() {
        let (step_loop, _handle) = harness(vec![]);
        let mut template = AgentTemplate::simple("root", "test-model", 10);
        template.step_handler = Some(Arc::new(FixedTextHandler));
        let state = AgentState::new("a1", "root");
        let (state, result) = step_loop.run_to_completion(&template, state).await;
        result.unwrap();
        assert_eq!(state.steps_run, 1);
        assert_eq!(state.message_history.last().unwrap().flatten_text(), "handler reply");
    }

    struct ToolCallThenReturnHandler;

    #[async_trait]
    impl StepHandlerFactory for ToolCallThenReturnHandler {
        async fn run(&self, mut handle: crate::agent::step_handler::HandlerHandle) -> Result<(), AgentError> {
            let resume = handle
                .yield_directive(Directive::ToolCall {
                    name: "echo".into(),
                    input: serde_json::json!({"text": "hi"}),
                    include_tool_call: true,
                })
                .await
                .ok_or_else(|| AgentError::HandlerFault("driver closed".into()))?;
            assert!(resume.tool_result.is_some());
            Ok(())
        }
    }

    struct EchoTool;

    #[async_trait]
    impl crate::tools::Tool for EchoTool {
        fn spec(&self) -> crate::tools::ToolSpec {
            crate::tools::ToolSpec {
                name: "echo".into(),
                description: "echoes input".into(),
                input_schema: serde_json::json!({"type": "object"}),
            }
        }

        fn ends_agent_step(&self) -> bool {
            true
        }

        async fn call(
            &self,
            input: serde_json::Value,
            _ctx: &ToolCallContext,
        ) -> Result<Vec<ToolOutputPart>, AgentError> {
            Ok(vec![ToolOutputPart::Json(input)])
        }
    }

    /// `TOOL_CALL` directives invoke the tool gate directly, with no model
    /// call and no `stepsRun` increment (spec §4.3, §3).
    #[tokio::test]
    async fn tool_call_directive_records_result_without_a_model_call() {
        let (events, _handle) = crate::event::channel(16, CancellationToken::new());
        let step_loop = StepLoop {
            llm: Arc::new(MockLlm::text_only(vec![])),
            registry: Arc::new(ToolRegistry::with_tools(vec![Arc::new(EchoTool)])),
            extractor: Arc::new(NullExtractor),
            transport: Arc::new(NoopTransport),
            events,
        };
        let mut template = AgentTemplate::simple("root", "test-model", 10);
        template.step_handler = Some(Arc::new(ToolCallThenReturnHandler));
        let state = AgentState::new("a1", "root");
        let (state, result) = step_loop.run_to_completion(&template, state).await;
        result.unwrap();
        assert_eq!(state.steps_run, 0);
        assert!(state
            .message_history
            .iter()
            .any(|m| matches!(m, Message::Tool { tool_name, .. } if tool_name == "echo")));
    }
}
