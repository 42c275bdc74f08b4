//! Subagent Spawner (spec §4.5). Grounded on the teacher's single-child
//! `AgentTool` delegation pattern (`loom/src/agent/react/agent_tool.rs`),
//! generalized to N-way concurrent fan-out with order-preserving results.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use uuid::Uuid;

use crate::agent::state::{AgentOutput, AgentState, AgentTemplate};
use crate::agent::step_loop::StepLoop;
use crate::error::AgentError;
use crate::message::{tags, Message};
use crate::tools::registry::validate_against_schema;

/// One entry of a `spawn_agents(agents[])` call (spec §4.5).
#[derive(Debug, Clone)]
pub struct SpawnEntry {
    pub agent_type: String,
    pub prompt: Option<String>,
    pub params: Option<Value>,
}

/// A structured per-child failure, captured in that child's result slot
/// without affecting sibling success (spec §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnError {
    pub agent_type: String,
    pub message: String,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Runs `spawn_agents` fan-out and the `spawn_agent_inline` compatibility
/// stub (spec §4.5, §9 open question 3).
pub struct Spawner {
    pub step_loop: StepLoop,
    pub templates: Arc<HashMap<String, AgentTemplate>>,
}

impl Spawner {
    /// Runs every entry concurrently; results land in entry order regardless
    /// of finish order, since `join_all` preserves the order of the futures
    /// it was given rather than completion order (spec §4.5, testable
    /// property 4).
    pub async fn spawn_agents(
        &self,
        parent: &mut AgentState,
        parent_template: &AgentTemplate,
        entries: Vec<SpawnEntry>,
    ) -> Vec<Result<AgentOutput, SpawnError>> {
        let futures = entries.into_iter().map(|entry| {
            let step_loop = self.step_loop.clone();
            let templates = self.templates.clone();
            let spawnable = parent_template.spawnable_agent_ids.clone();
            let include_history = parent_template.include_message_history;
            let parent_history = parent.message_history.clone();
            let parent_id = parent.agent_id.clone();
            async move {
                spawn_one(step_loop, templates, spawnable, include_history, parent_history, parent_id, entry).await
            }
        });

        let results = join_all(futures).await;

        let mut child_credits = 0u64;
        let mut outputs = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok((child_state, output)) => {
                    child_credits += child_state.credits_used;
                    parent.child_agent_ids.push(child_state.agent_id.clone());
                    outputs.push(Ok(output));
                }
                Err(e) => outputs.push(Err(e)),
            }
        }
        parent.record_child_usage(child_credits);
        outputs
    }

    /// Compatibility stub for `spawn_agent_inline` (spec §9 open question 3):
    /// runs a single child and splices its final message history in place of
    /// the parent's, rather than a fully separate mutate-in-place code path.
    pub async fn spawn_agent_inline(
        &self,
        parent: &mut AgentState,
        parent_template: &AgentTemplate,
        entry: SpawnEntry,
    ) -> Result<(), SpawnError> {
        let (child_state, _output) = spawn_one(
            self.step_loop.clone(),
            self.templates.clone(),
            parent_template.spawnable_agent_ids.clone(),
            true,
            parent.message_history.clone(),
            parent.agent_id.clone(),
            entry,
        )
        .await?;
        parent.message_history = child_state.message_history;
        parent.record_child_usage(child_state.direct_credits_used);
        Ok(())
    }
}

async fn spawn_one(
    step_loop: StepLoop,
    templates: Arc<HashMap<String, AgentTemplate>>,
    spawnable: Vec<String>,
    include_history: bool,
    parent_history: Vec<Message>,
    parent_id: String,
    entry: SpawnEntry,
) -> Result<(AgentState, AgentOutput), SpawnError> {
    if !spawnable.iter().any(|id| id == &entry.agent_type) {
        return Err(SpawnError {
            agent_type: entry.agent_type.clone(),
            message: AgentError::UnspawnableAgent(entry.agent_type.clone()).to_string(),
        });
    }
    let template = templates.get(&entry.agent_type).cloned().ok_or_else(|| SpawnError {
        agent_type: entry.agent_type.clone(),
        message: AgentError::UnspawnableAgent(entry.agent_type.clone()).to_string(),
    })?;

    if let Some(params) = &entry.params {
        validate_against_schema(&entry.agent_type, &template.input_schema, params).map_err(|e| SpawnError {
            agent_type: entry.agent_type.clone(),
            message: e.to_string(),
        })?;
    }

    let child_id = Uuid::new_v4().to_string();
    if let Err(e) = step_loop
        .events
        .subagent_start(child_id.clone(), parent_id.clone(), entry.agent_type.clone())
        .await
    {
        return Err(SpawnError {
            agent_type: entry.agent_type.clone(),
            message: e.to_string(),
        });
    }
    let mut state = AgentState::new(child_id.clone(), entry.agent_type.clone()).with_parent(parent_id.clone());

    if include_history {
        state.message_history = parent_history;
    } else {
        if template.inherit_parent_system_prompt {
            if let Some(first) = parent_history.first() {
                if matches!(first, Message::System { .. }) {
                    state.message_history.push(first.clone());
                }
            }
        } else if let Some(system) = &template.system_prompt {
            state.message_history.push(Message::system(system.clone(), now_ms()));
        }
        if let Some(instructions) = &template.instructions_prompt {
            state.message_history.push(Message::user(instructions.clone(), now_ms()));
        }
        let prompt_text = render_params(entry.prompt.clone().unwrap_or_default(), entry.params.as_ref());
        state
            .message_history
            .push(Message::user(prompt_text, now_ms()).with_tag(tags::USER_PROMPT));
    }

    let result = step_loop.run_to_completion_result(&template, state).await;
    step_loop.events.subagent_finish(child_id, parent_id).await.ok();

    let final_state = result.map_err(|e| SpawnError {
        agent_type: entry.agent_type.clone(),
        message: e.to_string(),
    })?;

    let output = final_state
        .output
        .clone()
        .unwrap_or(AgentOutput::Error("agent produced no output".to_string()));
    Ok((final_state, output))
}

/// Renders `{{param}}`-style placeholders in `prompt` from `params` (spec
/// §4.5 step 4: "user(prompt) with params rendered").
fn render_params(prompt: String, params: Option<&Value>) -> String {
    let Some(Value::Object(map)) = params else {
        return prompt;
    };
    let mut rendered = prompt;
    for (key, value) in map {
        let placeholder = format!("{{{{{key}}}}}");
        let replacement = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        rendered = rendered.replace(&placeholder, &replacement);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::OutputMode;
    use crate::event;
    use crate::llm::MockLlm;
    use crate::tools::extractor::NullExtractor;
    use crate::tools::ToolRegistry;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct NoopTransport;

    #[async_trait]
    impl crate::tools::ClientToolTransport for NoopTransport {
        async fn call(
            &self,
            _request_id: &str,
            _tool_name: &str,
            _input: &Value,
            _timeout_seconds: i64,
        ) -> Result<Vec<crate::message::ToolOutputPart>, AgentError> {
            Ok(vec![])
        }
    }

    fn make_spawner(replies: Vec<&str>, spawnable: &str) -> (Spawner, AgentTemplate) {
        let (events, _handle) = event::channel(16, CancellationToken::new());
        let step_loop = StepLoop {
            llm: Arc::new(MockLlm::text_only(replies)),
            registry: Arc::new(ToolRegistry::new()),
            extractor: Arc::new(NullExtractor),
            transport: Arc::new(NoopTransport),
            events,
        };
        let mut templates = HashMap::new();
        templates.insert(
            spawnable.to_string(),
            AgentTemplate::simple(spawnable, "test-model", 5),
        );
        let mut parent_template = AgentTemplate::simple("parent", "test-model", 5);
        parent_template.spawnable_agent_ids = vec![spawnable.to_string()];
        (
            Spawner {
                step_loop,
                templates: Arc::new(templates),
            },
            parent_template,
        )
    }

    #[tokio::test]
    async fn fan_out_preserves_entry_order_regardless_of_content() {
        let (spawner, parent_template) = make_spawner(vec!["A-done", "B-done", "C-done"], "worker");
        let mut parent = AgentState::new("parent-1", "parent");
        let entries = vec![
            SpawnEntry {
                agent_type: "worker".into(),
                prompt: Some("task A".into()),
                params: None,
            },
            SpawnEntry {
                agent_type: "worker".into(),
                prompt: Some("task B".into()),
                params: None,
            },
            SpawnEntry {
                agent_type: "worker".into(),
                prompt: Some("task C".into()),
                params: None,
            },
        ];
        let results = spawner.spawn_agents(&mut parent, &parent_template, entries).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(parent.child_agent_ids.len(), 3);
    }

    /// Mirrors S3's event expectation: three children produce three
    /// `subagent_start` and three `subagent_finish` events, each carrying
    /// the parent's agent id.
    #[tokio::test]
    async fn fan_out_emits_subagent_start_and_finish_per_child() {
        let (events, mut handle) = event::channel(32, CancellationToken::new());
        let step_loop = StepLoop {
            llm: Arc::new(MockLlm::text_only(vec!["A-done", "B-done", "C-done"])),
            registry: Arc::new(ToolRegistry::new()),
            extractor: Arc::new(NullExtractor),
            transport: Arc::new(NoopTransport),
            events,
        };
        let mut templates = HashMap::new();
        templates.insert("worker".to_string(), AgentTemplate::simple("worker", "test-model", 5));
        let mut parent_template = AgentTemplate::simple("parent", "test-model", 5);
        parent_template.spawnable_agent_ids = vec!["worker".into()];
        let spawner = Spawner {
            step_loop,
            templates: Arc::new(templates),
        };
        let mut parent = AgentState::new("parent-1", "parent");
        let entries = (0..3)
            .map(|i| SpawnEntry {
                agent_type: "worker".into(),
                prompt: Some(format!("task {i}")),
                params: None,
            })
            .collect();
        let results = spawner.spawn_agents(&mut parent, &parent_template, entries).await;
        assert!(results.iter().all(|r| r.is_ok()));

        drop(spawner);
        let mut starts = 0;
        let mut finishes = 0;
        while let Some(event) = handle.recv().await {
            match event {
                skein_stream::ProtocolEvent::SubagentStart { parent_agent_id, .. } => {
                    assert_eq!(parent_agent_id, "parent-1");
                    starts += 1;
                }
                skein_stream::ProtocolEvent::SubagentFinish { parent_agent_id, .. } => {
                    assert_eq!(parent_agent_id, "parent-1");
                    finishes += 1;
                }
                _ => {}
            }
        }
        assert_eq!(starts, 3);
        assert_eq!(finishes, 3);
    }

    #[tokio::test]
    async fn unspawnable_agent_type_is_captured_per_slot() {
        let (spawner, parent_template) = make_spawner(vec!["ok"], "worker");
        let mut parent = AgentState::new("parent-1", "parent");
        let entries = vec![SpawnEntry {
            agent_type: "not-allowed".into(),
            prompt: Some("x".into()),
            params: None,
        }];
        let results = spawner.spawn_agents(&mut parent, &parent_template, entries).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
        assert!(parent.child_agent_ids.is_empty());
    }

    #[tokio::test]
    async fn output_mode_all_messages_excludes_system_prompt() {
        let (spawner, mut parent_template) = make_spawner(vec!["child reply"], "worker");
        parent_template.spawnable_agent_ids = vec!["worker".into()];
        let mut parent = AgentState::new("parent-1", "parent");
        let mut templates = (*spawner.templates).clone();
        if let Some(t) = templates.get_mut("worker") {
            t.output_mode = OutputMode::AllMessages;
            t.system_prompt = Some("be terse".into());
        }
        let spawner = Spawner {
            step_loop: spawner.step_loop,
            templates: Arc::new(templates),
        };
        let entries = vec![SpawnEntry {
            agent_type: "worker".into(),
            prompt: Some("go".into()),
            params: None,
        }];
        let results = spawner.spawn_agents(&mut parent, &parent_template, entries).await;
        match &results[0] {
            Ok(AgentOutput::AllMessages(messages)) => {
                assert!(!messages.iter().any(|m| matches!(m, Message::System { .. })));
            }
            other => panic!("expected AllMessages output, got {other:?}"),
        }
    }
}
