//! Agent, session, and template data model (spec §3). Grounded on the
//! teacher's `ReActState` (messages + usage counters + turn tracking),
//! generalized to the spec's multi-agent shape.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::agent::step_handler::StepHandlerFactory;
use crate::message::Message;

/// How a child agent's output is shaped for its parent (spec §3, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    LastMessage,
    AllMessages,
    StructuredOutput,
}

/// The shaped value produced when an agent terminates (spec §4.5, §6).
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutput {
    LastMessage(Vec<crate::message::AssistantPart>),
    AllMessages(Vec<Message>),
    StructuredOutput(Value),
    Error(String),
}

/// Read-only agent definition (spec §3). `step_handler`, if present, makes
/// this agent's steps driven by the Step Handler Driver (§4.3) rather than
/// the default generate/extract/execute cycle.
#[derive(Clone)]
pub struct AgentTemplate {
    pub id: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub instructions_prompt: Option<String>,
    pub step_prompt: Option<String>,
    pub tool_names: Vec<String>,
    pub spawnable_agent_ids: Vec<String>,
    pub input_schema: Value,
    pub output_mode: OutputMode,
    pub output_schema: Option<Value>,
    pub include_message_history: bool,
    pub inherit_parent_system_prompt: bool,
    pub max_agent_steps: u32,
    pub step_handler: Option<Arc<dyn StepHandlerFactory>>,
}

impl AgentTemplate {
    pub fn simple(id: impl Into<String>, model: impl Into<String>, max_agent_steps: u32) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            system_prompt: None,
            instructions_prompt: None,
            step_prompt: None,
            tool_names: Vec::new(),
            spawnable_agent_ids: Vec::new(),
            input_schema: Value::Object(Default::default()),
            output_mode: OutputMode::LastMessage,
            output_schema: None,
            include_message_history: false,
            inherit_parent_system_prompt: false,
            max_agent_steps,
            step_handler: None,
        }
    }
}

/// One live agent's mutable state (spec §3). Owned by the Agent Step Loop
/// running it; all other readers must snapshot (spec §5).
#[derive(Debug, Clone, PartialEq)]
pub struct AgentState {
    pub agent_id: String,
    pub parent_id: Option<String>,
    pub agent_type: String,
    pub message_history: Vec<Message>,
    pub credits_used: u64,
    pub direct_credits_used: u64,
    pub child_agent_ids: Vec<String>,
    pub output: Option<AgentOutput>,
    pub steps_run: u32,
}

impl AgentState {
    pub fn new(agent_id: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            parent_id: None,
            agent_type: agent_type.into(),
            message_history: Vec::new(),
            credits_used: 0,
            direct_credits_used: 0,
            child_agent_ids: Vec::new(),
            output: None,
            steps_run: 0,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Rolls a model call's usage into this agent's own counter and, for the
    /// agent itself, into `credits_used` (children roll up separately via
    /// the Spawner on completion, per SPEC_FULL.md's usage-tracking note).
    pub fn record_direct_usage(&mut self, tokens: u64) {
        self.direct_credits_used += tokens;
        self.credits_used += tokens;
    }

    /// Rolls up a finished child's total usage into this (parent) agent.
    pub fn record_child_usage(&mut self, child_credits_used: u64) {
        self.credits_used += child_credits_used;
    }
}

/// Owns one session: the root agent, all subagents by id, and shared file
/// context (spec §3). Subagents are looked up by id to support out-of-order
/// finish events (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub main_agent_state: AgentState,
    pub subagents_by_id: HashMap<String, AgentState>,
    pub file_context: Value,
}

impl SessionState {
    pub fn new(main_agent_state: AgentState) -> Self {
        Self {
            main_agent_state,
            subagents_by_id: HashMap::new(),
            file_context: Value::Object(Default::default()),
        }
    }

    /// Inserts or replaces a subagent's state, append-only with respect to
    /// new ids during a run (spec §5).
    pub fn upsert_subagent(&mut self, state: AgentState) {
        self.subagents_by_id.insert(state.agent_id.clone(), state);
    }

    pub fn agent_state(&self, agent_id: &str) -> Option<&AgentState> {
        if self.main_agent_state.agent_id == agent_id {
            Some(&self.main_agent_state)
        } else {
            self.subagents_by_id.get(agent_id)
        }
    }
}

/// Directive yielded by a step handler (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Step,
    StepAll,
    StepText(String),
    GenerateN(usize),
    ToolCall {
        name: String,
        input: Value,
        include_tool_call: bool,
    },
}

/// Resume value handed back to a step handler after executing its directive
/// (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeValue {
    pub agent_state: AgentState,
    pub tool_result: Option<Vec<crate::message::ToolOutputPart>>,
    pub steps_complete: u32,
    pub n_responses: Option<Vec<crate::llm::LlmResponse>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_agent_state_has_no_output_and_zero_usage() {
        let state = AgentState::new("a1", "root");
        assert!(state.output.is_none());
        assert_eq!(state.credits_used, 0);
        assert_eq!(state.steps_run, 0);
    }

    #[test]
    fn child_usage_rolls_up_without_touching_direct_usage() {
        let mut parent = AgentState::new("a1", "root");
        parent.record_direct_usage(100);
        parent.record_child_usage(50);
        assert_eq!(parent.direct_credits_used, 100);
        assert_eq!(parent.credits_used, 150);
    }

    #[test]
    fn session_state_looks_up_main_and_subagents_by_id() {
        let mut session = SessionState::new(AgentState::new("root", "main"));
        session.upsert_subagent(AgentState::new("child-1", "worker"));
        assert!(session.agent_state("root").is_some());
        assert!(session.agent_state("child-1").is_some());
        assert!(session.agent_state("missing").is_none());
    }
}
