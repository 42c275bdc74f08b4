//! Wire-level progress events emitted onto a session's event stream (spec §4.6).
//!
//! Each variant carries the emitting `agent_id`; subagent variants also carry
//! `parent_agent_id`. State-carrying payloads use `serde_json::Value` so this
//! crate has no dependency on any particular agent-state shape.

use serde::Serialize;
use serde_json::Value;

/// One event on the session's ordered progress stream.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    Start {
        agent_id: String,
    },
    Finish {
        agent_id: String,
    },
    Error {
        agent_id: String,
        message: String,
    },
    Text {
        agent_id: String,
        text: String,
    },
    ReasoningDelta {
        agent_id: String,
        delta: String,
    },
    ToolCall {
        agent_id: String,
        tool_call_id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        agent_id: String,
        tool_call_id: String,
        is_error: bool,
        output: Value,
    },
    SubagentStart {
        agent_id: String,
        parent_agent_id: String,
        agent_type: String,
    },
    SubagentFinish {
        agent_id: String,
        parent_agent_id: String,
    },
    ResponseChunk {
        agent_id: String,
        chunk: String,
    },
    Download {
        agent_id: String,
        url: String,
    },
}

impl ProtocolEvent {
    /// Serializes this event to a JSON object (type + payload only; no envelope).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// The agent id every variant carries, used for ordering checks in tests.
    pub fn agent_id(&self) -> &str {
        match self {
            ProtocolEvent::Start { agent_id }
            | ProtocolEvent::Finish { agent_id }
            | ProtocolEvent::Error { agent_id, .. }
            | ProtocolEvent::Text { agent_id, .. }
            | ProtocolEvent::ReasoningDelta { agent_id, .. }
            | ProtocolEvent::ToolCall { agent_id, .. }
            | ProtocolEvent::ToolResult { agent_id, .. }
            | ProtocolEvent::SubagentStart { agent_id, .. }
            | ProtocolEvent::SubagentFinish { agent_id, .. }
            | ProtocolEvent::ResponseChunk { agent_id, .. }
            | ProtocolEvent::Download { agent_id, .. } => agent_id,
        }
    }
}
