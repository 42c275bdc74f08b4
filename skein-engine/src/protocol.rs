//! External interfaces (spec §6): the client-facing action types the
//! Session Orchestrator consumes and produces. The transport that carries
//! these (HTTP/WebSocket) is out of scope (spec §1); this module defines
//! only the wire shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::state::{AgentOutput, SessionState};
use crate::message::AssistantPart;

/// One action sent from the client to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientAction {
    Init {
        fingerprint_id: String,
        auth_token: Option<String>,
        file_context: Value,
        repo_url: Option<String>,
    },
    Prompt {
        prompt_id: String,
        prompt: Option<String>,
        content: Option<Value>,
        prompt_params: Option<Value>,
        fingerprint_id: String,
        session_state: Value,
        tool_results: Vec<ToolResultOutput>,
        model: Option<String>,
        repo_url: Option<String>,
        agent_id: Option<String>,
    },
    ToolCallResponse {
        request_id: String,
        output: Vec<ToolResultOutput>,
    },
    ReadFilesResponse {
        files: std::collections::HashMap<String, Option<String>>,
        request_id: Option<String>,
    },
    McpToolData {
        request_id: String,
        tools: Vec<Value>,
    },
    CancelUserInput {
        auth_token: String,
        prompt_id: String,
    },
}

/// One action sent from the engine to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EngineAction {
    ResponseChunk {
        user_input_id: String,
        chunk: Value,
    },
    SubagentResponseChunk {
        user_input_id: String,
        agent_id: String,
        agent_type: String,
        chunk: Value,
        prompt: Option<String>,
        forward_to_prompt: Option<bool>,
    },
    ToolCallRequest {
        user_input_id: String,
        request_id: String,
        tool_name: String,
        input: Value,
        timeout: Option<i64>,
        mcp_config: Option<Value>,
    },
    ReadFiles {
        file_paths: Vec<String>,
        request_id: String,
    },
    PromptResponse {
        prompt_id: String,
        session_state: Value,
        output: OutputShape,
    },
    PromptError {
        user_input_id: String,
        message: String,
        error: Option<String>,
        remaining_balance: Option<f64>,
    },
    RequestReconnect,
}

/// The wire representation of an `output: ToolResultOutput[]` answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolResultOutput {
    Json(Value),
    Media { data: String, mime_type: Option<String> },
}

/// The four shapes an agent's terminal output may take (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutputShape {
    LastMessage { value: Vec<AssistantPartWire> },
    AllMessages { value: Vec<crate::message::Message> },
    StructuredOutput { value: Value },
    Error { message: String },
}

/// Wire-serializable view of an `AssistantPart` (spec §6 `ContentPart[]`).
pub type AssistantPartWire = AssistantPart;

impl From<AgentOutput> for OutputShape {
    fn from(output: AgentOutput) -> Self {
        match output {
            AgentOutput::LastMessage(parts) => OutputShape::LastMessage { value: parts },
            AgentOutput::AllMessages(messages) => OutputShape::AllMessages { value: messages },
            AgentOutput::StructuredOutput(value) => OutputShape::StructuredOutput { value },
            AgentOutput::Error(message) => OutputShape::Error { message },
        }
    }
}

/// Result of one `Run` invocation (spec §4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub session_state: SessionState,
    pub output: OutputShape,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_output_converts_to_matching_output_shape() {
        let shape: OutputShape = AgentOutput::Error("boom".into()).into();
        assert_eq!(shape, OutputShape::Error { message: "boom".into() });
    }

    #[test]
    fn client_action_prompt_round_trips_through_json() {
        let action = ClientAction::CancelUserInput {
            auth_token: "t".into(),
            prompt_id: "p1".into(),
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["type"], "cancel-user-input");
    }
}
