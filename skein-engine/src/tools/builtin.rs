//! Default bookkeeping tools (spec §4.4's continuation-forcing list, §9's
//! "set_output is a hidden terminal tool"). These are the only tool
//! handlers this crate implements concretely — everything else named in
//! spec §1 (filesystem tools, shell, web, etc.) stays an opaque
//! `ToolHandler(input)->output` the embedding binary registers itself.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::AgentError;
use crate::message::ToolOutputPart;
use crate::tools::{Tool, ToolCallContext, ToolSpec};

/// A bookkeeping tool that accepts any input, echoes it back as its result,
/// and never ends the agent step by itself — termination for these names is
/// decided by the step loop's continuation-forcing rule, not by the tool.
pub struct AckTool {
    spec: ToolSpec,
}

impl AckTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            spec: ToolSpec {
                name: name.into(),
                description: description.into(),
                input_schema: json!({ "type": "object" }),
            },
        }
    }
}

#[async_trait]
impl Tool for AckTool {
    fn spec(&self) -> ToolSpec {
        self.spec.clone()
    }

    fn ends_agent_step(&self) -> bool {
        false
    }

    async fn call(&self, input: Value, _ctx: &ToolCallContext) -> Result<Vec<ToolOutputPart>, AgentError> {
        Ok(vec![ToolOutputPart::Json(json!({ "acknowledged": input }))])
    }
}

/// `set_output(value)`: the hidden terminal tool (spec §9) that sets an
/// agent's structured output. Its own `call` just echoes `value` back as the
/// tool result; [`crate::agent::step_loop::StepLoop`] recognizes this tool
/// by name after execution and copies `value` into `AgentState.output`,
/// since a [`Tool`] has no mutable access to the calling agent's state.
pub struct SetOutputTool;

pub const SET_OUTPUT_TOOL_NAME: &str = "set_output";

#[async_trait]
impl Tool for SetOutputTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: SET_OUTPUT_TOOL_NAME.to_string(),
            description: "Sets this agent's final structured output.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": { "value": {} },
                "required": ["value"],
            }),
        }
    }

    fn ends_agent_step(&self) -> bool {
        false
    }

    async fn call(&self, input: Value, _ctx: &ToolCallContext) -> Result<Vec<ToolOutputPart>, AgentError> {
        Ok(vec![ToolOutputPart::Json(input)])
    }
}

/// Registers the full continuation-forcing bookkeeping set plus `set_output`
/// on `registry`. Callers that want a stricter tool surface can register a
/// subset directly instead of calling this.
pub fn register_builtin_tools(registry: &mut crate::tools::ToolRegistry) {
    use std::sync::Arc;
    registry.register(Arc::new(SetOutputTool));
    registry.register(Arc::new(AckTool::new(
        "think_deeply",
        "Records private reasoning without producing visible output.",
    )));
    registry.register(Arc::new(AckTool::new(
        "set_messages",
        "Replaces the agent's retained message history.",
    )));
    registry.register(Arc::new(AckTool::new(
        "add_message",
        "Appends a message to the agent's history.",
    )));
    registry.register(Arc::new(AckTool::new(
        "suggest_followups",
        "Suggests follow-up prompts to the user.",
    )));
    registry.register(Arc::new(AckTool::new(
        "task_completed",
        "Marks the current task complete.",
    )));
    registry.register(Arc::new(AckTool::new(
        "write_todos",
        "Records the agent's current todo list.",
    )));
}
