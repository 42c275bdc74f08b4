//! Tool Registry & Gate (spec §4.2): resolves a tool name to its schema and
//! handler, and enforces file-access policy. Concrete tool handlers
//! themselves are out of scope (spec §1) — this module defines the contract
//! only.

pub mod builtin;
pub mod extractor;
pub mod gate;
pub mod registry;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AgentError;
use crate::message::ToolOutputPart;

pub use builtin::{register_builtin_tools, AckTool, SetOutputTool, SET_OUTPUT_TOOL_NAME};
pub use extractor::{ExtractedToolCall, NullExtractor, ToolCallExtractor};
pub use gate::{FileAccessDecision, FileFilter, FileGate, FileGateError};
pub use registry::ToolRegistry;

/// A tool's advertised name, description, and JSON Schema for `input`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Transport for client-side tools: the engine emits a request and awaits a
/// response correlated by `request_id` (spec §4.2). Implemented by the
/// embedding binary's transport layer, out of scope here.
#[async_trait]
pub trait ClientToolTransport: Send + Sync {
    async fn call(
        &self,
        request_id: &str,
        tool_name: &str,
        input: &Value,
        timeout_seconds: i64,
    ) -> Result<Vec<ToolOutputPart>, AgentError>;
}

/// Per-call context handed to a [`Tool`]: identifies the calling agent and
/// carries the client-side transport for tools that need it.
pub struct ToolCallContext {
    pub agent_id: String,
    pub tool_call_id: String,
    pub transport: std::sync::Arc<dyn ClientToolTransport>,
}

/// A resolved tool: schema plus handler plus scheduling metadata (spec §4.2, §4.4).
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    /// Whether a step with no other tool calls still terminates after this
    /// tool runs (spec §4.4 step 5). `false` for the non-terminating set:
    /// `think_deeply`, `set_output`, `set_messages`, `add_message`,
    /// `suggest_followups`, `task_completed`, `write_todos`, subgoal/plan tools.
    fn ends_agent_step(&self) -> bool;

    /// Client-side tools round-trip through the event stream; engine-side
    /// tools run synchronously in-process (spec §4.2).
    fn is_client_side(&self) -> bool {
        false
    }

    async fn call(
        &self,
        input: Value,
        ctx: &ToolCallContext,
    ) -> Result<Vec<ToolOutputPart>, AgentError>;
}

impl std::fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn Tool")
            .field("name", &self.spec().name)
            .finish()
    }
}

/// A client-side tool backed by [`ClientToolTransport`], round-tripping
/// through the event stream with a configurable timeout (spec §4.2, §5).
pub struct ClientSideTool {
    spec: ToolSpec,
    ends_agent_step: bool,
    timeout_seconds: i64,
}

impl ClientSideTool {
    pub fn new(spec: ToolSpec, ends_agent_step: bool, timeout_seconds: i64) -> Self {
        Self {
            spec,
            ends_agent_step,
            timeout_seconds,
        }
    }
}

#[async_trait]
impl Tool for ClientSideTool {
    fn spec(&self) -> ToolSpec {
        self.spec.clone()
    }

    fn ends_agent_step(&self) -> bool {
        self.ends_agent_step
    }

    fn is_client_side(&self) -> bool {
        true
    }

    async fn call(
        &self,
        input: Value,
        ctx: &ToolCallContext,
    ) -> Result<Vec<ToolOutputPart>, AgentError> {
        let fut = ctx
            .transport
            .call(&ctx.tool_call_id, &self.spec.name, &input, self.timeout_seconds);
        if self.timeout_seconds < 0 {
            return fut.await;
        }
        match tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_seconds.max(0) as u64),
            fut,
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AgentError::ToolTimeout {
                tool: self.spec.name.clone(),
                timeout_seconds: self.timeout_seconds,
            }),
        }
    }
}
