//! Engine error taxonomy (spec §7).
//!
//! Every non-terminating failure (`UnknownTool`, `ToolInputInvalid`, `ToolTimeout`,
//! `ToolFailed`, `UnspawnableAgent`) is recorded as a tool result and the step
//! continues; the engine never retries. The remaining variants terminate the
//! owning agent (or, for `ModelFailure`, the whole run).

use thiserror::Error;

/// Engine-level error. Mirrors the taxonomy in spec §7.
#[derive(Debug, Error, Clone)]
pub enum AgentError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid input for tool '{tool}': {reason}")]
    ToolInputInvalid { tool: String, reason: String },

    #[error("tool '{tool}' timed out after {timeout_seconds}s")]
    ToolTimeout { tool: String, timeout_seconds: i64 },

    #[error("tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("step handler faulted: {0}")]
    HandlerFault(String),

    #[error("model generation failed: {0}")]
    ModelFailure(String),

    #[error("agent exceeded step limit")]
    StepLimitExceeded,

    #[error("set_output value did not satisfy output schema: {0}")]
    OutputSchemaInvalid(String),

    #[error("agent type '{0}' is not spawnable from here")]
    UnspawnableAgent(String),

    #[error("run was cancelled")]
    Cancelled,
}

impl AgentError {
    /// Short machine-readable tag used in synthetic tool-result text (e.g. "TOOL_TIMEOUT").
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::UnknownTool(_) => "UNKNOWN_TOOL",
            AgentError::ToolInputInvalid { .. } => "TOOL_INPUT_INVALID",
            AgentError::ToolTimeout { .. } => "TOOL_TIMEOUT",
            AgentError::ToolFailed { .. } => "TOOL_FAILED",
            AgentError::HandlerFault(_) => "HANDLER_FAULT",
            AgentError::ModelFailure(_) => "MODEL_FAILURE",
            AgentError::StepLimitExceeded => "STEP_LIMIT",
            AgentError::OutputSchemaInvalid(_) => "OUTPUT_SCHEMA_INVALID",
            AgentError::UnspawnableAgent(_) => "UNSPAWNABLE_AGENT",
            AgentError::Cancelled => "CANCELLED",
        }
    }

    /// Whether this error terminates only the current tool call (recorded as a
    /// tool result, step continues) rather than the owning agent.
    pub fn is_non_terminating(&self) -> bool {
        matches!(
            self,
            AgentError::UnknownTool(_)
                | AgentError::ToolInputInvalid { .. }
                | AgentError::ToolTimeout { .. }
                | AgentError::ToolFailed { .. }
                | AgentError::UnspawnableAgent(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_terminating_errors_are_tagged_correctly() {
        assert!(AgentError::UnknownTool("x".into()).is_non_terminating());
        assert!(AgentError::ToolTimeout {
            tool: "bash".into(),
            timeout_seconds: 30
        }
        .is_non_terminating());
        assert!(!AgentError::ModelFailure("down".into()).is_non_terminating());
        assert!(!AgentError::StepLimitExceeded.is_non_terminating());
    }

    #[test]
    fn display_messages_name_the_failing_tool() {
        let e = AgentError::ToolFailed {
            tool: "glob".into(),
            message: "boom".into(),
        };
        let s = e.to_string();
        assert!(s.contains("glob"));
        assert!(s.contains("boom"));
    }
}
