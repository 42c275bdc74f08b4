use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::AgentError;

use super::Tool;

/// Immutable for the lifetime of a session (spec §5): resolves a tool name
/// to its handler and validates input against its declared schema.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.spec().name.clone(), tool);
    }

    pub fn with_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Resolves `name`, failing with `UnknownTool` if absent (spec §4.2).
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, AgentError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn specs(&self) -> Vec<super::ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    /// Validates `input` against `name`'s declared JSON Schema.
    pub fn validate_input(&self, name: &str, input: &Value) -> Result<(), AgentError> {
        let tool = self.resolve(name)?;
        validate_against_schema(name, &tool.spec().input_schema, input)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates `value` against `schema`, reporting the first failure as
/// `ToolInputInvalid` (spec §4.2).
pub fn validate_against_schema(
    tool_name: &str,
    schema: &Value,
    value: &Value,
) -> Result<(), AgentError> {
    let compiled = jsonschema::validator_for(schema).map_err(|e| AgentError::ToolInputInvalid {
        tool: tool_name.to_string(),
        reason: format!("invalid schema: {e}"),
    })?;
    if let Some(err) = compiled.iter_errors(value).next() {
        return Err(AgentError::ToolInputInvalid {
            tool: tool_name.to_string(),
            reason: err.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolCallContext, ToolSpec};
    use crate::message::ToolOutputPart;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "echo".into(),
                description: "echoes input".into(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {"text": {"type": "string"}},
                    "required": ["text"]
                }),
            }
        }

        fn ends_agent_step(&self) -> bool {
            true
        }

        async fn call(
            &self,
            input: Value,
            _ctx: &ToolCallContext,
        ) -> Result<Vec<ToolOutputPart>, AgentError> {
            Ok(vec![ToolOutputPart::Json(input)])
        }
    }

    #[test]
    fn resolve_unknown_tool_fails() {
        let registry = ToolRegistry::new();
        let err = registry.resolve("nope").unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(_)));
    }

    #[test]
    fn resolve_known_tool_succeeds() {
        let registry = ToolRegistry::with_tools(vec![Arc::new(Echo)]);
        assert!(registry.resolve("echo").is_ok());
    }

    #[test]
    fn validate_input_rejects_schema_mismatch() {
        let registry = ToolRegistry::with_tools(vec![Arc::new(Echo)]);
        let err = registry
            .validate_input("echo", &serde_json::json!({"wrong": 1}))
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolInputInvalid { .. }));
    }

    #[test]
    fn validate_input_accepts_matching_schema() {
        let registry = ToolRegistry::with_tools(vec![Arc::new(Echo)]);
        assert!(registry
            .validate_input("echo", &serde_json::json!({"text": "hi"}))
            .is_ok());
    }
}
