//! Streaming tool-call extraction is out of scope (spec §1): this module
//! defines only the `ToolCallExtractor` boundary the Agent Step Loop calls
//! into (spec §4.4 step 3).

use serde_json::Value;

/// A tool call recovered from streamed assistant text, e.g. via a
/// structured-tag protocol. `id` is assigned by the engine if absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedToolCall {
    pub id: Option<String>,
    pub name: String,
    pub input: Value,
}

/// Recovers tool calls embedded in streamed assistant text. The concrete
/// streaming-XML parser is out of scope; callers inject an implementation.
pub trait ToolCallExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<ExtractedToolCall>;
}

/// Default extractor for templates that rely solely on native tool-call
/// parts and never embed calls in text.
pub struct NullExtractor;

impl ToolCallExtractor for NullExtractor {
    fn extract(&self, _text: &str) -> Vec<ExtractedToolCall> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_extractor_never_extracts() {
        assert!(NullExtractor.extract("<tool_call>anything</tool_call>").is_empty());
    }
}
