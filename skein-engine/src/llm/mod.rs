//! The abstract `Generate` capability (spec §1, §4.4): the engine calls a
//! model through this trait and never talks to a concrete provider.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AgentError;
use crate::message::Message;
use crate::tools::ToolSpec;

/// A streamed fragment of a model response, emitted as it arrives (spec §4.4 step 2).
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    Text(String),
    Reasoning(String),
    ToolCall {
        id: Option<String>,
        name: String,
        input: Value,
    },
}

/// How the model should use the supplied tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoiceMode {
    #[default]
    Auto,
    None,
    Required,
}

/// Token usage for one model call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LlmUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl LlmUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: &LlmUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// One model generation, fully drained: ordered parts plus usage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmResponse {
    pub parts: Vec<ResponsePart>,
    pub usage: LlmUsage,
}

impl LlmResponse {
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ResponsePart::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_calls(&self) -> Vec<(&Option<String>, &str, &Value)> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ResponsePart::ToolCall { id, name, input } => Some((id, name.as_str(), input)),
                _ => None,
            })
            .collect()
    }
}

/// Parameters for one call to the model capability (spec §4.4 step 2).
#[derive(Debug)]
pub struct GenerateRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: ToolChoiceMode,
    pub provider_options: Option<serde_json::Map<String, Value>>,
    pub n: usize,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, tools: Vec<ToolSpec>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools,
            tool_choice: ToolChoiceMode::default(),
            provider_options: None,
            n: 1,
        }
    }
}

/// The abstract model-generation capability. No concrete provider lives in
/// this crate (spec §1 non-goal); callers inject an implementation.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<LlmResponse, AgentError>;

    /// Generates `request.n` independent completions (spec `GENERATE_N` directive, §3).
    async fn generate_n(&self, request: GenerateRequest) -> Result<Vec<LlmResponse>, AgentError> {
        let n = request.n.max(1);
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.generate(request.clone()).await?);
        }
        Ok(out)
    }
}

impl Clone for GenerateRequest {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            messages: self.messages.clone(),
            tools: self.tools.clone(),
            tool_choice: self.tool_choice,
            provider_options: self.provider_options.clone(),
            n: self.n,
        }
    }
}

/// A scriptable test double implementing [`LlmClient`]: returns one
/// `LlmResponse` per call from a fixed, cyclically-consumed script.
/// Mirrors the pack's mock-LLM test fixtures.
pub struct MockLlm {
    responses: std::sync::Mutex<std::collections::VecDeque<LlmResponse>>,
}

impl MockLlm {
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
        }
    }

    pub fn text_only(replies: Vec<&str>) -> Self {
        Self::new(
            replies
                .into_iter()
                .map(|t| LlmResponse {
                    parts: vec![ResponsePart::Text(t.to_string())],
                    usage: LlmUsage::default(),
                })
                .collect(),
        )
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn generate(&self, _request: GenerateRequest) -> Result<LlmResponse, AgentError> {
        let mut queue = self.responses.lock().expect("mock llm mutex poisoned");
        queue
            .pop_front()
            .ok_or_else(|| AgentError::ModelFailure("mock llm script exhausted".into()))
    }
}
