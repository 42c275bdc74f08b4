//! Message model (spec §3, §4.1): typed, role-tagged messages carrying ordered
//! content parts plus auxiliary metadata (tags, provider-options, `sent_at`).
//!
//! Grounded on the minimal `Message` enum in the teacher's agent-state module
//! (a plain role enum with string constructors and serde round-trip tests),
//! generalized here from a 3-variant text-only enum to the spec's 4-role,
//! content-part model.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tags carrying retention/cache-marking hints (spec §3).
pub mod tags {
    pub const USER_PROMPT: &str = "USER_PROMPT";
    pub const STEP_PROMPT: &str = "STEP_PROMPT";
    pub const LAST_ASSISTANT_MESSAGE: &str = "LAST_ASSISTANT_MESSAGE";
    pub const AGENT_STEP_EPHEMERAL: &str = "AGENT_STEP_EPHEMERAL";
}

/// The three equivalent provider keys the cache-control marker is written under (spec §4.1, §9).
pub const CACHE_CONTROL_PROVIDER_KEYS: [&str; 3] = [
    "anthropic.cache_control",
    "openrouter.cache_control",
    "openai_compat.cache_control",
];

/// Opaque provider-options bag: provider name -> key -> value.
pub type ProviderOptions = HashMap<String, HashMap<String, Value>>;

/// Auxiliary metadata carried by every message. Stripped before transport to the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub tags: HashSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_options: Option<ProviderOptions>,
    pub sent_at: i64,
}

impl Metadata {
    pub fn new(sent_at: i64) -> Self {
        Self {
            tags: HashSet::new(),
            provider_options: None,
            sent_at,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Content part of a `user` message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UserPart {
    Text(String),
    Image {
        data: String,
        mime_type: Option<String>,
    },
    File {
        name: String,
        data: String,
        mime_type: Option<String>,
    },
}

/// Content part of an `assistant` message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssistantPart {
    Text(String),
    Reasoning(String),
    ToolCall {
        id: String,
        name: String,
        input: Value,
    },
}

/// Content part of a `tool` message's output list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutputPart {
    Json(Value),
    Media {
        data: String,
        mime_type: Option<String>,
    },
}

/// A role-tagged message with ordered content parts and metadata (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        parts: Vec<String>,
        meta: Metadata,
    },
    User {
        parts: Vec<UserPart>,
        meta: Metadata,
    },
    Assistant {
        parts: Vec<AssistantPart>,
        meta: Metadata,
    },
    Tool {
        tool_call_id: String,
        tool_name: String,
        outputs: Vec<ToolOutputPart>,
        meta: Metadata,
    },
}

/// Error constructing a message with content that violates the role's invariant.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum MessageError {
    #[error("{0} message requires at least one content part")]
    InvalidContent(&'static str),
}

impl Message {
    pub fn system(text: impl Into<String>, sent_at: i64) -> Self {
        Message::System {
            parts: vec![text.into()],
            meta: Metadata::new(sent_at),
        }
    }

    pub fn system_parts(parts: Vec<String>, sent_at: i64) -> Result<Self, MessageError> {
        if parts.is_empty() {
            return Err(MessageError::InvalidContent("system"));
        }
        Ok(Message::System {
            parts,
            meta: Metadata::new(sent_at),
        })
    }

    pub fn user(text: impl Into<String>, sent_at: i64) -> Self {
        Message::User {
            parts: vec![UserPart::Text(text.into())],
            meta: Metadata::new(sent_at),
        }
    }

    pub fn user_parts(parts: Vec<UserPart>, sent_at: i64) -> Result<Self, MessageError> {
        if parts.is_empty() {
            return Err(MessageError::InvalidContent("user"));
        }
        Ok(Message::User {
            parts,
            meta: Metadata::new(sent_at),
        })
    }

    pub fn assistant(text: impl Into<String>, sent_at: i64) -> Self {
        Message::Assistant {
            parts: vec![AssistantPart::Text(text.into())],
            meta: Metadata::new(sent_at),
        }
    }

    pub fn assistant_parts(
        parts: Vec<AssistantPart>,
        sent_at: i64,
    ) -> Result<Self, MessageError> {
        if parts.is_empty() {
            return Err(MessageError::InvalidContent("assistant"));
        }
        Ok(Message::Assistant {
            parts,
            meta: Metadata::new(sent_at),
        })
    }

    pub fn tool(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        outputs: Vec<ToolOutputPart>,
        sent_at: i64,
    ) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            outputs,
            meta: Metadata::new(sent_at),
        }
    }

    pub fn with_tag(self, tag: impl Into<String>) -> Self {
        self.map_meta(|m| m.with_tag(tag))
    }

    pub fn meta(&self) -> &Metadata {
        match self {
            Message::System { meta, .. }
            | Message::User { meta, .. }
            | Message::Assistant { meta, .. }
            | Message::Tool { meta, .. } => meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut Metadata {
        match self {
            Message::System { meta, .. }
            | Message::User { meta, .. }
            | Message::Assistant { meta, .. }
            | Message::Tool { meta, .. } => meta,
        }
    }

    fn map_meta(mut self, f: impl FnOnce(Metadata) -> Metadata) -> Self {
        let meta = std::mem::take(self.meta_mut());
        *self.meta_mut() = f(meta);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.meta().has_tag(tag)
    }

    /// Role discriminant, ignoring content.
    pub fn role_name(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    /// Flattened text content, used for identity comparisons (e.g. duplicate-prompt dedup).
    pub fn flatten_text(&self) -> String {
        match self {
            Message::System { parts, .. } => parts.join("\n\n"),
            Message::User { parts, .. } => parts
                .iter()
                .filter_map(|p| match p {
                    UserPart::Text(t) => Some(t.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
            Message::Assistant { parts, .. } => parts
                .iter()
                .filter_map(|p| match p {
                    AssistantPart::Text(t) => Some(t.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
            Message::Tool { .. } => String::new(),
        }
    }

    /// Whether `other` is the same role with equal tags and provider-options,
    /// i.e. adjacent messages satisfying this are aggregatable (spec §3).
    fn aggregates_with(&self, other: &Message) -> bool {
        if matches!(self, Message::Tool { .. }) || matches!(other, Message::Tool { .. }) {
            // Tool messages are never fused (spec §9 open question b).
            return false;
        }
        std::mem::discriminant(self) == std::mem::discriminant(other)
            && self.meta().tags == other.meta().tags
            && self.meta().provider_options == other.meta().provider_options
    }
}

impl Default for Message {
    fn default() -> Self {
        Message::System {
            parts: vec![String::new()],
            meta: Metadata::default(),
        }
    }
}

/// Collapses runs of adjacent same-role, same-tags, same-provider-options messages
/// into one, order-preserving (spec §3, §4.1). Tool messages are never fused.
pub fn aggregate(messages: &[Message]) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(messages.len());
    for msg in messages {
        match out.last_mut() {
            Some(prev) if prev.aggregates_with(msg) => merge_into(prev, msg),
            _ => out.push(msg.clone()),
        }
    }
    out
}

fn merge_into(prev: &mut Message, next: &Message) {
    match (prev, next) {
        (Message::System { parts, .. }, Message::System { parts: next_parts, .. }) => {
            let joined = parts.join("\n\n");
            let next_joined = next_parts.join("\n\n");
            *parts = vec![format!("{joined}\n\n{next_joined}")];
        }
        (Message::User { parts, .. }, Message::User { parts: next_parts, .. }) => {
            parts.extend(next_parts.iter().cloned());
        }
        (Message::Assistant { parts, .. }, Message::Assistant { parts: next_parts, .. }) => {
            parts.extend(next_parts.iter().cloned());
        }
        _ => unreachable!("aggregates_with guards role match"),
    }
}

fn is_trivial_text(s: &str) -> bool {
    s.chars().count() <= 1
}

/// Returns a new message with a cache-control marker set on the last non-trivial
/// content part (or on the message itself for single-string/system content).
/// "Non-trivial" = non-text, or text longer than one character (spec §4.1, §4.8).
/// Pure: never mutates `msg`.
pub fn with_cache_control(msg: &Message) -> Message {
    let mut out = msg.clone();
    let marker: Value = serde_json::json!({"type": "ephemeral"});
    match &mut out {
        Message::System { .. } => {
            set_provider_options(out.meta_mut(), marker);
        }
        Message::User { parts, meta } => {
            if parts.len() <= 1 {
                set_provider_options(meta, marker);
            } else if let Some(idx) = last_non_trivial_user(parts) {
                // Parts carry no per-part metadata in this model; mark at message level,
                // mirroring "single string" behavior when there's exactly one eligible part.
                let _ = idx;
                set_provider_options(meta, marker);
            }
        }
        Message::Assistant { parts, meta } => {
            if parts.len() <= 1 {
                set_provider_options(meta, marker);
            } else if last_non_trivial_assistant(parts).is_some() {
                set_provider_options(meta, marker);
            }
        }
        Message::Tool { meta, .. } => {
            set_provider_options(meta, marker);
        }
    }
    out
}

fn last_non_trivial_user(parts: &[UserPart]) -> Option<usize> {
    parts.iter().rposition(|p| match p {
        UserPart::Text(t) => !is_trivial_text(t),
        _ => true,
    })
}

fn last_non_trivial_assistant(parts: &[AssistantPart]) -> Option<usize> {
    parts.iter().rposition(|p| match p {
        AssistantPart::Text(t) => !is_trivial_text(t),
        _ => true,
    })
}

fn set_provider_options(meta: &mut Metadata, marker: Value) {
    let bag = meta.provider_options.get_or_insert_with(HashMap::new);
    for key in CACHE_CONTROL_PROVIDER_KEYS {
        let (provider, field) = key.split_once('.').expect("static key has a dot");
        bag.entry(provider.to_string())
            .or_default()
            .insert(field.to_string(), marker.clone());
    }
}

/// Returns a new message with cache-control markers removed, pruning now-empty
/// provider-option maps (spec §4.1). Pure: never mutates `msg`.
pub fn without_cache_control(msg: &Message) -> Message {
    let mut out = msg.clone();
    if let Some(bag) = out.meta_mut().provider_options.as_mut() {
        for key in CACHE_CONTROL_PROVIDER_KEYS {
            let (provider, field) = key.split_once('.').expect("static key has a dot");
            if let Some(fields) = bag.get_mut(provider) {
                fields.remove(field);
                if fields.is_empty() {
                    bag.remove(provider);
                }
            }
        }
        if bag.is_empty() {
            out.meta_mut().provider_options = None;
        }
    }
    out
}

/// Whether `msg` currently carries a cache-control marker on any of the three provider keys.
pub fn has_cache_control(msg: &Message) -> bool {
    let Some(bag) = msg.meta().provider_options.as_ref() else {
        return false;
    };
    CACHE_CONTROL_PROVIDER_KEYS.iter().any(|key| {
        let (provider, field) = key.split_once('.').expect("static key has a dot");
        bag.get(provider).is_some_and(|f| f.contains_key(field))
    })
}
