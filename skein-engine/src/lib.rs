//! # Skein
//!
//! A step-driven agent orchestration engine: the part of an AI coding
//! assistant that turns one user prompt into a sequence of model calls and
//! tool calls, with subagent fan-out, cache-control annotation, and a typed
//! event stream — independent of any particular LLM provider, tool
//! implementation, or transport.
//!
//! ## Design principles
//!
//! - **State-in, state-out**: an [`AgentState`] flows through the
//!   [`agent::step_loop::StepLoop`] one step at a time; nothing is mutated
//!   behind the caller's back.
//! - **Narrow capability traits at the seams**: [`LlmClient`] for
//!   generation, [`Tool`] for tool execution, [`tools::ToolCallExtractor`]
//!   for pulling tool calls out of free text, [`StepHandlerFactory`] for
//!   custom per-agent control flow. The engine owns none of these
//!   concretely.
//! - **Events, not callbacks**: every observable thing that happens during a
//!   run is a [`skein_stream::ProtocolEvent`] pushed onto an [`EventStream`].
//!
//! ## Main modules
//!
//! - [`message`]: [`Message`], content-part types, aggregation, and
//!   cache-control marking primitives.
//! - [`cache_control`]: [`cache_control::annotate`] — the four-position
//!   cache-control marking rule.
//! - [`llm`]: [`LlmClient`], [`LlmResponse`], [`LlmUsage`], [`MockLlm`] — the
//!   abstract generation capability.
//! - [`tools`]: [`ToolRegistry`], [`Tool`], [`ToolSpec`], the file-access
//!   [`tools::gate::FileGate`], and [`tools::ToolCallExtractor`].
//! - [`agent`]: [`AgentState`], [`AgentTemplate`], [`Directive`] ([`agent::state`]);
//!   the Step Handler Driver coroutine ([`agent::step_handler`]); the Agent Step
//!   Loop ([`agent::step_loop::StepLoop`]); the Subagent Spawner
//!   ([`agent::spawner::Spawner`]).
//! - [`event`]: [`EventStream`], [`event::EventStreamHandle`],
//!   [`event::KnownAgentFilter`].
//! - [`orchestrator`]: [`Orchestrator`] — the per-prompt entry point.
//! - [`protocol`]: the client/engine action types and [`protocol::OutputShape`].
//! - [`config`]: [`EngineConfig`].
//! - [`error`]: [`AgentError`], the engine-wide error taxonomy.
//!
//! Key types are re-exported at crate root: `use skein_engine::{AgentState, Message, StepLoop};`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use skein_engine::agent::state::{AgentState, AgentTemplate};
//! use skein_engine::event;
//! use skein_engine::llm::MockLlm;
//! use skein_engine::tools::extractor::NullExtractor;
//! use skein_engine::tools::ToolRegistry;
//! use skein_engine::agent::step_loop::StepLoop;
//! use tokio_util::sync::CancellationToken;
//!
//! # struct NoopTransport;
//! # #[async_trait::async_trait]
//! # impl skein_engine::tools::ClientToolTransport for NoopTransport {
//! #     async fn call(&self, _: &str, _: &str, _: &serde_json::Value, _: i64)
//! #         -> Result<Vec<skein_engine::message::ToolOutputPart>, skein_engine::AgentError> {
//! #         Ok(vec![])
//! #     }
//! # }
//! # #[tokio::main]
//! # async fn main() {
//! let (events, mut handle) = event::channel(16, CancellationToken::new());
//! let step_loop = StepLoop {
//!     llm: Arc::new(MockLlm::text_only(vec!["hello, world!"])),
//!     registry: Arc::new(ToolRegistry::new()),
//!     extractor: Arc::new(NullExtractor),
//!     transport: Arc::new(NoopTransport),
//!     events,
//! };
//! let template = AgentTemplate::simple("main", "test-model", 10);
//! let state = AgentState::new("agent-1", "main");
//! let (final_state, _) = step_loop.run_to_completion(&template, state).await;
//! drop(final_state);
//! while handle.recv().await.is_some() {}
//! # }
//! ```

pub mod agent;
pub mod cache_control;
pub mod config;
pub mod error;
pub mod event;
pub mod llm;
pub mod message;
pub mod orchestrator;
pub mod protocol;
pub mod tools;

pub use agent::state::{
    AgentOutput, AgentState, AgentTemplate, Directive, OutputMode, ResumeValue, SessionState,
};
pub use agent::spawner::{SpawnEntry, SpawnError, Spawner};
pub use agent::step_handler::{HandlerHandle, StepHandlerFactory};
pub use agent::step_loop::StepLoop;
pub use cache_control::annotate as annotate_cache_control;
pub use config::EngineConfig;
pub use error::AgentError;
pub use event::EventStream;
pub use llm::{GenerateRequest, LlmClient, LlmResponse, LlmUsage, MockLlm, ToolChoiceMode};
pub use message::Message;
pub use orchestrator::Orchestrator;
pub use protocol::{ClientAction, EngineAction, OutputShape, RunResult};
pub use tools::{ClientToolTransport, Tool, ToolCallExtractor, ToolRegistry, ToolSpec};
