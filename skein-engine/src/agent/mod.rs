//! Everything scoped to one agent's lifecycle (spec §3, §4.3-§4.5): state,
//! the step handler driver, the step loop, and the subagent spawner.

pub mod spawner;
pub mod state;
pub mod step_handler;
pub mod step_loop;

pub use spawner::{SpawnEntry, SpawnError, Spawner};
pub use state::{AgentOutput, AgentState, AgentTemplate, Directive, OutputMode, ResumeValue, SessionState};
pub use step_handler::{drive, HandlerHandle, StepHandlerFactory};
pub use step_loop::{StepLoop, StepOutcome};
