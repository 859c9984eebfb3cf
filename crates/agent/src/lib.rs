//! # ironloop Agent
//!
//! The agent control loop: query the model, execute the actions it
//! requests, record everything, repeat until a terminal message. Built on
//! the collaborator traits from `ironloop-core`.
//!
//! Two agent kinds ship here:
//! - [`DefaultAgent`] — the plain loop
//! - [`ToolCallAgent`] — the same loop with a tool-calling policy applied
//!   to the model at construction
//!
//! Supporting machinery: per-run [`AgentConfig`], step/cost
//! [`LimitTracker`], remaining-context tracking, and the
//! [`TrajectoryRecorder`] with live JSONL logging and snapshot
//! checkpoints.

pub mod config;
pub mod context_window;
pub mod limits;
pub mod loop_runner;
pub mod registry;
pub mod tool_call;
pub mod trajectory;

pub use config::{AgentConfig, ContextWindowMode};
pub use context_window::{
    ContextWindowTracker, JsonFileWindowStore, MemoryWindowStore, WindowResolver, WindowStore,
};
pub use limits::{LimitCheck, LimitTracker, LIMITS_EXCEEDED};
pub use loop_runner::{DefaultAgent, QueryOutcome};
pub use registry::{builtin_agents, AgentFactory, AgentKind};
pub use tool_call::{configure_tool_calling, ToolCallAgent};
pub use trajectory::{TrajectoryRecorder, TRAJECTORY_FORMAT};
