//! Builtin agent kinds, resolvable by configured name.
//!
//! Config files select an agent by string identifier; the factories here
//! wire the chosen variant to its collaborators. Embedders extend the set
//! with their own [`ComponentLoader`]s.

use std::sync::Arc;

use ironloop_core::env::Environment;
use ironloop_core::error::Result;
use ironloop_core::model::Model;
use ironloop_core::registry::ComponentRegistry;
use serde_json::{Map, Value};

use crate::config::AgentConfig;
use crate::loop_runner::DefaultAgent;
use crate::tool_call::ToolCallAgent;

/// A constructed agent of any builtin kind.
pub enum AgentKind {
    Default(DefaultAgent),
    ToolCall(ToolCallAgent),
}

impl AgentKind {
    /// Run the loop until the agent is finished. See [`DefaultAgent::run`].
    pub async fn run(&mut self, task: &str) -> Result<Map<String, Value>> {
        match self {
            AgentKind::Default(agent) => agent.run(task).await,
            AgentKind::ToolCall(agent) => agent.run(task).await,
        }
    }

    /// The underlying loop runner.
    pub fn as_default(&self) -> &DefaultAgent {
        match self {
            AgentKind::Default(agent) => agent,
            AgentKind::ToolCall(agent) => agent.inner(),
        }
    }
}

/// Builds an agent from its collaborators and config.
pub type AgentFactory =
    Arc<dyn Fn(Arc<dyn Model>, Arc<dyn Environment>, AgentConfig) -> AgentKind + Send + Sync>;

/// Registry of the builtin agent kinds: `default` and `toolcall`.
pub fn builtin_agents() -> ComponentRegistry<AgentFactory> {
    ComponentRegistry::new("agent")
        .register(
            "default",
            Arc::new(|model, env, config| {
                AgentKind::Default(DefaultAgent::new(model, env, config))
            }) as AgentFactory,
        )
        .register(
            "toolcall",
            Arc::new(|model, env, config| {
                AgentKind::ToolCall(ToolCallAgent::new(model, env, config))
            }) as AgentFactory,
        )
}
