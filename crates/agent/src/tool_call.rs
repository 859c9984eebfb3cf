//! Agent variant for backends with native tool calling.
//!
//! Same loop as [`DefaultAgent`]; the only difference is a model policy
//! applied at construction: every response must carry a tool call, and tool
//! calls must come with reasoning text. Backends that lack either knob keep
//! working, the request is just a no-op.

use std::sync::Arc;

use ironloop_core::env::Environment;
use ironloop_core::error::Result;
use ironloop_core::model::{Model, ToolChoice};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::AgentConfig;
use crate::loop_runner::DefaultAgent;

/// A [`DefaultAgent`] with tool-calling policy applied to its model.
pub struct ToolCallAgent {
    inner: DefaultAgent,
}

/// Ask the model to require tool calls and reasoning.
///
/// Returns `(tool_choice_applied, reasoning_applied)`; unsupported knobs are
/// logged and ignored.
pub fn configure_tool_calling(model: &dyn Model) -> (bool, bool) {
    let tool_choice = model.set_tool_choice(ToolChoice::Required);
    if !tool_choice {
        debug!(model = model.name(), "Backend does not support forced tool choice");
    }
    let reasoning = model.set_require_reasoning(true);
    if !reasoning {
        debug!(model = model.name(), "Backend does not support required reasoning");
    }
    (tool_choice, reasoning)
}

impl ToolCallAgent {
    pub fn new(model: Arc<dyn Model>, env: Arc<dyn Environment>, config: AgentConfig) -> Self {
        configure_tool_calling(model.as_ref());
        Self {
            inner: DefaultAgent::new(model, env, config).with_agent_type("toolcall"),
        }
    }

    /// Run the loop until the agent is finished. See [`DefaultAgent::run`].
    pub async fn run(&mut self, task: &str) -> Result<Map<String, Value>> {
        self.inner.run(task).await
    }

    pub fn inner(&self) -> &DefaultAgent {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut DefaultAgent {
        &mut self.inner
    }
}
