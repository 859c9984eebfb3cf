//! Model trait — the abstraction over language-model backends.
//!
//! A Model knows how to send a conversation to an LLM and get a response
//! message back. The agent loop calls `query()` without knowing which backend
//! is behind it.
//!
//! The response message's `extra` map is the backend's channel for declaring
//! `cost` (f64), `actions` (ordered array) and raw `response` data including
//! token usage.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::env::Observation;
use crate::error::ModelError;
use crate::message::{Message, Role};

/// Tool-choice behaviour a backend may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides whether to call tools
    Auto,
    /// Every response must carry at least one tool call
    Required,
    /// Tool calling disabled
    None,
}

/// The language-model collaborator contract.
#[async_trait]
pub trait Model: Send + Sync {
    /// A human-readable backend name (e.g. "anthropic", "scripted").
    fn name(&self) -> &str;

    /// The concrete model identifier, used for context-window lookup.
    ///
    /// `None` when the backend has no stable model name to key on.
    fn model_name(&self) -> Option<String> {
        None
    }

    /// Send the full message history, return the next assistant message.
    async fn query(&self, messages: &[Message]) -> Result<Message, ModelError>;

    /// Build a message in whatever shape this backend expects.
    fn format_message(&self, role: Role, content: &str, extra: Map<String, Value>) -> Message {
        Message::new(role, content).with_extra_map(extra)
    }

    /// Turn action observations into the messages fed back to the model.
    ///
    /// One message per observation, order preserved. Backends with richer
    /// feedback formats (tool-result framing, templated output) override this.
    fn format_observation_messages(
        &self,
        _source: &Message,
        observations: &[Observation],
        _template_vars: &Map<String, Value>,
    ) -> Vec<Message> {
        observations
            .iter()
            .map(|obs| Message::new(Role::Tool, obs.output.clone()))
            .collect()
    }

    /// Variables this backend contributes to prompt templates.
    fn get_template_vars(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Backend metadata merged into the trajectory snapshot.
    fn serialize(&self) -> Value {
        Value::Object(Map::new())
    }

    /// Ask the backend to force a tool-choice policy.
    ///
    /// Returns false when the backend has no such knob; callers treat that
    /// as a no-op, not an error.
    fn set_tool_choice(&self, _choice: ToolChoice) -> bool {
        false
    }

    /// Ask the backend to require reasoning text with each tool call.
    fn set_require_reasoning(&self, _required: bool) -> bool {
        false
    }
}
