//! Message domain types.
//!
//! A conversation is an ordered sequence of messages. Order matters:
//! insertion order is conversation order, and the loop only ever appends.
//! A message with `role = exit` marks the conversation terminal; its `extra`
//! map carries `exit_status` and `submission`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (the first message)
    System,
    /// The end user / task statement
    User,
    /// The language model
    Assistant,
    /// An action observation fed back to the model
    Tool,
    /// Terminal marker — the run is over
    Exit,
}

/// Token usage reported by a model backend.
///
/// This is the structured-record form of usage data; backends that only
/// report usage as loose JSON put it under `extra.usage` or
/// `extra.response.usage` instead (see `prompt_tokens` extraction in the
/// agent crate).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// A single message in a conversation.
///
/// Immutable once appended, with one exception: the loop may annotate the
/// latest assistant message with `context_left_percent` after reading the
/// response's usage data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Structured token usage, when the backend reports it in typed form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Remaining-context annotation, written once after the query completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_left_percent: Option<u8>,

    /// Backend-specific payload: `cost`, `actions`, raw response data, and
    /// for exit messages `exit_status` and `submission`
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Create a message with an empty `extra` map.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            usage: None,
            context_left_percent: None,
            extra: Map::new(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a terminal exit message.
    pub fn exit(
        content: impl Into<String>,
        exit_status: impl Into<String>,
        submission: impl Into<String>,
    ) -> Self {
        let mut extra = Map::new();
        extra.insert("exit_status".into(), Value::String(exit_status.into()));
        extra.insert("submission".into(), Value::String(submission.into()));
        Self {
            role: Role::Exit,
            content: content.into(),
            usage: None,
            context_left_percent: None,
            extra,
        }
    }

    /// Attach an extra key, builder style.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Replace the whole extra map, builder style.
    pub fn with_extra_map(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    /// Whether this message terminates the run.
    pub fn is_exit(&self) -> bool {
        self.role == Role::Exit
    }

    /// The exit status carried by a terminal message, if any.
    pub fn exit_status(&self) -> Option<&str> {
        self.extra.get("exit_status").and_then(Value::as_str)
    }

    /// The cost the backend declared for this response, if any.
    pub fn cost(&self) -> Option<f64> {
        self.extra.get("cost").and_then(Value::as_f64)
    }

    /// The actions the model requested, in declaration order.
    pub fn actions(&self) -> &[Value] {
        self.extra
            .get("actions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
