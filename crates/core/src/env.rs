//! Environment trait — the abstraction over action execution.
//!
//! The environment receives one action at a time (as declared by the model in
//! its response `extra.actions`) and returns one observation per action. It
//! may run shell commands, containers, or anything else; the loop only sees
//! the contract below.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EnvError;

/// The result of executing a single action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Captured output, fed back to the model
    pub output: String,

    /// Process exit code, when the action was a command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returncode: Option<i64>,

    /// Environment-specific payload
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Observation {
    /// Create an observation with just output text.
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            returncode: None,
            extra: Map::new(),
        }
    }

    /// Attach an exit code, builder style.
    pub fn with_returncode(mut self, code: i64) -> Self {
        self.returncode = Some(code);
        self
    }
}

/// The execution-environment collaborator contract.
#[async_trait]
pub trait Environment: Send + Sync {
    /// A human-readable environment name (e.g. "local", "docker").
    fn name(&self) -> &str;

    /// Execute one action, synchronously from the loop's point of view.
    async fn execute(&self, action: &Value) -> Result<Observation, EnvError>;

    /// Variables this environment contributes to prompt templates.
    fn get_template_vars(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Environment metadata merged into the trajectory snapshot.
    fn serialize(&self) -> Value {
        Value::Object(Map::new())
    }
}
