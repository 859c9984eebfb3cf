//! Error types for the ironloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each collaborator
//! boundary has its own error enum; `Error` is the umbrella the agent loop
//! works with.
//!
//! Flow interrupts are modelled as `Interrupt` variants on the collaborator
//! enums: a collaborator may return one to inject messages into the
//! conversation without failing the run. The loop unpacks them via
//! [`Error::into_interrupt`] instead of treating them as failures.

use thiserror::Error;

use crate::message::Message;

/// The top-level error type for all ironloop operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Environment error: {0}")]
    Env(#[from] EnvError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unknown {kind}: {name}")]
    UnknownComponent { kind: &'static str, name: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short category name, recorded as `exit_status` when a run fails.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Model(ModelError::Interrupt(_)) | Error::Env(EnvError::Interrupt(_)) => {
                "FlowInterrupt"
            }
            Error::Model(_) => "ModelError",
            Error::Env(_) => "EnvironmentError",
            Error::Template(_) => "TemplateError",
            Error::Serialization(_) => "SerializationError",
            Error::Config { .. } => "ConfigError",
            Error::UnknownComponent { .. } => "UnknownComponent",
            Error::Internal(_) => "InternalError",
        }
    }

    /// Unpack a flow interrupt into its injected messages.
    ///
    /// Returns `Ok(messages)` if this error is an interrupt signal from
    /// either collaborator, `Err(self)` otherwise.
    pub fn into_interrupt(self) -> std::result::Result<Vec<Message>, Error> {
        match self {
            Error::Model(ModelError::Interrupt(messages))
            | Error::Env(EnvError::Interrupt(messages)) => Ok(messages),
            other => Err(other),
        }
    }
}

/// Errors from the language-model collaborator.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Model not configured: {0}")]
    NotConfigured(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Control-flow signal: inject the carried messages and keep running.
    #[error("flow interrupted with {} injected message(s)", .0.len())]
    Interrupt(Vec<Message>),
}

/// Errors from the execution-environment collaborator.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("Action execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Action timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Control-flow signal: inject the carried messages and keep running.
    #[error("flow interrupted with {} injected message(s)", .0.len())]
    Interrupt(Vec<Message>),
}

/// Errors from prompt template rendering.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Unknown template placeholder: {0}")]
    UnknownPlaceholder(String),

    #[error("Unclosed placeholder starting at byte {0}")]
    Unclosed(usize),
}
