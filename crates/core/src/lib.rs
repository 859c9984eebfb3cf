//! # ironloop Core
//!
//! Domain types, collaborator traits, and error definitions for the ironloop
//! agent runtime. This crate has **no runtime or I/O dependencies** — it
//! defines the contracts the agent loop drives and that backends implement.
//!
//! ## Design Philosophy
//!
//! The loop owns all mutable run state; collaborators (model, environment)
//! are trait objects specified here and implemented elsewhere. This enables:
//! - Swapping backends via configuration
//! - Testing the loop with inline mock collaborators
//! - A clean dependency graph (everything depends inward on core)

pub mod env;
pub mod error;
pub mod merge;
pub mod message;
pub mod model;
pub mod registry;
pub mod template;

// Re-export key types at crate root for ergonomics
pub use env::{Environment, Observation};
pub use error::{EnvError, Error, ModelError, Result, TemplateError};
pub use merge::{merge_all, recursive_merge};
pub use message::{Message, Role, Usage};
pub use model::{Model, ToolChoice};
pub use registry::{ComponentLoader, ComponentRegistry};
