//! # ClawFlow Core
//!
//! Domain types, traits, and error definitions for the ClawFlow agent
//! orchestration patterns. This crate has **no runtime dependencies** beyond
//! `tokio` sync/time primitives: it defines the domain model that the pattern
//! crate implements against.
//!
//! ## Design Philosophy
//!
//! The two external collaborators are defined as traits here:
//! - [`ModelClient`]: a language-model inference call (transport lives elsewhere)
//! - [`Tool`]: a named, schema-validated operation the model may invoke
//!
//! Everything else is plain data: requests, responses, tool results, the
//! per-run [`StepLog`], and the closed enumerations used for routing and
//! planning. Tests supply scripted implementations of the traits.

pub mod error;
pub mod event;
pub mod message;
pub mod model;
pub mod schema;
pub mod step_log;
pub mod taxonomy;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ModelError, RegistryError, Result, ToolError};
pub use event::{DomainEvent, EventBus, RunId};
pub use message::{Message, Role};
pub use model::{ModelClient, ModelRequest, ModelResponse, ModelTier, OutputSchema, ToolDefinition};
pub use schema::{SchemaError, SchemaViolation};
pub use step_log::{StepEntry, StepLog, StepLogFull};
pub use taxonomy::{EstimatedComplexity, QueryCategory, QueryComplexity, TaskKind};
pub use tool::{
    Tool, ToolCall, ToolFailure, ToolFailureKind, ToolOutcome, ToolRegistry, ToolRegistryBuilder,
    ToolResult,
};
