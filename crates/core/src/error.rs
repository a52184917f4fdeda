//! Error types for the ClawFlow domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] is what the
//! orchestration patterns surface to their callers.

use thiserror::Error;

use crate::step_log::StepLog;

/// The top-level error type for all orchestration runs.
///
/// Every terminal variant carries enough context to explain the failure
/// without re-running: the step log for the tool loop, the failing branch
/// for the fan-out, the raw plan for the orchestrator.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// A model call inside the tool loop failed; the log holds every
    /// completed step up to the failure.
    #[error("Tool loop aborted after {} step(s): {source}", .log.len())]
    ToolLoop {
        #[source]
        source: ModelError,
        log: Box<StepLog>,
    },

    /// A single-flow pattern stage (draft, evaluate, classify, plan...) failed.
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: ModelError,
    },

    // --- Pattern terminal errors ---
    #[error("Aggregation failed: reviewer '{reviewer}' did not complete: {source}")]
    AggregationPartialFailure {
        reviewer: String,
        #[source]
        source: ModelError,
    },

    #[error("Plan validation failed: {reason}")]
    PlanValidation {
        reason: String,
        raw_plan: Option<serde_json::Value>,
    },

    // --- Construction errors ---
    #[error("Tool registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of a single model invocation.
///
/// The core never retries; retry policy, if any, belongs to the
/// [`ModelClient`](crate::model::ModelClient) implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Transient: the caller may retry.
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    /// Permanent: malformed request or a response that does not match the
    /// requested shape.
    #[error("Model rejected the request: {0}")]
    Rejected(String),

    #[error("Model call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl ModelError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}

/// Errors a [`Tool`](crate::tool::Tool) implementation may return.
///
/// These never cross the tool loop boundary as errors: the registry folds
/// them into a [`ToolResult`](crate::tool::ToolResult) failure payload.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Errors raised while building a [`ToolRegistry`](crate::tool::ToolRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Tool '{tool_name}' declares an unusable input schema: {reason}")]
    InvalidSchema { tool_name: String, reason: String },
}
