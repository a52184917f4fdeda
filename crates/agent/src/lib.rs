//! Agent orchestration patterns for ClawFlow.
//!
//! Every pattern talks to the model through a [`ModelCaller`], which bounds
//! each call with a timeout and publishes a domain event per call. Patterns
//! are constructed once (usually from an [`AppConfig`](clawflow_config::AppConfig))
//! and may then be run any number of times; each run gets its own
//! [`RunId`](clawflow_core::RunId) and shares no mutable state with others.

pub mod model_call;
pub mod patterns;
pub mod relay;

pub use model_call::ModelCaller;
pub use patterns::{
    AggregateResult, Classification, FanOutAggregator, GateResult, LoopOutcome, LoopState,
    OrchestrationResult, Orchestrator, Plan, QualityGate, QualityRubric, Review, ReviewerSpec,
    RouteResult, Router, RoutingTable, Task, TaskOutcome, TaskReport, ToolLoop, WorkerInstructions,
};
pub use relay::{RelayError, WireMessage};
