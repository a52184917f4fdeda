//! Orchestration patterns.
//!
//! Each pattern composes [`ModelCaller`](crate::ModelCaller) calls (and, for
//! the tool loop, a [`ToolRegistry`](clawflow_core::ToolRegistry)) into a
//! fixed control-flow shape:
//!
//! 1. **Tool loop**: model ↔ tool exchange, bounded by a step limit
//! 2. **Quality gate**: draft, evaluate, regenerate at most once
//! 3. **Fan-out**: parallel reviewers, one synthesis, all or nothing
//! 4. **Router**: classify, then answer with the selected handler
//! 5. **Orchestrator**: plan, then fail-independent concurrent workers
//!
//! The patterns do not depend on each other. Concurrency for fan-out and the
//! orchestrator lives in [`task_group`].

pub mod fan_out;
pub mod orchestrator;
pub mod quality_gate;
pub mod router;
pub mod task_group;
pub mod tool_loop;

pub use fan_out::{AggregateResult, FanOutAggregator, Review, ReviewerSpec};
pub use orchestrator::{
    OrchestrationResult, Orchestrator, Plan, Task, TaskOutcome, TaskReport, WorkerInstructions,
    WorkerOutput,
};
pub use quality_gate::{GateResult, QualityGate, QualityMetrics, QualityRubric};
pub use router::{Classification, RouteResult, Router, RoutingTable};
pub use tool_loop::{LoopOutcome, LoopState, ToolLoop};

#[cfg(test)]
pub(crate) mod test_helpers;
