//! Domain event system: observation of pattern runs without coupling.
//!
//! Patterns publish events as they make progress; the CLI (or a test)
//! subscribes to watch a run. Events are informational only and never
//! influence control flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Identifies one pattern run across all of its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A model call completed
    ModelInvoked {
        run_id: RunId,
        stage: String,
        response_kind: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A model call failed or timed out
    ModelFailed {
        run_id: RunId,
        stage: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed (or rejected before execution)
    ToolExecuted {
        run_id: RunId,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The quality gate evaluated a draft
    GateDecided {
        run_id: RunId,
        failed_criteria: Vec<String>,
        regenerated: bool,
        timestamp: DateTime<Utc>,
    },

    /// The router picked a handler
    Routed {
        run_id: RunId,
        category: String,
        complexity: String,
        tier: String,
        timestamp: DateTime<Utc>,
    },

    /// One orchestrated task finished
    TaskCompleted {
        run_id: RunId,
        file_path: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },

    /// A pattern run ended
    RunFinished {
        run_id: RunId,
        pattern: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            Self::ModelInvoked { run_id, .. }
            | Self::ModelFailed { run_id, .. }
            | Self::ToolExecuted { run_id, .. }
            | Self::GateDecided { run_id, .. }
            | Self::Routed { run_id, .. }
            | Self::TaskCompleted { run_id, .. }
            | Self::RunFinished { run_id, .. } => *run_id,
        }
    }
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
