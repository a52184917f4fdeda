//! Step log: the append-only record of one tool-loop run.
//!
//! Each entry holds the request sent, the response received, and the tool
//! calls and results of that step. The log is bounded by the loop's step
//! limit and refuses appends beyond it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ModelRequest, ModelResponse};
use crate::tool::{ToolCall, ToolResult};

/// One request/response cycle, plus any tool exchange it triggered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEntry {
    /// 1-based position in the log; assigned on append.
    pub index: usize,
    pub request: ModelRequest,
    pub response: ModelResponse,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl StepEntry {
    pub fn new(request: ModelRequest, response: ModelResponse, started_at: DateTime<Utc>) -> Self {
        Self {
            index: 0,
            request,
            response,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            started_at,
            duration_ms: 0,
        }
    }

    pub fn with_tool_exchange(mut self, calls: Vec<ToolCall>, results: Vec<ToolResult>) -> Self {
        self.tool_calls = calls;
        self.tool_results = results;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("step log is full ({limit} steps)")]
pub struct StepLogFull {
    pub limit: usize,
}

/// Append-only ordered record of a run, bounded by `limit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepLog {
    limit: usize,
    entries: Vec<StepEntry>,
}

impl StepLog {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: Vec::with_capacity(limit.min(64)),
        }
    }

    /// Append an entry, assigning its index.
    pub fn record(&mut self, mut entry: StepEntry) -> Result<&StepEntry, StepLogFull> {
        if self.is_full() {
            return Err(StepLogFull { limit: self.limit });
        }
        entry.index = self.entries.len() + 1;
        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.limit
    }

    pub fn entries(&self) -> &[StepEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&StepEntry> {
        self.entries.last()
    }

    /// The most recent step that executed at least one tool.
    pub fn last_step_with_results(&self) -> Option<&StepEntry> {
        self.entries.iter().rev().find(|e| !e.tool_results.is_empty())
    }

    /// Results of the most recent step that executed tools, in call order.
    /// Empty when no step executed a tool.
    pub fn last_tool_results(&self) -> &[ToolResult] {
        self.last_step_with_results()
            .map(|e| e.tool_results.as_slice())
            .unwrap_or_default()
    }

    /// Every tool result of the run, in execution order.
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.entries.iter().flat_map(|e| e.tool_results.iter())
    }

    pub fn tool_call_count(&self) -> usize {
        self.entries.iter().map(|e| e.tool_calls.len()).sum()
    }
}
