//! Tool-call loop: model → tools → model, until a final answer.
//!
//! Every request carries the registry's tool catalog. When the model asks
//! for tools, all calls of that step run concurrently, each result is
//! correlated to its call by id, and the next request is the previous
//! messages plus the assistant's tool-call message plus one tool-result
//! message per call.
//!
//! The loop makes at most `max_steps` model calls. Running out of steps is
//! not an error: the caller gets [`LoopOutcome::BoundExceeded`] with the
//! full [`StepLog`] and decides what to make of the partial work.

use chrono::Utc;
use clawflow_config::AppConfig;
use clawflow_core::error::{Error, ModelError};
use clawflow_core::event::{DomainEvent, RunId};
use clawflow_core::message::Message;
use clawflow_core::model::{ModelRequest, ModelResponse};
use clawflow_core::step_log::{StepEntry, StepLog};
use clawflow_core::tool::{ToolCall, ToolRegistry, ToolResult};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::model_call::ModelCaller;

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// About to call the model.
    Pending,
    /// Waiting on tool executions for the current step.
    AwaitingTool,
    Done,
    BoundExceeded,
}

/// How a run ended without a model error.
#[derive(Debug, Clone)]
pub enum LoopOutcome {
    /// The model produced a final answer.
    Done { answer: String, log: StepLog },
    /// `max_steps` model calls were made without a final answer.
    BoundExceeded { log: StepLog },
}

impl LoopOutcome {
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Done { answer, .. } => Some(answer),
            Self::BoundExceeded { .. } => None,
        }
    }

    pub fn log(&self) -> &StepLog {
        match self {
            Self::Done { log, .. } | Self::BoundExceeded { log } => log,
        }
    }

    pub fn into_log(self) -> StepLog {
        match self {
            Self::Done { log, .. } | Self::BoundExceeded { log } => log,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// A bounded tool-calling loop over a fixed registry.
#[derive(Debug)]
pub struct ToolLoop {
    caller: ModelCaller,
    tools: Arc<ToolRegistry>,
    max_steps: usize,
    system_instruction: Option<String>,
}

impl ToolLoop {
    /// Create a loop. `max_steps` must be positive.
    pub fn new(caller: ModelCaller, tools: Arc<ToolRegistry>, max_steps: usize) -> Result<Self, Error> {
        if max_steps == 0 {
            return Err(Error::Config {
                message: "tool loop max_steps must be positive".into(),
            });
        }
        Ok(Self {
            caller,
            tools,
            max_steps,
            system_instruction: None,
        })
    }

    /// Create a loop from configuration. The registry must bound tool
    /// executions, e.g. one built with
    /// `default_registry_with_timeout(config.timeouts.tool())`.
    pub fn from_config(caller: ModelCaller, tools: Arc<ToolRegistry>, config: &AppConfig) -> Result<Self, Error> {
        if tools.timeout().is_none() && !tools.is_empty() {
            return Err(Error::Config {
                message: format!(
                    "tool registry has no execution timeout (timeouts.tool_secs = {})",
                    config.timeouts.tool_secs
                ),
            });
        }
        let mut tool_loop = Self::new(caller, tools, config.tool_loop.max_steps)?;
        tool_loop.system_instruction = config.tool_loop.system_instruction.clone();
        Ok(tool_loop)
    }

    /// Attach a system instruction to requests that do not carry one.
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Run the loop from a single user prompt.
    pub async fn run_prompt(&self, prompt: &str) -> Result<LoopOutcome, Error> {
        self.run(ModelRequest::from_prompt(prompt)).await
    }

    /// Run the loop until the model answers or the step bound is reached.
    pub async fn run(&self, initial_request: ModelRequest) -> Result<LoopOutcome, Error> {
        let run_id = RunId::new();
        let mut log = StepLog::new(self.max_steps);
        let mut state = LoopState::Pending;

        let mut request = initial_request.with_tools(self.tools.definitions());
        if request.system().is_none()
            && let Some(system) = &self.system_instruction
        {
            request = request.with_system(system.clone());
        }

        info!(%run_id, max_steps = self.max_steps, tools = self.tools.len(), "Tool loop starting");

        loop {
            if log.is_full() {
                transition(run_id, &mut state, LoopState::BoundExceeded);
                warn!(%run_id, steps = log.len(), "Tool loop reached its step bound");
                self.finish(run_id, false);
                return Ok(LoopOutcome::BoundExceeded { log });
            }

            let started_at = Utc::now();
            let start = Instant::now();
            let response = match self.caller.invoke(run_id, "tool_loop", request.clone()).await {
                Ok(response) => response,
                Err(source) => {
                    self.finish(run_id, false);
                    return Err(Error::ToolLoop {
                        source,
                        log: Box::new(log),
                    });
                }
            };

            // Text is the only successful terminal response.
            let answer = match &response {
                ModelResponse::Text(answer) => Some(answer.clone()),
                _ => None,
            };
            if let Some(answer) = answer {
                let entry = StepEntry::new(request, response, started_at)
                    .with_duration_ms(start.elapsed().as_millis() as u64);
                if log.record(entry).is_err() {
                    // Unreachable: fullness is checked before every call.
                    transition(run_id, &mut state, LoopState::BoundExceeded);
                    return Ok(LoopOutcome::BoundExceeded { log });
                }
                transition(run_id, &mut state, LoopState::Done);
                info!(%run_id, steps = log.len(), tool_calls = log.tool_call_count(), "Tool loop completed");
                self.finish(run_id, true);
                return Ok(LoopOutcome::Done { answer, log });
            }

            let calls = match &response {
                ModelResponse::ToolInvocation(calls) if !calls.is_empty() => calls.clone(),
                other => {
                    let reason = match other {
                        ModelResponse::Object(_) => "expected text or tool calls, got object",
                        _ => "tool invocation with no calls",
                    };
                    self.finish(run_id, false);
                    return Err(Error::ToolLoop {
                        source: ModelError::Rejected(reason.into()),
                        log: Box::new(log),
                    });
                }
            };

            transition(run_id, &mut state, LoopState::AwaitingTool);
            let results = join_all(calls.iter().map(|call| self.execute_tool(run_id, call))).await;

            let follow_up = std::iter::once(Message::assistant_tool_calls(calls.clone())).chain(
                results
                    .iter()
                    .map(|r| Message::tool_result(r.call_id.clone(), r.to_message_content())),
            );
            let next_request = request.followed_by(follow_up);

            let entry = StepEntry::new(request, response, started_at)
                .with_tool_exchange(calls, results)
                .with_duration_ms(start.elapsed().as_millis() as u64);
            if log.record(entry).is_err() {
                transition(run_id, &mut state, LoopState::BoundExceeded);
                return Ok(LoopOutcome::BoundExceeded { log });
            }

            request = next_request;
            transition(run_id, &mut state, LoopState::Pending);
        }
    }

    async fn execute_tool(&self, run_id: RunId, call: &ToolCall) -> ToolResult {
        let start = Instant::now();
        let result = self.tools.execute(call).await;
        self.caller.publish(DomainEvent::ToolExecuted {
            run_id,
            tool_name: call.name.clone(),
            success: result.is_success(),
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
        result
    }

    fn finish(&self, run_id: RunId, success: bool) {
        self.caller.publish(DomainEvent::RunFinished {
            run_id,
            pattern: "tool_loop".into(),
            success,
            timestamp: Utc::now(),
        });
    }
}

fn transition(run_id: RunId, state: &mut LoopState, next: LoopState) {
    debug!(%run_id, from = ?*state, to = ?next, "Tool loop transition");
    *state = next;
}
