//! Shared test helpers for pattern tests.

use clawflow_core::error::ModelError;
use clawflow_core::model::{ModelClient, ModelRequest, ModelResponse};
use clawflow_core::tool::ToolCall;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted model reply, optionally delayed.
#[derive(Clone)]
pub struct Reply {
    result: Result<ModelResponse, ModelError>,
    delay: Option<Duration>,
}

impl Reply {
    /// Sleep for `delay` before answering.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

pub fn text(text: &str) -> Reply {
    Reply {
        result: Ok(ModelResponse::Text(text.to_string())),
        delay: None,
    }
}

pub fn object(value: serde_json::Value) -> Reply {
    Reply {
        result: Ok(ModelResponse::Object(value)),
        delay: None,
    }
}

pub fn tool_calls(calls: Vec<ToolCall>) -> Reply {
    Reply {
        result: Ok(ModelResponse::ToolInvocation(calls)),
        delay: None,
    }
}

pub fn fail(error: ModelError) -> Reply {
    Reply {
        result: Err(error),
        delay: None,
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, args)
}

type Matcher = Box<dyn Fn(&ModelRequest) -> bool + Send + Sync>;

/// A mock model client driven by a script.
///
/// Requests matching a rule (checked in insertion order) get that rule's
/// reply every time; all other requests consume the queue in order. Panics
/// if the queue runs dry. Rules make concurrent tests deterministic, since
/// branch completion order is not.
pub struct ScriptedModel {
    rules: Vec<(Matcher, Reply)>,
    queue: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            rules: Vec::new(),
            queue: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Give the same reply to every request, forever.
    pub fn repeating(reply: Reply) -> Self {
        let mut model = Self::new(Vec::new());
        model.rules.push((Box::new(|_| true), reply));
        model
    }

    /// Answer every request whose system instruction equals `system`.
    pub fn when_system(mut self, system: &str, reply: Reply) -> Self {
        let system = system.to_string();
        self.rules
            .push((Box::new(move |r| r.system() == Some(system.as_str())), reply));
        self
    }

    /// Answer every request whose last message contains `needle`.
    pub fn when_prompt_contains(mut self, needle: &str, reply: Reply) -> Self {
        let needle = needle.to_string();
        self.rules.push((
            Box::new(move |r| r.messages().last().is_some_and(|m| m.content.contains(&needle))),
            reply,
        ));
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received, in arrival order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let reply = match self.rules.iter().find(|(matches, _)| matches(&request)) {
            Some((_, reply)) => reply.clone(),
            None => {
                let mut queue = self.queue.lock().unwrap();
                match queue.pop_front() {
                    Some(reply) => reply,
                    None => panic!(
                        "ScriptedModel: no more responses (call #{})",
                        self.call_count() + 1
                    ),
                }
            }
        };
        self.requests.lock().unwrap().push(request);

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        reply.result
    }
}
