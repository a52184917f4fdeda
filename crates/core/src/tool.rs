//! Tool trait: the abstraction over model-invocable capabilities.
//!
//! A tool declares a JSON input schema and an execution function. The
//! [`ToolRegistry`] validates every call against that schema before the
//! function runs, and folds every failure (unknown tool, bad arguments,
//! execution error, timeout) into a [`ToolResult`] so the tool loop never
//! aborts on a tool-level problem.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{RegistryError, ToolError};
use crate::model::ToolDefinition;
use crate::schema;

/// A request to execute a tool, as produced by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool call id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Raw arguments; unvalidated until the registry checks them
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Why a tool call produced no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailureKind {
    /// Arguments failed the tool's input schema; the tool never ran.
    Validation,
    /// The tool ran and reported an error.
    Execution,
    /// No tool with that name is registered.
    NotFound,
    /// The tool did not finish within the configured timeout.
    Timeout,
}

/// A typed failure payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ToolFailureKind,
    pub message: String,
}

/// What a tool call produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { output: serde_json::Value },
    Failure(ToolFailure),
}

/// The result of one tool call, correlated 1:1 with the call by `call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// The tool that was (or would have been) invoked
    pub tool_name: String,

    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(call: &ToolCall, output: serde_json::Value) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            outcome: ToolOutcome::Success { output },
        }
    }

    pub fn failure(call: &ToolCall, kind: ToolFailureKind, message: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            outcome: ToolOutcome::Failure(ToolFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success { .. })
    }

    /// The success payload, if any.
    pub fn output(&self) -> Option<&serde_json::Value> {
        match &self.outcome {
            ToolOutcome::Success { output } => Some(output),
            ToolOutcome::Failure(_) => None,
        }
    }

    /// The failure kind, if any.
    pub fn failure_kind(&self) -> Option<ToolFailureKind> {
        match &self.outcome {
            ToolOutcome::Success { .. } => None,
            ToolOutcome::Failure(f) => Some(f.kind),
        }
    }

    /// Render the outcome as the content of a tool-result message.
    pub fn to_message_content(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success { output } => match output {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            ToolOutcome::Failure(f) => serde_json::json!({ "error": f }).to_string(),
        }
    }
}

/// The core Tool trait.
///
/// `execute` only ever sees arguments that passed `parameters_schema`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "count_letter").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with validated arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

struct RegisteredTool {
    tool: Box<dyn Tool>,
    schema: serde_json::Value,
}

/// Collects tools and checks them before a registry exists.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: BTreeMap<String, RegisteredTool>,
    timeout: Option<Duration>,
}

impl ToolRegistryBuilder {
    /// Register a tool. Fails on a duplicate name or an unusable schema.
    pub fn register(mut self, tool: Box<dyn Tool>) -> Result<Self, RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        let schema = tool.parameters_schema();
        schema::check_object_schema(&schema).map_err(|reason| RegistryError::InvalidSchema {
            tool_name: name.clone(),
            reason,
        })?;
        self.tools.insert(name, RegisteredTool { tool, schema });
        Ok(self)
    }

    /// Bound every tool execution by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            tools: self.tools,
            timeout: self.timeout,
        }
    }
}

/// A read-only registry of available tools.
///
/// There is no way to add or remove tools once built, so a registry shared
/// behind an `Arc` cannot change during a run.
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
    timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// An empty registry.
    pub fn empty() -> Self {
        ToolRegistryBuilder::default().build()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.tool.as_ref())
    }

    /// Get all tool definitions (for sending to the model), ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.tool.to_definition()).collect()
    }

    /// List all registered tool names, ordered.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The bound applied to every execution, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Validate a call's arguments against the named tool's schema.
    pub fn validate(&self, call: &ToolCall) -> Result<(), ToolResult> {
        let Some(entry) = self.tools.get(&call.name) else {
            return Err(ToolResult::failure(
                call,
                ToolFailureKind::NotFound,
                format!("no tool named '{}'", call.name),
            ));
        };
        schema::validate(&entry.schema, &call.arguments).map_err(|e| {
            ToolResult::failure(call, ToolFailureKind::Validation, e.to_string())
        })
    }

    /// Validate and execute a tool call. Never fails: every problem is
    /// reported inside the returned [`ToolResult`].
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        if let Err(rejected) = self.validate(call) {
            warn!(tool = %call.name, call_id = %call.id, "Tool call rejected before execution");
            return rejected;
        }
        let Some(entry) = self.tools.get(&call.name) else {
            return ToolResult::failure(call, ToolFailureKind::NotFound, call.name.clone());
        };

        let run = entry.tool.execute(call.arguments.clone());
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => Err(ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_ms: limit.as_millis() as u64,
                }),
            },
            None => run.await,
        };

        match result {
            Ok(output) => {
                debug!(tool = %call.name, call_id = %call.id, "Tool executed");
                ToolResult::success(call, output)
            }
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool execution failed");
                let kind = match e {
                    ToolError::Timeout { .. } => ToolFailureKind::Timeout,
                    ToolError::NotFound(_) => ToolFailureKind::NotFound,
                    ToolError::InvalidArguments(_) => ToolFailureKind::Validation,
                    ToolError::ExecutionFailed { .. } => ToolFailureKind::Execution,
                };
                ToolResult::failure(call, kind, e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string", "maxLength": 20 }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            match arguments["text"].as_str() {
                Some("boom") => Err(ToolError::ExecutionFailed {
                    tool_name: "echo".into(),
                    reason: "exploded".into(),
                }),
                Some(text) => Ok(serde_json::json!(text)),
                None => Err(ToolError::InvalidArguments("missing text".into())),
            }
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Sleeps for a minute"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(serde_json::Value::Null)
        }
    }

    struct BadSchemaTool;

    #[async_trait]
    impl Tool for BadSchemaTool {
        fn name(&self) -> &str {
            "bad"
        }
        fn description(&self) -> &str {
            "Declares a non-object schema"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "string"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            Ok(serde_json::Value::Null)
        }
    }

    fn echo_registry() -> ToolRegistry {
        ToolRegistry::builder().register(Box::new(EchoTool)).unwrap().build()
    }

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall::new("call_1", "echo", args)
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = echo_registry();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn registry_rejects_duplicates_and_bad_schemas() {
        let dup = ToolRegistry::builder()
            .register(Box::new(EchoTool))
            .unwrap()
            .register(Box::new(EchoTool));
        assert!(matches!(dup, Err(RegistryError::DuplicateTool(name)) if name == "echo"));

        let bad = ToolRegistry::builder().register(Box::new(BadSchemaTool));
        assert!(matches!(bad, Err(RegistryError::InvalidSchema { .. })));
    }

    #[test]
    fn registry_definitions() {
        let defs = echo_registry().definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let result = echo_registry().execute(&call(serde_json::json!({"text": "hello world"}))).await;
        assert!(result.is_success());
        assert_eq!(result.call_id, "call_1");
        assert_eq!(result.output(), Some(&serde_json::json!("hello world")));
        assert_eq!(result.to_message_content(), "hello world");
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_the_tool() {
        let result = echo_registry().execute(&call(serde_json::json!({"text": "boom".repeat(10)}))).await;
        assert_eq!(result.failure_kind(), Some(ToolFailureKind::Validation));
    }

    #[tokio::test]
    async fn execution_errors_become_results() {
        let result = echo_registry().execute(&call(serde_json::json!({"text": "boom"}))).await;
        assert_eq!(result.failure_kind(), Some(ToolFailureKind::Execution));
        assert!(result.to_message_content().contains("exploded"));
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = ToolRegistry::empty();
        let result = registry
            .execute(&ToolCall::new("call_1", "nonexistent", serde_json::json!({})))
            .await;
        assert_eq!(result.failure_kind(), Some(ToolFailureKind::NotFound));
        assert_eq!(result.tool_name, "nonexistent");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let registry = ToolRegistry::builder()
            .register(Box::new(SlowTool))
            .unwrap()
            .with_timeout(Duration::from_millis(50))
            .build();
        let result = registry
            .execute(&ToolCall::new("call_1", "slow", serde_json::json!({})))
            .await;
        assert_eq!(result.failure_kind(), Some(ToolFailureKind::Timeout));
        assert_eq!(registry.timeout(), Some(Duration::from_millis(50)));
        assert_eq!(ToolRegistry::empty().timeout(), None);
    }
}
