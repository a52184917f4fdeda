//! Model client trait: the abstraction over language-model inference.
//!
//! A [`ModelClient`] takes an immutable [`ModelRequest`] and returns exactly
//! one kind of [`ModelResponse`]: free text, a structured object, or a
//! request to invoke tools. The transport (HTTP, local inference, a test
//! script) is the implementation's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::message::Message;
use crate::tool::ToolCall;

/// Which class of model should serve a request.
///
/// The client maps a tier to a concrete model name; the core only chooses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Cheap, low-latency model.
    #[default]
    Fast,
    /// Slower model with stronger reasoning.
    Reasoning,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Reasoning => "reasoning",
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool definition sent to the model so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A named JSON schema the model's object output must conform to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// A request to the model.
///
/// Fields are private: a request is assembled with the consuming `with_*`
/// builders and is read-only afterwards. Follow-up requests are derived with
/// [`ModelRequest::followed_by`], which leaves the original untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    messages: Vec<Message>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    system: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_schema: Option<OutputSchema>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    tier: Option<ModelTier>,
}

impl ModelRequest {
    /// Create a request from an ordered list of messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            system: None,
            tools: Vec::new(),
            output_schema: None,
            tier: None,
        }
    }

    /// Create a single-turn request from a user prompt.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self::new(vec![Message::user(prompt)])
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.tier = Some(tier);
        self
    }

    /// Derive a new request with extra messages appended; everything else is
    /// carried over.
    pub fn followed_by(&self, extra: impl IntoIterator<Item = Message>) -> Self {
        let mut next = self.clone();
        next.messages.extend(extra);
        next
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn output_schema(&self) -> Option<&OutputSchema> {
        self.output_schema.as_ref()
    }

    pub fn tier(&self) -> Option<ModelTier> {
        self.tier
    }
}

/// A model response. Exactly one variant is populated per response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ModelResponse {
    Text(String),
    Object(serde_json::Value),
    ToolInvocation(Vec<ToolCall>),
}

impl ModelResponse {
    /// Short label for logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Object(_) => "object",
            Self::ToolInvocation(_) => "tool_invocation",
        }
    }

    /// Expect free text; any other variant is a shape mismatch.
    pub fn into_text(self) -> Result<String, ModelError> {
        match self {
            Self::Text(text) => Ok(text),
            other => Err(ModelError::Rejected(format!(
                "expected a text response, got {}",
                other.kind()
            ))),
        }
    }

    /// Expect a structured object; any other variant is a shape mismatch.
    pub fn into_object(self) -> Result<serde_json::Value, ModelError> {
        match self {
            Self::Object(value) => Ok(value),
            other => Err(ModelError::Rejected(format!(
                "expected a structured object, got {}",
                other.kind()
            ))),
        }
    }
}

/// The model client capability.
///
/// Implementations must be reentrant: the fan-out and orchestrator patterns
/// share one client across concurrently running branches.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (e.g., "openai", "scripted").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}
