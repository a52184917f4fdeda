//! Chat relay: one model turn over a plain `{role, content}` wire format.
//!
//! A request body is the conversation so far. The response body carries only
//! the messages the model appended in this turn, never the echoed history.
//! No transport is bound here; callers feed bodies in from wherever they
//! arrive.

use clawflow_core::error::ModelError;
use clawflow_core::event::RunId;
use clawflow_core::message::{Message, Role};
use clawflow_core::model::{ModelRequest, ModelResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model_call::ModelCaller;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A message as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        Message {
            role: wire.role,
            content: wire.content,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Parse a request body. Unknown roles and missing fields are invalid.
pub fn decode(body: &str) -> Result<Vec<Message>, RelayError> {
    let wire: Vec<WireMessage> =
        serde_json::from_str(body).map_err(|e| RelayError::InvalidBody(e.to_string()))?;
    Ok(wire.into_iter().map(Message::from).collect())
}

pub fn encode(messages: &[Message]) -> Result<String, RelayError> {
    let wire: Vec<WireMessage> = messages.iter().map(WireMessage::from).collect();
    Ok(serde_json::to_string(&wire)?)
}

/// Run one model turn over `history` and return the appended messages.
pub async fn handle_turn(model: &ModelCaller, history: Vec<Message>) -> Result<Vec<Message>, RelayError> {
    if history.is_empty() {
        return Err(RelayError::InvalidBody("conversation is empty".into()));
    }
    let run_id = RunId::new();
    debug!(%run_id, messages = history.len(), "Relaying chat turn");

    let reply = match model.invoke(run_id, "relay", ModelRequest::new(history)).await? {
        ModelResponse::Text(text) => text,
        ModelResponse::Object(value) => value.to_string(),
        ModelResponse::ToolInvocation(_) => {
            return Err(ModelError::Rejected("relay turns cannot invoke tools".into()).into());
        }
    };
    Ok(vec![Message::assistant(reply)])
}

/// Decode a body, run one turn, and encode the new messages.
pub async fn handle_body(model: &ModelCaller, body: &str) -> Result<String, RelayError> {
    let history = decode(body)?;
    let appended = handle_turn(model, history).await?;
    encode(&appended)
}
