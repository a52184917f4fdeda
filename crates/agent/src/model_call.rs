//! Timed model invocation shared by every pattern.
//!
//! [`ModelCaller`] wraps a [`ModelClient`] with the configured timeout and
//! publishes a domain event per call. An elapsed timeout is reported as
//! [`ModelError::Timeout`]; the core never retries.

use chrono::Utc;
use clawflow_config::AppConfig;
use clawflow_core::error::{Error, ModelError};
use clawflow_core::event::{DomainEvent, EventBus, RunId};
use clawflow_core::model::{ModelClient, ModelRequest, ModelResponse};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A shared, cheaply cloneable handle for making bounded model calls.
#[derive(Clone)]
pub struct ModelCaller {
    client: Arc<dyn ModelClient>,
    timeout: Duration,
    events: Option<Arc<EventBus>>,
}

impl ModelCaller {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            events: None,
        }
    }

    /// Build a caller with the model timeout from configuration.
    pub fn from_config(client: Arc<dyn ModelClient>, config: &AppConfig) -> Self {
        Self::new(client).with_timeout(config.timeouts.model())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Publish call events to `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Invoke the model once, bounded by the configured timeout.
    pub async fn invoke(
        &self,
        run_id: RunId,
        stage: &str,
        request: ModelRequest,
    ) -> Result<ModelResponse, ModelError> {
        let start = Instant::now();
        let outcome = match tokio::time::timeout(self.timeout, self.client.invoke(request)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(response) => {
                debug!(%run_id, stage, kind = response.kind(), duration_ms, "Model call completed");
                self.publish(DomainEvent::ModelInvoked {
                    run_id,
                    stage: stage.to_string(),
                    response_kind: response.kind().to_string(),
                    duration_ms,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                warn!(%run_id, stage, error = %e, "Model call failed");
                self.publish(DomainEvent::ModelFailed {
                    run_id,
                    stage: stage.to_string(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
        outcome
    }

    /// Invoke and require a text response.
    pub async fn text(&self, run_id: RunId, stage: &str, request: ModelRequest) -> Result<String, ModelError> {
        self.invoke(run_id, stage, request).await?.into_text()
    }

    /// Invoke and require a structured object response.
    pub async fn object(
        &self,
        run_id: RunId,
        stage: &str,
        request: ModelRequest,
    ) -> Result<serde_json::Value, ModelError> {
        self.invoke(run_id, stage, request).await?.into_object()
    }

    pub(crate) fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

impl std::fmt::Debug for ModelCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCaller")
            .field("client", &self.client.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Map a model failure to the pattern stage it happened in.
pub(crate) fn stage_error(stage: &'static str) -> impl FnOnce(ModelError) -> Error {
    move |source| Error::Stage { stage, source }
}

/// Reject an object that does not match `schema`.
pub(crate) fn check_output(
    schema: &serde_json::Value,
    value: serde_json::Value,
) -> Result<serde_json::Value, ModelError> {
    clawflow_core::schema::validate(schema, &value)
        .map_err(|e| ModelError::Rejected(format!("output does not match schema: {e}")))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::test_helpers::*;

    #[tokio::test(start_paused = true)]
    async fn slow_model_times_out() {
        let model = Arc::new(ScriptedModel::new(vec![
            text("too late").after(Duration::from_secs(30)),
        ]));
        let caller = ModelCaller::new(model).with_timeout(Duration::from_secs(5));

        let err = caller
            .invoke(RunId::new(), "draft", ModelRequest::from_prompt("hi"))
            .await
            .unwrap_err();
        assert_eq!(err, ModelError::Timeout { timeout_ms: 5000 });
    }

    #[tokio::test]
    async fn events_are_published_per_call() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let model = Arc::new(ScriptedModel::new(vec![
            text("ok"),
            fail(ModelError::Unavailable("503".into())),
        ]));
        let caller = ModelCaller::new(model).with_event_bus(bus);
        let run_id = RunId::new();

        caller.invoke(run_id, "a", ModelRequest::from_prompt("1")).await.unwrap();
        caller.invoke(run_id, "b", ModelRequest::from_prompt("2")).await.unwrap_err();

        assert!(matches!(rx.recv().await.unwrap().as_ref(), DomainEvent::ModelInvoked { stage, .. } if stage == "a"));
        assert!(matches!(rx.recv().await.unwrap().as_ref(), DomainEvent::ModelFailed { stage, .. } if stage == "b"));
    }

    #[tokio::test]
    async fn shape_helpers_reject_mismatches() {
        let model = Arc::new(ScriptedModel::new(vec![object(serde_json::json!({"a": 1}))]));
        let caller = ModelCaller::new(model);
        let err = caller
            .text(RunId::new(), "respond", ModelRequest::from_prompt("q"))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Rejected(_)));
    }
}
