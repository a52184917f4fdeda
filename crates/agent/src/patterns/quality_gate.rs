//! Sequential gate pipeline: draft, evaluate, regenerate at most once.
//!
//! The evaluation call returns a metrics object whose schema is derived
//! from the rubric. If every criterion passes, the draft is returned as is.
//! Otherwise one rewrite is requested, listing only the failing criteria's
//! instruction lines, and its output is returned without re-evaluation.

use chrono::Utc;
use clawflow_config::{AppConfig, QualityCriterion, QualityGateConfig, Threshold};
use clawflow_core::error::{Error, ModelError};
use clawflow_core::event::{DomainEvent, RunId};
use clawflow_core::model::{ModelRequest, OutputSchema};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;

use crate::model_call::{ModelCaller, check_output, stage_error};

/// Named metric values returned by the evaluation call.
pub type QualityMetrics = serde_json::Map<String, serde_json::Value>;

/// The criteria a draft is held to.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityRubric {
    criteria: Vec<QualityCriterion>,
}

impl QualityRubric {
    /// Build a rubric; it must have at least one criterion and no metric
    /// may appear twice.
    pub fn new(criteria: Vec<QualityCriterion>) -> Result<Self, Error> {
        if criteria.is_empty() {
            return Err(Error::Config {
                message: "quality rubric needs at least one criterion".into(),
            });
        }
        let mut seen = BTreeSet::new();
        for criterion in &criteria {
            if !seen.insert(criterion.metric.as_str()) {
                return Err(Error::Config {
                    message: format!("duplicate quality metric '{}'", criterion.metric),
                });
            }
        }
        Ok(Self { criteria })
    }

    pub fn from_config(config: &QualityGateConfig) -> Result<Self, Error> {
        Self::new(config.criteria.clone())
    }

    pub fn criteria(&self) -> &[QualityCriterion] {
        &self.criteria
    }

    /// Output schema for the evaluation call: one required property per
    /// criterion, boolean for flags and a 1-10 score otherwise.
    pub fn evaluation_schema(&self) -> OutputSchema {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .criteria
            .iter()
            .map(|c| {
                let schema = match c.threshold {
                    Threshold::Flag { .. } => serde_json::json!({ "type": "boolean" }),
                    Threshold::AtLeast { .. } => {
                        serde_json::json!({ "type": "number", "minimum": 1, "maximum": 10 })
                    }
                };
                (c.metric.clone(), schema)
            })
            .collect();
        let required: Vec<&str> = self.criteria.iter().map(|c| c.metric.as_str()).collect();
        OutputSchema::new(
            "quality_metrics",
            serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required
            }),
        )
    }

    /// Criteria the metrics fail, in rubric order.
    ///
    /// A missing or mistyped metric is a rejected model output, never a
    /// silent pass or fail.
    pub fn failing<'a>(&'a self, metrics: &QualityMetrics) -> Result<Vec<&'a QualityCriterion>, ModelError> {
        let mut failing = Vec::new();
        for criterion in &self.criteria {
            let value = metrics.get(&criterion.metric).ok_or_else(|| {
                ModelError::Rejected(format!("evaluation is missing metric '{}'", criterion.metric))
            })?;
            let passes = match criterion.threshold {
                Threshold::Flag { expected } => value.as_bool().map(|v| v == expected),
                Threshold::AtLeast { min } => value.as_f64().map(|v| v >= min),
            }
            .ok_or_else(|| {
                ModelError::Rejected(format!(
                    "metric '{}' has the wrong type: {value}",
                    criterion.metric
                ))
            })?;
            if !passes {
                failing.push(criterion);
            }
        }
        Ok(failing)
    }
}

impl Default for QualityRubric {
    fn default() -> Self {
        Self {
            criteria: QualityGateConfig::default().criteria,
        }
    }
}

/// What the gate produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateResult {
    /// The draft if it passed, otherwise the single rewrite.
    pub artifact: String,
    /// The metrics of the first draft.
    pub metrics: QualityMetrics,
    /// Metric names that failed, in rubric order.
    pub failed_criteria: Vec<String>,
    pub regenerated: bool,
}

/// Draft → evaluate → at most one regeneration.
pub struct QualityGate {
    caller: ModelCaller,
    rubric: QualityRubric,
    draft_instruction: String,
}

impl QualityGate {
    pub fn new(caller: ModelCaller, rubric: QualityRubric, draft_instruction: impl Into<String>) -> Self {
        Self {
            caller,
            rubric,
            draft_instruction: draft_instruction.into(),
        }
    }

    pub fn from_config(caller: ModelCaller, config: &AppConfig) -> Result<Self, Error> {
        let rubric = QualityRubric::from_config(&config.quality_gate)?;
        Ok(Self::new(caller, rubric, config.quality_gate.draft_instruction.clone()))
    }

    pub fn rubric(&self) -> &QualityRubric {
        &self.rubric
    }

    pub async fn run(&self, input: &str) -> Result<GateResult, Error> {
        let run_id = RunId::new();

        let result = self.gate(run_id, input).await;
        self.caller.publish(DomainEvent::RunFinished {
            run_id,
            pattern: "quality_gate".into(),
            success: result.is_ok(),
            timestamp: Utc::now(),
        });
        result
    }

    async fn gate(&self, run_id: RunId, input: &str) -> Result<GateResult, Error> {
        let draft = self
            .caller
            .text(
                run_id,
                "draft",
                ModelRequest::from_prompt(format!("{}\n\n{input}", self.draft_instruction)),
            )
            .await
            .map_err(stage_error("draft"))?;

        let metrics = self.evaluate(run_id, &draft).await.map_err(stage_error("evaluate"))?;
        let failing = self.rubric.failing(&metrics).map_err(stage_error("evaluate"))?;
        let failed_criteria: Vec<String> = failing.iter().map(|c| c.metric.clone()).collect();
        let regenerated = !failing.is_empty();

        info!(%run_id, failed = ?failed_criteria, regenerated, "Quality gate decided");
        self.caller.publish(DomainEvent::GateDecided {
            run_id,
            failed_criteria: failed_criteria.clone(),
            regenerated,
            timestamp: Utc::now(),
        });

        let artifact = if regenerated {
            self.caller
                .text(run_id, "regenerate", rewrite_request(&failing, &draft))
                .await
                .map_err(stage_error("regenerate"))?
        } else {
            draft
        };

        Ok(GateResult {
            artifact,
            metrics,
            failed_criteria,
            regenerated,
        })
    }

    async fn evaluate(&self, run_id: RunId, draft: &str) -> Result<QualityMetrics, ModelError> {
        let mut prompt = String::from("Evaluate this copy for:\n");
        for (i, c) in self.rubric.criteria.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, c.description));
        }
        prompt.push_str(&format!("\nCopy to evaluate: {draft}"));

        let schema = self.rubric.evaluation_schema();
        let request = ModelRequest::from_prompt(prompt).with_output_schema(schema.clone());
        let value = self.caller.object(run_id, "evaluate", request).await?;
        match check_output(&schema.schema, value)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(ModelError::Rejected(format!(
                "evaluation must be an object, got {other}"
            ))),
        }
    }
}

fn rewrite_request(failing: &[&QualityCriterion], draft: &str) -> ModelRequest {
    let mut prompt = String::from("Rewrite this copy with:\n");
    for c in failing {
        prompt.push_str(&format!("- {}\n", c.instruction));
    }
    prompt.push_str(&format!("\nOriginal copy: {draft}"));
    ModelRequest::from_prompt(prompt)
}
