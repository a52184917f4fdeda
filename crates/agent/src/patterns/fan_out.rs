//! Fan-out aggregator: concurrent reviewers, all-or-nothing join, one
//! synthesis call.
//!
//! Each reviewer sees only the input and its own instruction; no reviewer
//! sees another's output. If any reviewer fails (model error, timeout, or
//! output that does not match its schema) the in-flight peers are dropped
//! and no synthesis call is made.

use chrono::Utc;
use clawflow_config::AppConfig;
use clawflow_core::error::{Error, ModelError};
use clawflow_core::event::{DomainEvent, RunId};
use clawflow_core::model::{ModelRequest, OutputSchema};
use clawflow_core::schema;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;

use crate::model_call::{ModelCaller, check_output, stage_error};
use crate::patterns::task_group;

/// One specialised reviewer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewerSpec {
    pub name: String,
    pub system_instruction: String,
    pub output_schema: serde_json::Value,
}

impl ReviewerSpec {
    pub fn new(
        name: impl Into<String>,
        system_instruction: impl Into<String>,
        output_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            system_instruction: system_instruction.into(),
            output_schema,
        }
    }

    /// The security, performance and maintainability code reviewers.
    pub fn default_reviewers() -> Vec<Self> {
        let levels = serde_json::json!(["low", "medium", "high"]);
        let strings = serde_json::json!({ "type": "array", "items": { "type": "string" } });
        vec![
            Self::new(
                "security",
                "You are an expert in code security. Focus on identifying security vulnerabilities, injection risks, and authentication issues.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "vulnerabilities": strings,
                        "risk_level": { "type": "string", "enum": levels },
                        "suggestions": strings
                    },
                    "required": ["vulnerabilities", "risk_level", "suggestions"]
                }),
            ),
            Self::new(
                "performance",
                "You are an expert in code performance. Focus on identifying performance bottlenecks, memory leaks, and optimization opportunities.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "issues": strings,
                        "impact": { "type": "string", "enum": levels },
                        "optimization": strings
                    },
                    "required": ["issues", "impact", "optimization"]
                }),
            ),
            Self::new(
                "maintainability",
                "You are an expert in code quality. Focus on code structure, readability, and adherence to best practices.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "concerns": strings,
                        "quality_score": { "type": "number", "minimum": 1, "maximum": 10 },
                        "recommendations": strings
                    },
                    "required": ["concerns", "quality_score", "recommendations"]
                }),
            ),
        ]
    }
}

/// A reviewer's schema-checked output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub reviewer: String,
    pub output: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    /// Reviews in reviewer declaration order.
    pub reviews: Vec<Review>,
    pub summary: String,
}

impl AggregateResult {
    /// Look up a review by reviewer name.
    pub fn review(&self, reviewer: &str) -> Option<&serde_json::Value> {
        self.reviews
            .iter()
            .find(|r| r.reviewer == reviewer)
            .map(|r| &r.output)
    }
}

pub struct FanOutAggregator {
    caller: ModelCaller,
    reviewers: Vec<ReviewerSpec>,
    max_concurrency: usize,
    synthesis_instruction: String,
}

impl FanOutAggregator {
    /// Reviewer names must be unique, the list non-empty, and every output
    /// schema an object schema.
    pub fn new(caller: ModelCaller, reviewers: Vec<ReviewerSpec>, max_concurrency: usize) -> Result<Self, Error> {
        if reviewers.is_empty() {
            return Err(Error::Config {
                message: "fan-out needs at least one reviewer".into(),
            });
        }
        if max_concurrency == 0 {
            return Err(Error::Config {
                message: "max_concurrency must be positive".into(),
            });
        }
        let mut names = BTreeSet::new();
        for reviewer in &reviewers {
            if !names.insert(reviewer.name.as_str()) {
                return Err(Error::Config {
                    message: format!("duplicate reviewer name '{}'", reviewer.name),
                });
            }
            schema::check_object_schema(&reviewer.output_schema).map_err(|reason| Error::Config {
                message: format!("reviewer '{}': {reason}", reviewer.name),
            })?;
        }
        Ok(Self {
            caller,
            reviewers,
            max_concurrency,
            synthesis_instruction: clawflow_config::FanOutConfig::default().synthesis_instruction,
        })
    }

    pub fn from_config(caller: ModelCaller, reviewers: Vec<ReviewerSpec>, config: &AppConfig) -> Result<Self, Error> {
        Ok(Self::new(caller, reviewers, config.concurrency.max_concurrency)?
            .with_synthesis_instruction(config.fan_out.synthesis_instruction.clone()))
    }

    pub fn with_synthesis_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.synthesis_instruction = instruction.into();
        self
    }

    pub fn reviewers(&self) -> &[ReviewerSpec] {
        &self.reviewers
    }

    pub async fn run(&self, input: &str) -> Result<AggregateResult, Error> {
        let run_id = RunId::new();
        info!(%run_id, reviewers = self.reviewers.len(), "Fan-out starting");

        let branches = self.reviewers.iter().map(|spec| self.review(run_id, spec, input));
        let reviews = match task_group::all_or_nothing(branches, self.max_concurrency).await {
            Ok(reviews) => reviews,
            Err(e) => {
                self.finish(run_id, false);
                return Err(e);
            }
        };

        let combined: serde_json::Map<String, serde_json::Value> = reviews
            .iter()
            .map(|r| (r.reviewer.clone(), r.output.clone()))
            .collect();
        let prompt = format!(
            "Synthesize these code review results into a concise summary with key actions:\n{}",
            serde_json::to_string_pretty(&combined)?
        );
        let summary = self
            .caller
            .text(
                run_id,
                "synthesize",
                ModelRequest::from_prompt(prompt).with_system(self.synthesis_instruction.clone()),
            )
            .await
            .map_err(stage_error("synthesize"))?;

        self.finish(run_id, true);
        Ok(AggregateResult { reviews, summary })
    }

    async fn review(&self, run_id: RunId, spec: &ReviewerSpec, input: &str) -> Result<Review, Error> {
        let request = ModelRequest::from_prompt(format!("Review this code:\n{input}"))
            .with_system(spec.system_instruction.clone())
            .with_output_schema(OutputSchema::new(spec.name.clone(), spec.output_schema.clone()));

        let output = async {
            let value = self.caller.object(run_id, &spec.name, request).await?;
            check_output(&spec.output_schema, value)
        }
        .await
        .map_err(|source: ModelError| Error::AggregationPartialFailure {
            reviewer: spec.name.clone(),
            source,
        })?;

        Ok(Review {
            reviewer: spec.name.clone(),
            output,
        })
    }

    fn finish(&self, run_id: RunId, success: bool) {
        self.caller.publish(DomainEvent::RunFinished {
            run_id,
            pattern: "fan_out".into(),
            success,
            timestamp: Utc::now(),
        });
    }
}
