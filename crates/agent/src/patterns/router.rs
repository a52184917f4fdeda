//! Router: classify a query, then answer it with the handler its class
//! selects.
//!
//! The routing table is total by construction: one field per category and
//! per complexity. A configuration that leaves a key out fails when the
//! table is built, never at lookup time.

use chrono::Utc;
use clawflow_config::{AppConfig, RouterConfig};
use clawflow_core::error::{Error, ModelError};
use clawflow_core::event::{DomainEvent, RunId};
use clawflow_core::model::{ModelRequest, ModelTier, OutputSchema};
use clawflow_core::taxonomy::{QueryCategory, QueryComplexity, enum_values};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model_call::{ModelCaller, check_output, stage_error};

/// The classifier's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: QueryCategory,
    pub complexity: QueryComplexity,
    pub reasoning: String,
}

impl Classification {
    pub fn output_schema() -> OutputSchema {
        OutputSchema::new(
            "classification",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "reasoning": { "type": "string" },
                    "category": { "type": "string", "enum": enum_values(&QueryCategory::ALL) },
                    "complexity": { "type": "string", "enum": enum_values(&QueryComplexity::ALL) }
                },
                "required": ["reasoning", "category", "complexity"]
            }),
        )
    }
}

/// System instruction per query category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInstructions {
    pub general: String,
    pub refund: String,
    pub technical: String,
}

impl CategoryInstructions {
    pub fn get(&self, category: QueryCategory) -> &str {
        match category {
            QueryCategory::General => &self.general,
            QueryCategory::Refund => &self.refund,
            QueryCategory::Technical => &self.technical,
        }
    }
}

/// Model tier per query complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierTable {
    pub simple: ModelTier,
    pub complex: ModelTier,
}

impl TierTable {
    pub fn get(&self, complexity: QueryComplexity) -> ModelTier {
        match complexity {
            QueryComplexity::Simple => self.simple,
            QueryComplexity::Complex => self.complex,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    pub instructions: CategoryInstructions,
    pub tiers: TierTable,
}

impl RoutingTable {
    /// Build the table from string-keyed configuration maps. Every category
    /// and complexity must be present with a non-empty instruction; unknown
    /// keys are rejected too.
    pub fn from_config(config: &RouterConfig) -> Result<Self, Error> {
        check_keys("router.instructions", config.instructions.keys(), &QueryCategory::ALL.map(|c| c.as_str()))?;
        check_keys("router.tiers", config.tiers.keys(), &QueryComplexity::ALL.map(|c| c.as_str()))?;

        let instruction = |category: QueryCategory| -> Result<String, Error> {
            match config.instructions.get(category.as_str()) {
                Some(text) if !text.trim().is_empty() => Ok(text.clone()),
                Some(_) => Err(Error::Config {
                    message: format!("router.instructions.{category} is empty"),
                }),
                None => Err(missing("router.instructions", category.as_str())),
            }
        };
        let tier = |complexity: QueryComplexity| -> Result<ModelTier, Error> {
            config
                .tiers
                .get(complexity.as_str())
                .copied()
                .ok_or_else(|| missing("router.tiers", complexity.as_str()))
        };

        Ok(Self {
            instructions: CategoryInstructions {
                general: instruction(QueryCategory::General)?,
                refund: instruction(QueryCategory::Refund)?,
                technical: instruction(QueryCategory::Technical)?,
            },
            tiers: TierTable {
                simple: tier(QueryComplexity::Simple)?,
                complex: tier(QueryComplexity::Complex)?,
            },
        })
    }

    /// The instruction and tier for a classification.
    pub fn route(&self, classification: &Classification) -> (&str, ModelTier) {
        (
            self.instructions.get(classification.category),
            self.tiers.get(classification.complexity),
        )
    }
}

fn missing(table: &str, key: &str) -> Error {
    Error::Config {
        message: format!("{table} is missing key '{key}'"),
    }
}

fn check_keys<'a>(
    table: &str,
    keys: impl Iterator<Item = &'a String>,
    known: &[&str],
) -> Result<(), Error> {
    for key in keys {
        if !known.contains(&key.as_str()) {
            return Err(Error::Config {
                message: format!("{table} has unknown key '{key}' (expected one of {known:?})"),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteResult {
    pub response: String,
    pub classification: Classification,
    pub tier: ModelTier,
}

pub struct Router {
    caller: ModelCaller,
    table: RoutingTable,
    classifier_tier: ModelTier,
}

impl Router {
    pub fn new(caller: ModelCaller, table: RoutingTable) -> Self {
        Self {
            caller,
            table,
            classifier_tier: ModelTier::Fast,
        }
    }

    pub fn from_config(caller: ModelCaller, config: &AppConfig) -> Result<Self, Error> {
        let table = RoutingTable::from_config(&config.router)?;
        Ok(Self::new(caller, table).with_classifier_tier(config.router.classifier_tier))
    }

    pub fn with_classifier_tier(mut self, tier: ModelTier) -> Self {
        self.classifier_tier = tier;
        self
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub async fn run(&self, query: &str) -> Result<RouteResult, Error> {
        let run_id = RunId::new();

        let result = self.route(run_id, query).await;
        self.caller.publish(DomainEvent::RunFinished {
            run_id,
            pattern: "router".into(),
            success: result.is_ok(),
            timestamp: Utc::now(),
        });
        result
    }

    async fn route(&self, run_id: RunId, query: &str) -> Result<RouteResult, Error> {
        let classification = self.classify(run_id, query).await.map_err(stage_error("classify"))?;
        let (instruction, tier) = self.table.route(&classification);

        info!(
            %run_id,
            category = %classification.category,
            complexity = %classification.complexity,
            %tier,
            "Query routed"
        );
        self.caller.publish(DomainEvent::Routed {
            run_id,
            category: classification.category.to_string(),
            complexity: classification.complexity.to_string(),
            tier: tier.to_string(),
            timestamp: Utc::now(),
        });

        let request = ModelRequest::from_prompt(query)
            .with_system(instruction)
            .with_tier(tier);
        let response = self
            .caller
            .text(run_id, "respond", request)
            .await
            .map_err(stage_error("respond"))?;

        Ok(RouteResult {
            response,
            classification,
            tier,
        })
    }

    async fn classify(&self, run_id: RunId, query: &str) -> Result<Classification, ModelError> {
        let prompt = format!(
            "Classify this customer question:\n{query}\n\n\
             Determine:\n\
             1. Query category (general, refund, or technical)\n\
             2. Complexity (simple or complex)\n\
             3. Brief reasoning for classification"
        );
        let schema = Classification::output_schema();
        let request = ModelRequest::from_prompt(prompt)
            .with_tier(self.classifier_tier)
            .with_output_schema(schema.clone());

        let value = self.caller.object(run_id, "classify", request).await?;
        let value = check_output(&schema.schema, value)?;
        serde_json::from_value(value).map_err(|e| ModelError::Rejected(format!("bad classification: {e}")))
    }
}

/// Default routing table built from the default configuration.
pub fn default_routing_table() -> Result<RoutingTable, Error> {
    RoutingTable::from_config(&RouterConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::test_helpers::*;
    use clawflow_core::event::EventBus;
    use std::sync::Arc;

    fn classification(category: &str, complexity: &str) -> serde_json::Value {
        serde_json::json!({"reasoning": "because", "category": category, "complexity": complexity})
    }

    fn router(model: Arc<ScriptedModel>) -> Router {
        Router::from_config(ModelCaller::new(model), &AppConfig::default()).unwrap()
    }

    #[test]
    fn every_combination_resolves() {
        let table = default_routing_table().unwrap();
        for category in QueryCategory::ALL {
            for complexity in QueryComplexity::ALL {
                let c = Classification {
                    category,
                    complexity,
                    reasoning: String::new(),
                };
                let (instruction, _tier) = table.route(&c);
                assert!(!instruction.is_empty(), "{category}/{complexity}");
            }
        }
        assert_eq!(table.tiers.get(QueryComplexity::Simple), ModelTier::Fast);
        assert_eq!(table.tiers.get(QueryComplexity::Complex), ModelTier::Reasoning);
    }

    #[tokio::test]
    async fn refund_simple_uses_refund_instruction() {
        let model = Arc::new(ScriptedModel::new(vec![
            object(classification("refund", "simple")),
            text("Sure, here is how to get your money back."),
        ]));
        let result = router(model.clone())
            .run("I want to return my purchase from last week.")
            .await
            .unwrap();

        assert_eq!(result.classification.category, QueryCategory::Refund);
        assert_eq!(result.tier, ModelTier::Fast);
        assert_eq!(result.response, "Sure, here is how to get your money back.");

        let requests = model.requests();
        let respond = &requests[1];
        assert!(respond.system().unwrap().contains("refund requests"));
        assert_eq!(respond.tier(), Some(ModelTier::Fast));
        assert_eq!(respond.messages()[0].content, "I want to return my purchase from last week.");
    }

    #[tokio::test]
    async fn complex_technical_uses_reasoning_tier() {
        let model = Arc::new(ScriptedModel::new(vec![
            object(classification("technical", "complex")),
            text("Check your auth headers."),
        ]));
        let result = router(model.clone()).run("403 from your API").await.unwrap();

        assert_eq!(result.tier, ModelTier::Reasoning);
        let requests = model.requests();
        assert_eq!(requests[0].tier(), Some(ModelTier::Fast));
        assert_eq!(requests[0].output_schema().unwrap().name, "classification");
        assert_eq!(requests[1].tier(), Some(ModelTier::Reasoning));
        assert!(requests[1].system().unwrap().contains("troubleshooting"));
    }

    #[tokio::test]
    async fn unknown_category_fails_classification() {
        let model = Arc::new(ScriptedModel::new(vec![object(classification("billing", "simple"))]));
        let err = router(model.clone()).run("where is my invoice").await.unwrap_err();
        assert!(matches!(err, Error::Stage { stage: "classify", source: ModelError::Rejected(_) }));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn events_mark_the_route_and_the_end_of_the_run() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let model = Arc::new(ScriptedModel::new(vec![
            object(classification("general", "simple")),
            fail(ModelError::Unavailable("down".into())),
        ]));
        let caller = ModelCaller::new(model).with_event_bus(bus.clone());
        Router::from_config(caller, &AppConfig::default())
            .unwrap()
            .run("store hours?")
            .await
            .unwrap_err();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event.as_ref() {
                DomainEvent::Routed { category, .. } => seen.push(format!("routed:{category}")),
                DomainEvent::RunFinished { pattern, success, .. } => {
                    seen.push(format!("finished:{pattern}:{success}"))
                }
                _ => {}
            }
        }
        assert_eq!(seen, vec!["routed:general", "finished:router:false"]);
    }

    #[tokio::test]
    async fn respond_failure_names_the_stage() {
        let model = Arc::new(ScriptedModel::new(vec![
            object(classification("general", "complex")),
            fail(ModelError::Unavailable("down".into())),
        ]));
        let err = router(model).run("store hours?").await.unwrap_err();
        assert!(matches!(err, Error::Stage { stage: "respond", .. }));
    }

    #[test]
    fn missing_key_is_a_construction_error() {
        let mut config = RouterConfig::default();
        config.instructions.remove("technical");
        let err = RoutingTable::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("technical"));

        let mut config = RouterConfig::default();
        config.tiers.remove("complex");
        assert!(RoutingTable::from_config(&config).is_err());
    }

    #[test]
    fn unknown_key_is_a_construction_error() {
        let mut config = RouterConfig::default();
        config.instructions.insert("billing".into(), "Be precise.".into());
        let err = RoutingTable::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("billing"));
    }
}
