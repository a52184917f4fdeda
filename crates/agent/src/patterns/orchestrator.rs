//! Orchestrator/worker: plan once, execute every task concurrently, report
//! in plan order.
//!
//! The planner returns a [`Plan`] that is validated before any worker runs.
//! Each worker receives its own clone of one task and a system instruction
//! chosen by the task's kind. Workers are fail-independent: one failed task
//! is reported as failed and its siblings carry on.

use chrono::Utc;
use clawflow_config::{AppConfig, OrchestratorConfig};
use clawflow_core::error::{Error, ModelError};
use clawflow_core::event::{DomainEvent, RunId};
use clawflow_core::model::{ModelRequest, ModelTier, OutputSchema};
use clawflow_core::schema;
use clawflow_core::taxonomy::{EstimatedComplexity, TaskKind, enum_values};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model_call::{ModelCaller, check_output, stage_error};
use crate::patterns::task_group;

/// One planned change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub purpose: String,
    /// The file the change applies to.
    #[serde(rename = "file_path")]
    pub target: String,
    #[serde(rename = "change_type")]
    pub kind: TaskKind,
}

/// The planner's output. Read-only once validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(rename = "files")]
    tasks: Vec<Task>,
    estimated_complexity: EstimatedComplexity,
}

impl Plan {
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn estimated_complexity(&self) -> EstimatedComplexity {
        self.estimated_complexity
    }

    pub fn output_schema() -> OutputSchema {
        OutputSchema::new(
            "implementation_plan",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "files": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "purpose": { "type": "string" },
                                "file_path": { "type": "string", "minLength": 1 },
                                "change_type": { "type": "string", "enum": enum_values(&TaskKind::ALL) }
                            },
                            "required": ["purpose", "file_path", "change_type"]
                        }
                    },
                    "estimated_complexity": {
                        "type": "string",
                        "enum": enum_values(&EstimatedComplexity::ALL)
                    }
                },
                "required": ["files", "estimated_complexity"]
            }),
        )
    }

    /// Validate a raw planner object. Any problem, including an unknown
    /// change type, is a [`Error::PlanValidation`] carrying the raw plan.
    pub fn from_value(raw: serde_json::Value) -> Result<Self, Error> {
        if let Err(e) = schema::validate(&Self::output_schema().schema, &raw) {
            return Err(Error::PlanValidation {
                reason: e.to_string(),
                raw_plan: Some(raw),
            });
        }
        match serde_json::from_value(raw.clone()) {
            Ok(plan) => Ok(plan),
            Err(e) => Err(Error::PlanValidation {
                reason: e.to_string(),
                raw_plan: Some(raw),
            }),
        }
    }
}

/// Worker system instruction per task kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInstructions {
    pub create: String,
    pub modify: String,
    pub delete: String,
}

impl WorkerInstructions {
    pub fn for_kind(&self, kind: TaskKind) -> &str {
        match kind {
            TaskKind::Create => &self.create,
            TaskKind::Modify => &self.modify,
            TaskKind::Delete => &self.delete,
        }
    }

    /// Every task kind must have a non-empty instruction.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self, Error> {
        if let Some(unknown) = config.workers.keys().find(|k| TaskKind::parse(k).is_none()) {
            return Err(Error::Config {
                message: format!("orchestrator.workers has unknown task kind '{unknown}'"),
            });
        }
        let get = |kind: TaskKind| -> Result<String, Error> {
            config
                .workers
                .get(kind.as_str())
                .filter(|text| !text.trim().is_empty())
                .cloned()
                .ok_or_else(|| Error::Config {
                    message: format!("orchestrator.workers is missing an instruction for '{kind}'"),
                })
        };
        Ok(Self {
            create: get(TaskKind::Create)?,
            modify: get(TaskKind::Modify)?,
            delete: get(TaskKind::Delete)?,
        })
    }
}

/// What a worker returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerOutput {
    pub explanation: String,
    pub code: String,
}

impl WorkerOutput {
    fn output_schema() -> OutputSchema {
        OutputSchema::new(
            "file_change",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "explanation": { "type": "string" },
                    "code": { "type": "string" }
                },
                "required": ["explanation", "code"]
            }),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success(WorkerOutput),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub task: Task,
    pub outcome: TaskOutcome,
}

impl TaskReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Success(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestrationResult {
    pub plan: Plan,
    /// One report per planned task, in plan order.
    pub reports: Vec<TaskReport>,
}

impl OrchestrationResult {
    pub fn failed_count(&self) -> usize {
        self.reports.iter().filter(|r| !r.is_success()).count()
    }
}

pub struct Orchestrator {
    caller: ModelCaller,
    workers: WorkerInstructions,
    planner_instruction: String,
    planner_tier: ModelTier,
    worker_tier: ModelTier,
    max_concurrency: usize,
}

impl Orchestrator {
    pub fn new(caller: ModelCaller, workers: WorkerInstructions, max_concurrency: usize) -> Result<Self, Error> {
        if max_concurrency == 0 {
            return Err(Error::Config {
                message: "max_concurrency must be positive".into(),
            });
        }
        let defaults = OrchestratorConfig::default();
        Ok(Self {
            caller,
            workers,
            planner_instruction: defaults.planner_instruction,
            planner_tier: defaults.planner_tier,
            worker_tier: defaults.worker_tier,
            max_concurrency,
        })
    }

    pub fn from_config(caller: ModelCaller, config: &AppConfig) -> Result<Self, Error> {
        let orchestrator = &config.orchestrator;
        let workers = WorkerInstructions::from_config(orchestrator)?;
        let mut this = Self::new(caller, workers, config.concurrency.max_concurrency)?;
        this.planner_instruction = orchestrator.planner_instruction.clone();
        this.planner_tier = orchestrator.planner_tier;
        this.worker_tier = orchestrator.worker_tier;
        Ok(this)
    }

    pub fn with_planner_tier(mut self, tier: ModelTier) -> Self {
        self.planner_tier = tier;
        self
    }

    pub async fn run(&self, feature_request: &str) -> Result<OrchestrationResult, Error> {
        let run_id = RunId::new();

        let plan = self.plan(run_id, feature_request).await?;
        info!(
            %run_id,
            tasks = plan.tasks.len(),
            complexity = %plan.estimated_complexity,
            "Plan accepted"
        );

        let branches = plan
            .tasks
            .iter()
            .cloned()
            .map(|task| self.work(run_id, task, feature_request));
        let reports = task_group::independent(branches, self.max_concurrency).await;

        let result = OrchestrationResult { plan, reports };
        self.caller.publish(DomainEvent::RunFinished {
            run_id,
            pattern: "orchestrator".into(),
            success: result.failed_count() == 0,
            timestamp: Utc::now(),
        });
        Ok(result)
    }

    async fn plan(&self, run_id: RunId, feature_request: &str) -> Result<Plan, Error> {
        let request = ModelRequest::from_prompt(format!(
            "Analyze this feature request and create an implementation plan:\n{feature_request}"
        ))
        .with_system(self.planner_instruction.clone())
        .with_tier(self.planner_tier)
        .with_output_schema(Plan::output_schema());

        let raw = self
            .caller
            .object(run_id, "plan", request)
            .await
            .map_err(stage_error("plan"))?;
        Plan::from_value(raw)
    }

    async fn work(&self, run_id: RunId, task: Task, feature_request: &str) -> TaskReport {
        let schema = WorkerOutput::output_schema();
        let request = ModelRequest::from_prompt(format!(
            "Implement the change for {} to support:\n{}\n\nConsider the overall feature context:\n{feature_request}",
            task.target, task.purpose
        ))
        .with_system(self.workers.for_kind(task.kind))
        .with_tier(self.worker_tier)
        .with_output_schema(schema.clone());

        let output: Result<WorkerOutput, ModelError> = async {
            let value = self.caller.object(run_id, "worker", request).await?;
            let value = check_output(&schema.schema, value)?;
            serde_json::from_value(value).map_err(|e| ModelError::Rejected(e.to_string()))
        }
        .await;

        let outcome = match output {
            Ok(output) => TaskOutcome::Success(output),
            Err(e) => {
                warn!(%run_id, file = %task.target, error = %e, "Worker failed");
                TaskOutcome::Failed { reason: e.to_string() }
            }
        };
        self.caller.publish(DomainEvent::TaskCompleted {
            run_id,
            file_path: task.target.clone(),
            success: matches!(outcome, TaskOutcome::Success(_)),
            timestamp: Utc::now(),
        });
        TaskReport { task, outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::test_helpers::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn plan_json() -> serde_json::Value {
        serde_json::json!({
            "files": [
                {"purpose": "profile page", "file_path": "src/profile.rs", "change_type": "create"},
                {"purpose": "route", "file_path": "src/routes.rs", "change_type": "modify"},
                {"purpose": "old page", "file_path": "src/legacy.rs", "change_type": "delete"}
            ],
            "estimated_complexity": "medium"
        })
    }

    fn change(code: &str) -> Reply {
        object(serde_json::json!({"explanation": "done", "code": code}))
    }

    fn orchestrator(model: Arc<ScriptedModel>) -> Orchestrator {
        Orchestrator::from_config(ModelCaller::new(model), &AppConfig::default()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn failed_task_does_not_affect_siblings() {
        let model = Arc::new(
            ScriptedModel::new(vec![])
                .when_prompt_contains("Analyze this feature", object(plan_json()))
                .when_prompt_contains("src/profile.rs", change("fn profile() {}").after(Duration::from_millis(50)))
                .when_prompt_contains("src/routes.rs", fail(ModelError::Unavailable("worker crashed".into())))
                .when_prompt_contains("src/legacy.rs", change("").after(Duration::from_millis(10))),
        );
        let result = orchestrator(model.clone()).run("Add a profile page").await.unwrap();

        assert_eq!(result.reports.len(), 3);
        let targets: Vec<_> = result.reports.iter().map(|r| r.task.target.as_str()).collect();
        assert_eq!(targets, vec!["src/profile.rs", "src/routes.rs", "src/legacy.rs"]);
        assert!(result.reports[0].is_success());
        assert!(matches!(
            &result.reports[1].outcome,
            TaskOutcome::Failed { reason } if reason.contains("worker crashed")
        ));
        assert!(result.reports[2].is_success());
        assert_eq!(result.failed_count(), 1);
        assert_eq!(model.call_count(), 4);
    }

    #[tokio::test]
    async fn workers_get_kind_specific_instructions_and_tiers() {
        let model = Arc::new(
            ScriptedModel::new(vec![])
                .when_prompt_contains("Analyze this feature", object(plan_json()))
                .when_prompt_contains("Implement the change", change("x")),
        );
        orchestrator(model.clone()).run("Add a profile page").await.unwrap();

        let requests = model.requests();
        assert_eq!(requests[0].tier(), Some(ModelTier::Reasoning));
        let config = OrchestratorConfig::default();
        for request in &requests[1..] {
            let prompt = &request.messages()[0].content;
            let expected = if prompt.contains("profile.rs") {
                &config.workers["create"]
            } else if prompt.contains("routes.rs") {
                &config.workers["modify"]
            } else {
                &config.workers["delete"]
            };
            assert_eq!(request.system(), Some(expected.as_str()));
            assert_eq!(request.tier(), Some(ModelTier::Fast));
        }
    }

    #[tokio::test]
    async fn unknown_change_type_fails_before_any_worker() {
        let mut plan = plan_json();
        plan["files"][1]["change_type"] = serde_json::json!("rename");
        let model = Arc::new(ScriptedModel::new(vec![object(plan)]));
        let err = orchestrator(model.clone()).run("x").await.unwrap_err();

        match err {
            Error::PlanValidation { reason, raw_plan } => {
                assert!(reason.contains("$.files[1].change_type"));
                assert_eq!(raw_plan.unwrap()["files"][1]["change_type"], "rename");
            }
            other => panic!("expected PlanValidation, got {other:?}"),
        }
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_plan_yields_no_reports() {
        let model = Arc::new(ScriptedModel::new(vec![object(
            serde_json::json!({"files": [], "estimated_complexity": "low"}),
        )]));
        let result = orchestrator(model).run("nothing to do").await.unwrap();
        assert!(result.reports.is_empty());
        assert_eq!(result.plan.estimated_complexity(), EstimatedComplexity::Low);
    }

    #[tokio::test]
    async fn planner_failure_is_a_plan_stage_error() {
        let model = Arc::new(ScriptedModel::new(vec![text("not an object")]));
        let err = orchestrator(model).run("x").await.unwrap_err();
        assert!(matches!(err, Error::Stage { stage: "plan", source: ModelError::Rejected(_) }));
    }

    #[tokio::test]
    async fn malformed_worker_output_fails_only_that_task() {
        let model = Arc::new(
            ScriptedModel::new(vec![])
                .when_prompt_contains("Analyze this feature", object(plan_json()))
                .when_prompt_contains("src/legacy.rs", object(serde_json::json!({"explanation": "no code"})))
                .when_prompt_contains("Implement the change", change("ok")),
        );
        let result = orchestrator(model).run("x").await.unwrap();
        let ok: Vec<bool> = result.reports.iter().map(TaskReport::is_success).collect();
        assert_eq!(ok, vec![true, true, false]);
    }

    #[test]
    fn worker_instructions_must_cover_every_kind() {
        let mut config = OrchestratorConfig::default();
        config.workers.remove("delete");
        let err = WorkerInstructions::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("delete"));
    }
}
