//! Sense → Judge → Act workflow orchestration
//!
//! Each call to [`WorkflowOrchestrator::execute_workflow`] runs the three
//! phases in order. The result is all-or-nothing: a failure in any phase,
//! including a panic inside a collaborator, yields a failed result with no
//! phase outputs and zero duration. Nothing is shared between calls.

use crate::application::actions::ActionTable;
use crate::application::ports::{
    ActionExecutor, CancellationSignal, ErrorHandlingStrategy, ExecutionResult, Judge,
    JudgeRequest, Judgment, SenseRequest, SenseResult, Sensor,
};
use crate::config::EngineConfig;
use crate::types::{Metadata, RuleId, StateMachineId};
use crate::CoreError;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, Instrument};

/// Judge-phase input supplied by the caller
///
/// The sense results are threaded in by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgeParameters {
    /// Standalone rules to evaluate
    #[serde(default)]
    pub rule_ids: Vec<RuleId>,
    /// State machine whose rules are evaluated
    #[serde(default)]
    pub state_machine_id: Option<StateMachineId>,
    /// Variable bindings
    #[serde(default)]
    pub variables: Metadata,
    /// Additional metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Decision used when no rule fires
    #[serde(default)]
    pub default_action_names: Vec<String>,
}

/// One workflow invocation
#[derive(Debug, Clone, Default)]
pub struct WorkflowRequest {
    /// Workflow name
    pub name: String,
    /// Sense-phase input
    pub sense: SenseRequest,
    /// Judge-phase input
    pub judge: JudgeParameters,
    /// Act-phase strategy; the configured default when absent
    pub error_strategy: Option<ErrorHandlingStrategy>,
    /// Cancellation for the Act phase
    pub cancel: Option<CancellationSignal>,
}

/// Outcome of one workflow invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Whether all three phases completed
    pub success: bool,
    /// Wall time of the whole workflow; zero on failure
    pub total_duration: Duration,
    /// Sense-phase output
    pub sense_result: Option<SenseResult>,
    /// Judge-phase output
    pub judgment: Option<Judgment>,
    /// Act-phase output
    pub execution_result: Option<ExecutionResult>,
    /// Failure description
    pub error_message: Option<String>,
}

impl WorkflowResult {
    /// A completed workflow
    pub fn succeeded(
        total_duration: Duration,
        sense_result: SenseResult,
        judgment: Judgment,
        execution_result: ExecutionResult,
    ) -> Self {
        Self {
            success: true,
            total_duration,
            sense_result: Some(sense_result),
            judgment: Some(judgment),
            execution_result: Some(execution_result),
            error_message: None,
        }
    }

    /// A failed workflow; no phase output is kept
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            total_duration: Duration::ZERO,
            sense_result: None,
            judgment: None,
            execution_result: None,
            error_message: Some(message.into()),
        }
    }
}

type PhaseOutputs = (SenseResult, Judgment, ExecutionResult);

/// Runs Sense → Judge → Act against injected collaborators
pub struct WorkflowOrchestrator {
    /// Sense capability
    sensor: Arc<dyn Sensor>,

    /// Judge capability
    judge: Arc<dyn Judge>,

    /// Act capability
    executor: Arc<dyn ActionExecutor>,

    /// Action-name table
    action_table: ActionTable,

    /// Engine configuration
    config: EngineConfig,
}

impl WorkflowOrchestrator {
    /// Create a new workflow orchestrator
    pub fn new(
        sensor: Arc<dyn Sensor>,
        judge: Arc<dyn Judge>,
        executor: Arc<dyn ActionExecutor>,
        config: EngineConfig,
    ) -> Self {
        Self {
            sensor,
            judge,
            executor,
            action_table: ActionTable::from_config(&config),
            config,
        }
    }

    /// Engine configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one workflow; never returns an error
    pub async fn execute_workflow(&self, request: WorkflowRequest) -> WorkflowResult {
        let span = info_span!("workflow", name = %request.name);
        let started = Instant::now();

        let outcome = AssertUnwindSafe(self.run_phases(request).instrument(span.clone()))
            .catch_unwind()
            .await;

        span.in_scope(|| match outcome {
            Ok(Ok((sense, judgment, execution))) => {
                let elapsed = started.elapsed();
                info!(
                    duration_ms = elapsed.as_millis() as u64,
                    succeeded = execution.succeeded,
                    failed = execution.failed,
                    cancelled = execution.cancelled,
                    "Workflow completed"
                );
                WorkflowResult::succeeded(elapsed, sense, judgment, execution)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Workflow failed");
                WorkflowResult::failed(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(panic = %message, "Workflow panicked");
                WorkflowResult::failed(format!("Workflow panicked: {}", message))
            }
        })
    }

    async fn run_phases(&self, request: WorkflowRequest) -> Result<PhaseOutputs, CoreError> {
        let WorkflowRequest {
            name,
            sense,
            judge,
            error_strategy,
            cancel,
        } = request;

        if name.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Workflow name cannot be empty".to_string(),
            ));
        }

        let sense_result = self
            .sense(sense)
            .instrument(info_span!("sense"))
            .await?;

        let judge_request = JudgeRequest {
            name: name.clone(),
            rule_ids: judge.rule_ids,
            state_machine_id: judge.state_machine_id,
            sense_results: vec![sense_result.clone()],
            variables: judge.variables,
            metadata: judge.metadata,
            default_action_names: judge.default_action_names,
        };
        let judgment = self
            .judge
            .judge(judge_request)
            .instrument(info_span!("judge"))
            .await?;
        debug!(decision = ?judgment.decision, "Judge phase finished");

        let actions = self.action_table.resolve_all(&judgment.decision);
        let strategy = error_strategy.unwrap_or(self.config.default_error_strategy);
        let execution = self
            .executor
            .execute(&name, actions, strategy, cancel.unwrap_or_default())
            .instrument(info_span!("act", strategy = ?strategy))
            .await?;

        Ok((sense_result, judgment, execution))
    }

    async fn sense(&self, mut request: SenseRequest) -> Result<SenseResult, CoreError> {
        if request.templates.is_empty() {
            return Err(CoreError::ValidationError(format!(
                "Sense request '{}' has no templates",
                request.name
            )));
        }

        request.grayscale.get_or_insert(self.config.grayscale);
        request.enhancement.get_or_insert(self.config.enhancement);

        let templates = request.templates.len();
        let result = self.sensor.sense(request).await?;
        debug!(
            templates,
            matched = result.matches.iter().filter(|m| m.matched).count(),
            "Sense phase finished"
        );
        Ok(result)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
