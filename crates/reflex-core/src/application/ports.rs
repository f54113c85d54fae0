//! Collaborator ports consumed by the workflow orchestrator
//!
//! Sense, Judge and Act are external capabilities. The orchestrator only
//! depends on the traits in this module; concrete recognition engines,
//! rule stores and input devices live behind them.

use crate::application::actions::Action;
use crate::types::{Metadata, RuleId, StateMachineId};
use crate::CoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Rectangular search area, in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

/// Screen position of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: i32,
    /// Vertical coordinate
    pub y: i32,
}

/// Tuning passed through to the recognition engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionParameters {
    /// Minimum confidence for a template to count as matched
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Upper bound on reported matches per template
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,
}

fn default_threshold() -> f64 {
    0.8
}

fn default_max_matches() -> usize {
    1
}

impl Default for RecognitionParameters {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_matches: default_max_matches(),
        }
    }
}

/// Input of the Sense phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SenseRequest {
    /// Name of the sensing step
    pub name: String,

    /// Templates to look for
    pub templates: Vec<String>,

    /// Optional search area; the whole screen when absent
    #[serde(default)]
    pub region: Option<Region>,

    /// Recognition tuning
    #[serde(default)]
    pub parameters: RecognitionParameters,

    /// Free-form context for the recognition engine
    #[serde(default)]
    pub context: Option<String>,

    /// Grayscale preprocessing; the engine default applies when unset
    #[serde(default)]
    pub grayscale: Option<bool>,

    /// Contrast enhancement; the engine default applies when unset
    #[serde(default)]
    pub enhancement: Option<bool>,

    /// Additional metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl SenseRequest {
    /// Create a request for the given templates
    pub fn new(name: impl Into<String>, templates: Vec<String>) -> Self {
        Self {
            name: name.into(),
            templates,
            ..Default::default()
        }
    }

    /// Restrict the search to a region
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }
}

/// Outcome for one template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMatch {
    /// Template name
    pub template: String,
    /// Whether the template was found
    pub matched: bool,
    /// Best confidence observed
    pub confidence: f64,
    /// Where it was found
    #[serde(default)]
    pub location: Option<Point>,
}

impl TemplateMatch {
    /// A positive match
    pub fn found(template: impl Into<String>, confidence: f64, location: Option<Point>) -> Self {
        Self {
            template: template.into(),
            matched: true,
            confidence,
            location,
        }
    }

    /// A negative match
    pub fn missing(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            matched: false,
            confidence: 0.0,
            location: None,
        }
    }
}

/// Output of the Sense phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SenseResult {
    /// Name of the sensing step
    pub name: String,
    /// Per-template outcome
    pub matches: Vec<TemplateMatch>,
    /// Additional metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl SenseResult {
    /// True if any template matched
    pub fn any_matched(&self) -> bool {
        self.matches.iter().any(|m| m.matched)
    }

    /// Outcome for a template, if reported
    pub fn get(&self, template: &str) -> Option<&TemplateMatch> {
        self.matches.iter().find(|m| m.template == template)
    }
}

/// Input of the Judge phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgeRequest {
    /// Name of the judging step
    pub name: String,
    /// Standalone rules to evaluate
    #[serde(default)]
    pub rule_ids: Vec<RuleId>,
    /// State machine whose rules are evaluated
    #[serde(default)]
    pub state_machine_id: Option<StateMachineId>,
    /// Results of the preceding Sense phase
    #[serde(default)]
    pub sense_results: Vec<SenseResult>,
    /// Caller-supplied variable bindings
    #[serde(default)]
    pub variables: Metadata,
    /// Additional metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Decision used when no rule fires
    #[serde(default)]
    pub default_action_names: Vec<String>,
}

/// Output of the Judge phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    /// Ordered action names
    pub decision: Vec<String>,
    /// Rules that fired, in firing order
    #[serde(default)]
    pub triggered_rules: Vec<RuleId>,
    /// Additional metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// How the Act phase reacts to a failing action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandlingStrategy {
    /// Abort the remaining actions
    #[default]
    StopOnFirstError,
    /// Record the failure and run the remaining actions
    ContinueOnError,
}

impl std::str::FromStr for ErrorHandlingStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "stop_on_first_error" => Ok(Self::StopOnFirstError),
            "continue_on_error" => Ok(Self::ContinueOnError),
            other => Err(CoreError::ValidationError(format!(
                "Unknown error handling strategy: {}",
                other
            ))),
        }
    }
}

/// Output of the Act phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Name of the acting step
    pub name: String,
    /// Actions that completed
    pub succeeded: usize,
    /// Actions that failed
    pub failed: usize,
    /// One message per failed action
    pub errors: Vec<String>,
    /// Whether execution stopped on cancellation
    pub cancelled: bool,
}

impl ExecutionResult {
    /// Empty result for the named step
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// True if nothing failed and nothing was cancelled
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }
}

/// Cooperative cancellation flag shared between a caller and the Act phase
///
/// Clones observe the same flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationSignal {
    /// Create an untriggered signal
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolve once cancellation is requested
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            // The sender lives as long as `self`, so this only fails after drop
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Sense capability: perceive the environment
#[async_trait]
pub trait Sensor: Send + Sync {
    /// Look for the requested templates
    async fn sense(&self, request: SenseRequest) -> Result<SenseResult, CoreError>;
}

/// Judge capability: turn perception into a decision
#[async_trait]
pub trait Judge: Send + Sync {
    /// Evaluate rules and produce an ordered list of action names
    async fn judge(&self, request: JudgeRequest) -> Result<Judgment, CoreError>;
}

/// Act capability: execute resolved actions
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Run `actions` in order under `strategy`, honouring `cancel`
    async fn execute(
        &self,
        name: &str,
        actions: Vec<Action>,
        strategy: ErrorHandlingStrategy,
        cancel: CancellationSignal,
    ) -> Result<ExecutionResult, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_strategy_from_str() {
        assert_eq!(
            "stop_on_first_error".parse::<ErrorHandlingStrategy>().unwrap(),
            ErrorHandlingStrategy::StopOnFirstError
        );
        assert_eq!(
            "Continue-On-Error".parse::<ErrorHandlingStrategy>().unwrap(),
            ErrorHandlingStrategy::ContinueOnError
        );
        assert!("retry".parse::<ErrorHandlingStrategy>().is_err());
    }

    #[test]
    fn test_error_strategy_serde() {
        let json = serde_json::to_string(&ErrorHandlingStrategy::ContinueOnError).unwrap();
        assert_eq!(json, "\"continue_on_error\"");
    }

    #[test]
    fn test_sense_request_defaults() {
        let request: SenseRequest =
            serde_json::from_str(r#"{"name": "scan", "templates": ["ok_button"]}"#).unwrap();

        assert_eq!(request.templates, vec!["ok_button".to_string()]);
        assert!(request.region.is_none());
        assert_eq!(request.parameters, RecognitionParameters::default());
        assert!(request.grayscale.is_none());
    }

    #[test]
    fn test_sense_result_lookup() {
        let result = SenseResult {
            name: "scan".to_string(),
            matches: vec![
                TemplateMatch::missing("close"),
                TemplateMatch::found("ok", 0.93, Some(Point { x: 10, y: 20 })),
            ],
            metadata: Metadata::new(),
        };

        assert!(result.any_matched());
        assert_eq!(result.get("ok").unwrap().location, Some(Point { x: 10, y: 20 }));
        assert!(result.get("absent").is_none());
    }

    #[test]
    fn test_execution_result_success() {
        let mut result = ExecutionResult::new("act");
        assert!(result.is_success());

        result.failed = 1;
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_cancellation_signal_shared_between_clones() {
        let signal = CancellationSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_cancelled());

        signal.cancel();
        assert!(observer.is_cancelled());

        // Already cancelled resolves immediately
        tokio::time::timeout(Duration::from_millis(100), observer.cancelled())
            .await
            .unwrap();
    }

    #[test]
    fn test_cancelled_pending_until_cancel() {
        let signal = CancellationSignal::new();
        let mut waiter = tokio_test::task::spawn(signal.cancelled());

        tokio_test::assert_pending!(waiter.poll());

        signal.cancel();
        assert!(waiter.is_woken());
        tokio_test::assert_ready!(waiter.poll());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let signal = CancellationSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
