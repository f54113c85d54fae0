//!
//! Reflex Core - decision engine for the Reflex automation platform
//!
//! This crate holds the rule-gated state machine, the priority-ordered
//! rule evaluator and the Sense → Judge → Act workflow orchestrator.
//! Recognition engines, input devices and persistence are external
//! collaborators reached through the traits in [`application::ports`],
//! [`application::actions`] and [`domain::repository`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - entities, the state machine aggregate and its invariants
pub mod domain;

/// Application services - judge, action execution and orchestration
pub mod application;

/// Core types
pub mod types;

/// Error types
pub mod error;

/// Engine configuration
pub mod config;

// Re-export key types
pub use config::EngineConfig;
pub use error::CoreError;
pub use types::{Metadata, RuleId, StateId, StateMachineId, TransitionId};

// Re-export main API types for easy use
pub use domain::condition::{Comparator, Condition, VariableLookup};
pub use domain::events::DomainEvent;
pub use domain::repository::{RuleRepository, StateMachineRepository};
pub use domain::rule::Rule;
pub use domain::state::State;
pub use domain::state_machine::{
    ConditionRuleEvaluator, FiredRule, RuleEvaluator, StateMachine, StateMachineStatus,
    INITIAL_STATE_NAME,
};
pub use domain::transition::Transition;

pub use application::actions::{
    Action, ActionTable, InputDevice, MouseButton, SequentialActionExecutor,
};
pub use application::judge_service::{DomainEventHandler, LoggingEventHandler, RuleBasedJudge};
pub use application::ports::{
    ActionExecutor, CancellationSignal, ErrorHandlingStrategy, ExecutionResult, Judge,
    JudgeRequest, Judgment, Point, RecognitionParameters, Region, SenseRequest, SenseResult,
    Sensor, TemplateMatch,
};
pub use application::workflow_orchestrator::{
    JudgeParameters, WorkflowOrchestrator, WorkflowRequest, WorkflowResult,
};
