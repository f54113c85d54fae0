use crate::types::{RuleId, StateId, StateMachineId, TransitionId};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt::Debug;

/// Domain event trait for all events in the system
pub trait DomainEvent: Debug + Send + Sync {
    /// Returns the type of the event as a string
    fn event_type(&self) -> &'static str;

    /// Returns the state machine this event is associated with
    fn state_machine_id(&self) -> &StateMachineId;

    /// Returns the timestamp when the event occurred
    fn timestamp(&self) -> DateTime<Utc>;

    /// Downcast support for handlers that need the concrete event
    fn as_any(&self) -> &dyn Any;
}

macro_rules! impl_domain_event {
    ($event:ty, $name:literal) => {
        impl DomainEvent for $event {
            fn event_type(&self) -> &'static str {
                $name
            }

            fn state_machine_id(&self) -> &StateMachineId {
                &self.state_machine_id
            }

            fn timestamp(&self) -> DateTime<Utc> {
                self.timestamp
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

/// Event: State machine created
#[derive(Debug, Clone)]
pub struct StateMachineCreated {
    /// The state machine
    pub state_machine_id: StateMachineId,
    /// The synthetic initial state
    pub initial_state_id: StateId,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(StateMachineCreated, "state_machine.created");

/// Event: State added to a draft machine
#[derive(Debug, Clone)]
pub struct StateAdded {
    /// The state machine
    pub state_machine_id: StateMachineId,
    /// The added state
    pub state_id: StateId,
    /// Name of the added state
    pub state_name: String,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(StateAdded, "state_machine.state_added");

/// Event: Transition added to a draft machine
#[derive(Debug, Clone)]
pub struct TransitionAdded {
    /// The state machine
    pub state_machine_id: StateMachineId,
    /// The added transition
    pub transition_id: TransitionId,
    /// Source state
    pub from_state_id: StateId,
    /// Target state
    pub to_state_id: StateId,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(TransitionAdded, "state_machine.transition_added");

/// Event: Rule added to a draft machine
#[derive(Debug, Clone)]
pub struct RuleAdded {
    /// The state machine
    pub state_machine_id: StateMachineId,
    /// The added rule
    pub rule_id: RuleId,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(RuleAdded, "state_machine.rule_added");

/// Event: Rule fields or active flag changed
#[derive(Debug, Clone)]
pub struct RuleUpdated {
    /// The state machine
    pub state_machine_id: StateMachineId,
    /// The updated rule
    pub rule_id: RuleId,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(RuleUpdated, "state_machine.rule_updated");

/// Event: State machine activated
#[derive(Debug, Clone)]
pub struct StateMachineActivated {
    /// The state machine
    pub state_machine_id: StateMachineId,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(StateMachineActivated, "state_machine.activated");

/// Event: State machine paused
#[derive(Debug, Clone)]
pub struct StateMachineDeactivated {
    /// The state machine
    pub state_machine_id: StateMachineId,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(StateMachineDeactivated, "state_machine.deactivated");

/// Event: Current state changed
#[derive(Debug, Clone)]
pub struct StateTransitioned {
    /// The state machine
    pub state_machine_id: StateMachineId,
    /// Previous current state
    pub from_state_id: StateId,
    /// New current state
    pub to_state_id: StateId,
    /// Caller-supplied reason
    pub reason: Option<String>,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(StateTransitioned, "state_machine.transitioned");

/// Event: An active rule's condition held during evaluation
#[derive(Debug, Clone)]
pub struct RuleTriggered {
    /// The state machine
    pub state_machine_id: StateMachineId,
    /// The rule that fired
    pub rule_id: RuleId,
    /// Name of the rule that fired
    pub rule_name: String,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(RuleTriggered, "state_machine.rule_triggered");

/// Event: Current state restored to the initial state
#[derive(Debug, Clone)]
pub struct StateMachineReset {
    /// The state machine
    pub state_machine_id: StateMachineId,
    /// Current state before the reset
    pub from_state_id: Option<StateId>,
    /// The initial state
    pub to_state_id: StateId,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(StateMachineReset, "state_machine.reset");
