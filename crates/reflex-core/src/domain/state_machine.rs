use crate::{
    domain::condition::VariableLookup,
    domain::events::{
        DomainEvent, RuleAdded, RuleTriggered, RuleUpdated, StateAdded, StateMachineActivated,
        StateMachineCreated, StateMachineDeactivated, StateMachineReset, StateTransitioned,
        TransitionAdded,
    },
    domain::rule::Rule,
    domain::state::State,
    domain::transition::Transition,
    types::{RuleId, StateId, StateMachineId, TransitionId},
    CoreError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

/// Name of the synthetic state every machine starts in
pub const INITIAL_STATE_NAME: &str = "Initial";

/// State machine lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateMachineStatus {
    /// Topology can still be edited
    Draft,

    /// Topology frozen, rules are evaluated
    Active,

    /// Topology frozen, rules are not evaluated
    Paused,
}

/// Strategy deciding whether a rule fires for a given lookup
pub trait RuleEvaluator: Debug + Send + Sync {
    /// True if the rule should fire
    fn evaluate(&self, rule: &Rule, lookup: &dyn VariableLookup) -> bool;
}

/// Default strategy: the rule fires when its condition holds
#[derive(Debug, Default, Clone, Copy)]
pub struct ConditionRuleEvaluator;

impl RuleEvaluator for ConditionRuleEvaluator {
    fn evaluate(&self, rule: &Rule, lookup: &dyn VariableLookup) -> bool {
        rule.matches(lookup)
    }
}

fn default_rule_evaluator() -> Arc<dyn RuleEvaluator> {
    Arc::new(ConditionRuleEvaluator)
}

/// A rule that fired during one `evaluate_rules` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredRule {
    /// Rule id
    pub rule_id: RuleId,
    /// Rule name
    pub rule_name: String,
}

/// Aggregate: State machine
///
/// Owns its states, transitions and rules. The current state is held by id
/// and always refers to a member of `states`. The aggregate is not
/// internally synchronized; concurrent mutation of one instance must be
/// serialized by the caller.
#[derive(Debug, Serialize, Deserialize)]
#[serde(try_from = "StateMachineRecord")]
pub struct StateMachine {
    id: StateMachineId,
    name: String,
    description: Option<String>,
    status: StateMachineStatus,
    states: Vec<State>,
    transitions: Vec<Transition>,
    rules: Vec<Rule>,
    current_state_id: Option<StateId>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    #[serde(skip, default = "default_rule_evaluator")]
    rule_evaluator: Arc<dyn RuleEvaluator>,

    /// Domain events
    #[serde(skip)]
    events: Vec<Box<dyn DomainEvent>>,
}

/// Stored shape of a state machine, checked before it becomes an aggregate
#[derive(Deserialize)]
struct StateMachineRecord {
    id: StateMachineId,
    name: String,
    description: Option<String>,
    status: StateMachineStatus,
    states: Vec<State>,
    transitions: Vec<Transition>,
    rules: Vec<Rule>,
    current_state_id: Option<StateId>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StateMachineRecord> for StateMachine {
    type Error = CoreError;

    fn try_from(record: StateMachineRecord) -> Result<Self, Self::Error> {
        let corrupt = |detail: String| {
            CoreError::SerializationError(format!(
                "Invalid state machine record '{}': {}",
                record.id, detail
            ))
        };

        if record.name.trim().is_empty() {
            return Err(corrupt("name is empty".to_string()));
        }
        if record.version == 0 {
            return Err(corrupt("version must start at 1".to_string()));
        }

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for state in &record.states {
            if !names.insert(state.name()) {
                return Err(corrupt(format!("duplicate state name '{}'", state.name())));
            }
            if !ids.insert(state.id()) {
                return Err(corrupt(format!("duplicate state id '{}'", state.id())));
            }
        }

        for transition in &record.transitions {
            for endpoint in [transition.from_state_id(), transition.to_state_id()] {
                if !ids.contains(endpoint) {
                    return Err(corrupt(format!(
                        "transition {} references unknown state {}",
                        transition.id(),
                        endpoint
                    )));
                }
            }
        }

        match &record.current_state_id {
            Some(current) if !ids.contains(current) => {
                return Err(corrupt(format!("current state {} is not a member", current)));
            }
            None if !record.states.is_empty() => {
                return Err(corrupt("current state is missing".to_string()));
            }
            _ => {}
        }

        Ok(Self {
            id: record.id,
            name: record.name,
            description: record.description,
            status: record.status,
            states: record.states,
            transitions: record.transitions,
            rules: record.rules,
            current_state_id: record.current_state_id,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
            rule_evaluator: default_rule_evaluator(),
            events: Vec::new(),
        })
    }
}

// Pending domain events are not cloned
impl Clone for StateMachine {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            status: self.status,
            states: self.states.clone(),
            transitions: self.transitions.clone(),
            rules: self.rules.clone(),
            current_state_id: self.current_state_id.clone(),
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            rule_evaluator: self.rule_evaluator.clone(),
            events: Vec::new(),
        }
    }
}

impl StateMachine {
    /// Create a draft machine holding only the initial state
    pub fn new(name: impl Into<String>, description: Option<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "State machine name cannot be empty".to_string(),
            ));
        }

        let initial = State::new(INITIAL_STATE_NAME, Some("Initial state".to_string()))?;
        let initial_id = initial.id().clone();
        let id = StateMachineId::new();
        let now = Utc::now();

        let mut machine = Self {
            id: id.clone(),
            name,
            description,
            status: StateMachineStatus::Draft,
            states: vec![initial],
            transitions: Vec::new(),
            rules: Vec::new(),
            current_state_id: Some(initial_id.clone()),
            version: 1,
            created_at: now,
            updated_at: now,
            rule_evaluator: default_rule_evaluator(),
            events: Vec::with_capacity(8),
        };

        machine.record_event(Box::new(StateMachineCreated {
            state_machine_id: id,
            initial_state_id: initial_id,
            timestamp: now,
        }));

        Ok(machine)
    }

    /// Replace the rule-evaluation strategy
    pub fn with_rule_evaluator(mut self, evaluator: Arc<dyn RuleEvaluator>) -> Self {
        self.rule_evaluator = evaluator;
        self
    }

    /// Replace the rule-evaluation strategy on a loaded machine
    pub fn set_rule_evaluator(&mut self, evaluator: Arc<dyn RuleEvaluator>) {
        self.rule_evaluator = evaluator;
    }

    /// Add a state; draft only, names must be unique
    pub fn add_state(&mut self, state: State) -> Result<(), CoreError> {
        self.ensure_draft("add state")?;

        if self.states.iter().any(|s| s.name() == state.name()) {
            return Err(CoreError::BusinessRuleViolation(format!(
                "State with name '{}' already exists",
                state.name()
            )));
        }
        if self.states.iter().any(|s| s.id() == state.id()) {
            return Err(CoreError::BusinessRuleViolation(format!(
                "State with id '{}' already exists",
                state.id()
            )));
        }

        self.record_event(Box::new(StateAdded {
            state_machine_id: self.id.clone(),
            state_id: state.id().clone(),
            state_name: state.name().to_string(),
            timestamp: Utc::now(),
        }));
        self.states.push(state);
        self.bump_version();
        Ok(())
    }

    /// Add a transition; draft only, both endpoints must exist
    pub fn add_transition(&mut self, transition: Transition) -> Result<(), CoreError> {
        self.ensure_draft("add transition")?;

        for endpoint in [transition.from_state_id(), transition.to_state_id()] {
            if self.find_state(endpoint).is_none() {
                return Err(CoreError::BusinessRuleViolation(format!(
                    "Transition references unknown state: {}",
                    endpoint
                )));
            }
        }

        self.record_event(Box::new(TransitionAdded {
            state_machine_id: self.id.clone(),
            transition_id: transition.id().clone(),
            from_state_id: transition.from_state_id().clone(),
            to_state_id: transition.to_state_id().clone(),
            timestamp: Utc::now(),
        }));
        self.transitions.push(transition);
        self.bump_version();
        Ok(())
    }

    /// Add a rule; draft only
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), CoreError> {
        self.ensure_draft("add rule")?;

        self.record_event(Box::new(RuleAdded {
            state_machine_id: self.id.clone(),
            rule_id: rule.id().clone(),
            timestamp: Utc::now(),
        }));
        self.rules.push(rule);
        self.bump_version();
        Ok(())
    }

    /// Replace a rule's fields; draft only
    pub fn update_rule(
        &mut self,
        rule_id: &RuleId,
        name: impl Into<String>,
        condition: crate::domain::condition::Condition,
        priority: i32,
        description: Option<String>,
    ) -> Result<(), CoreError> {
        self.ensure_draft("update rule")?;
        let rule = self.rule_mut(rule_id)?;
        rule.update(name, condition, priority, description)?;

        self.record_rule_updated(rule_id);
        self.bump_version();
        Ok(())
    }

    /// Toggle a rule's active flag; draft only
    pub fn set_rule_active(&mut self, rule_id: &RuleId, active: bool) -> Result<(), CoreError> {
        self.ensure_draft("change rule activation")?;
        let rule = self.rule_mut(rule_id)?;
        if active {
            rule.activate();
        } else {
            rule.deactivate();
        }

        self.record_rule_updated(rule_id);
        self.bump_version();
        Ok(())
    }

    /// Move the current state to `target`
    ///
    /// Guards are not consulted. Moving to the current state is a no-op.
    pub fn transition_to(
        &mut self,
        target: &StateId,
        reason: Option<String>,
    ) -> Result<(), CoreError> {
        if self.find_state(target).is_none() {
            return Err(CoreError::EntityNotFound(format!("State not found: {}", target)));
        }

        if self.current_state_id.as_ref() == Some(target) {
            tracing::trace!(state_machine_id = %self.id, state_id = %target, "Already in target state");
            return Ok(());
        }

        // A machine without a current state reports the target as its origin
        let from = self
            .current_state_id
            .replace(target.clone())
            .unwrap_or_else(|| target.clone());

        tracing::debug!(
            state_machine_id = %self.id,
            from = %from,
            to = %target,
            reason = ?reason,
            "State transitioned"
        );

        self.record_event(Box::new(StateTransitioned {
            state_machine_id: self.id.clone(),
            from_state_id: from,
            to_state_id: target.clone(),
            reason,
            timestamp: Utc::now(),
        }));
        self.bump_version();
        Ok(())
    }

    /// Follow a declared transition out of the current state, honouring its guard
    pub fn transition_via(
        &mut self,
        transition_id: &TransitionId,
        lookup: &dyn VariableLookup,
        reason: Option<String>,
    ) -> Result<(), CoreError> {
        let transition = self
            .transitions
            .iter()
            .find(|t| t.id() == transition_id)
            .ok_or_else(|| {
                CoreError::EntityNotFound(format!("Transition not found: {}", transition_id))
            })?;

        if self.current_state_id.as_ref() != Some(transition.from_state_id()) {
            return Err(CoreError::BusinessRuleViolation(format!(
                "Transition {} does not start at the current state",
                transition_id
            )));
        }

        if let Some(guard) = transition.guard() {
            if !guard.evaluate(lookup) {
                return Err(CoreError::BusinessRuleViolation(format!(
                    "Guard '{}' of transition {} is not satisfied",
                    guard, transition_id
                )));
            }
        }

        let target = transition.to_state_id().clone();
        self.transition_to(&target, reason)
    }

    /// True if a transition leads from the current state to `target`
    ///
    /// Topology only; guards are not evaluated.
    pub fn can_transition_to(&self, target: &StateId) -> bool {
        let Some(current) = &self.current_state_id else {
            return false;
        };

        self.transitions
            .iter()
            .any(|t| t.from_state_id() == current && t.to_state_id() == target)
    }

    /// Transitions leaving the current state, in declaration order
    pub fn get_available_transitions(&self) -> Vec<Transition> {
        let Some(current) = &self.current_state_id else {
            return Vec::new();
        };

        self.transitions
            .iter()
            .filter(|t| t.from_state_id() == current)
            .cloned()
            .collect()
    }

    /// Fire every active rule whose condition holds, lowest priority first
    ///
    /// Does nothing unless the machine is active and has a current state.
    /// Matches are not latched: repeated calls fire again.
    pub fn evaluate_rules(&mut self, lookup: &dyn VariableLookup) -> Vec<FiredRule> {
        if self.status != StateMachineStatus::Active || self.current_state_id.is_none() {
            tracing::trace!(
                state_machine_id = %self.id,
                status = ?self.status,
                "Skipping rule evaluation"
            );
            return Vec::new();
        }

        let mut candidates: Vec<&Rule> = self.rules.iter().filter(|r| r.is_active()).collect();
        // Stable sort keeps insertion order among equal priorities
        candidates.sort_by_key(|r| r.priority());

        let fired: Vec<FiredRule> = candidates
            .into_iter()
            .filter(|rule| self.rule_evaluator.evaluate(rule, lookup))
            .map(|rule| FiredRule {
                rule_id: rule.id().clone(),
                rule_name: rule.name().to_string(),
            })
            .collect();

        for rule in &fired {
            tracing::debug!(
                state_machine_id = %self.id,
                rule_id = %rule.rule_id,
                rule_name = %rule.rule_name,
                "Rule triggered"
            );
            self.record_event(Box::new(RuleTriggered {
                state_machine_id: self.id.clone(),
                rule_id: rule.rule_id.clone(),
                rule_name: rule.rule_name.clone(),
                timestamp: Utc::now(),
            }));
            self.bump_version();
        }

        fired
    }

    /// Freeze the topology and start evaluating rules
    pub fn activate(&mut self) -> Result<(), CoreError> {
        if self.status != StateMachineStatus::Draft {
            return Err(CoreError::BusinessRuleViolation(format!(
                "Cannot activate state machine in status: {:?}",
                self.status
            )));
        }
        if self.states.len() < 2 {
            return Err(CoreError::BusinessRuleViolation(
                "Activation requires at least two states".to_string(),
            ));
        }
        if self.transitions.is_empty() {
            return Err(CoreError::BusinessRuleViolation(
                "Activation requires at least one transition".to_string(),
            ));
        }

        self.status = StateMachineStatus::Active;
        self.record_event(Box::new(StateMachineActivated {
            state_machine_id: self.id.clone(),
            timestamp: Utc::now(),
        }));
        self.bump_version();
        Ok(())
    }

    /// Pause an active machine
    pub fn deactivate(&mut self) -> Result<(), CoreError> {
        if self.status != StateMachineStatus::Active {
            return Err(CoreError::BusinessRuleViolation(format!(
                "Cannot deactivate state machine in status: {:?}",
                self.status
            )));
        }

        self.status = StateMachineStatus::Paused;
        self.record_event(Box::new(StateMachineDeactivated {
            state_machine_id: self.id.clone(),
            timestamp: Utc::now(),
        }));
        self.bump_version();
        Ok(())
    }

    /// Return to the initial state
    ///
    /// Emits an event and bumps the version only when the current state
    /// actually changes.
    pub fn reset(&mut self) {
        let Some(initial_id) = self.initial_state().map(|s| s.id().clone()) else {
            tracing::warn!(state_machine_id = %self.id, "No initial state to reset to");
            return;
        };

        if self.current_state_id.as_ref() == Some(&initial_id) {
            return;
        }

        let from = self.current_state_id.replace(initial_id.clone());
        self.record_event(Box::new(StateMachineReset {
            state_machine_id: self.id.clone(),
            from_state_id: from,
            to_state_id: initial_id,
            timestamp: Utc::now(),
        }));
        self.bump_version();
    }

    /// Machine id
    pub fn id(&self) -> &StateMachineId {
        &self.id
    }

    /// Machine name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Lifecycle status
    pub fn status(&self) -> StateMachineStatus {
        self.status
    }

    /// Version, bumped on every successful mutation
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Creation timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last mutation timestamp
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Snapshot of the states
    pub fn states(&self) -> Vec<State> {
        self.states.clone()
    }

    /// Snapshot of the transitions
    pub fn transitions(&self) -> Vec<Transition> {
        self.transitions.clone()
    }

    /// Snapshot of the rules
    pub fn rules(&self) -> Vec<Rule> {
        self.rules.clone()
    }

    /// The current state, if any
    pub fn current_state(&self) -> Option<&State> {
        self.current_state_id
            .as_ref()
            .and_then(|id| self.find_state(id))
    }

    /// The designated initial state, looked up by name
    pub fn initial_state(&self) -> Option<&State> {
        self.find_state_by_name(INITIAL_STATE_NAME)
    }

    /// Look up a state by id
    pub fn find_state(&self, id: &StateId) -> Option<&State> {
        self.states.iter().find(|s| s.id() == id)
    }

    /// Look up a state by name
    pub fn find_state_by_name(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name() == name)
    }

    /// Pending domain events
    pub fn pending_events(&self) -> &[Box<dyn DomainEvent>] {
        &self.events
    }

    /// Get and clear all domain events
    pub fn take_events(&mut self) -> Vec<Box<dyn DomainEvent>> {
        std::mem::take(&mut self.events)
    }

    fn record_event(&mut self, event: Box<dyn DomainEvent>) {
        self.events.push(event);
    }

    fn record_rule_updated(&mut self, rule_id: &RuleId) {
        self.record_event(Box::new(RuleUpdated {
            state_machine_id: self.id.clone(),
            rule_id: rule_id.clone(),
            timestamp: Utc::now(),
        }));
    }

    #[inline]
    fn bump_version(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    fn ensure_draft(&self, operation: &str) -> Result<(), CoreError> {
        if self.status != StateMachineStatus::Draft {
            return Err(CoreError::BusinessRuleViolation(format!(
                "Cannot {} while state machine is in status: {:?}",
                operation, self.status
            )));
        }
        Ok(())
    }

    fn rule_mut(&mut self, rule_id: &RuleId) -> Result<&mut Rule, CoreError> {
        self.rules
            .iter_mut()
            .find(|r| r.id() == rule_id)
            .ok_or_else(|| CoreError::EntityNotFound(format!("Rule not found: {}", rule_id)))
    }
}
