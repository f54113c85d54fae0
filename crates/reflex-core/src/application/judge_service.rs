use crate::{
    application::ports::{Judge, JudgeRequest, Judgment, SenseResult},
    domain::events::DomainEvent,
    domain::repository::{RuleRepository, StateMachineRepository},
    domain::rule::Rule,
    domain::state_machine::StateMachine,
    types::{Metadata, RuleId},
    CoreError,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Handler for domain events drained from aggregates
#[async_trait]
pub trait DomainEventHandler: Send + Sync {
    /// Handle a domain event
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError>;
}

/// Event handler that logs every event
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventHandler;

#[async_trait]
impl DomainEventHandler for LoggingEventHandler {
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        info!(
            event_type = event.event_type(),
            state_machine_id = %event.state_machine_id(),
            timestamp = %event.timestamp(),
            "Domain event"
        );
        Ok(())
    }
}

/// Build the variable lookup the rules are evaluated against
///
/// Every template match contributes `<template>.matched` and
/// `<template>.confidence`. Explicit variables take precedence.
pub fn build_variable_lookup(
    variables: &Metadata,
    sense_results: &[SenseResult],
) -> HashMap<String, String> {
    let mut lookup = HashMap::new();

    for result in sense_results {
        for m in &result.matches {
            lookup.insert(format!("{}.matched", m.template), m.matched.to_string());
            lookup.insert(format!("{}.confidence", m.template), m.confidence.to_string());
        }
    }

    for (name, value) in variables {
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        lookup.insert(name.clone(), value);
    }

    lookup
}

/// Judge backed by stored state machines and standalone rules
pub struct RuleBasedJudge {
    /// Repository for state machines
    state_machine_repo: Arc<dyn StateMachineRepository>,

    /// Repository for standalone rules
    rule_repo: Arc<dyn RuleRepository>,

    /// Event handler
    event_handler: Arc<dyn DomainEventHandler>,
}

impl RuleBasedJudge {
    /// Create a new rule-based judge
    pub fn new(
        state_machine_repo: Arc<dyn StateMachineRepository>,
        rule_repo: Arc<dyn RuleRepository>,
        event_handler: Arc<dyn DomainEventHandler>,
    ) -> Self {
        Self {
            state_machine_repo,
            rule_repo,
            event_handler,
        }
    }

    async fn load_rules(&self, rule_ids: &[RuleId]) -> Result<Vec<Rule>, CoreError> {
        // Keep first occurrence so request order decides ties
        let mut seen = HashSet::new();
        let unique: Vec<RuleId> = rule_ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect();

        let rules = self.rule_repo.find_by_ids(&unique).await?;

        if rules.len() != unique.len() {
            let found: HashSet<&RuleId> = rules.iter().map(|r| r.id()).collect();
            if let Some(missing) = unique.iter().find(|id| !found.contains(id)) {
                return Err(CoreError::EntityNotFound(format!("Rule not found: {}", missing)));
            }
        }

        Ok(rules)
    }

    async fn handle_events(&self, machine: &mut StateMachine) -> Result<(), CoreError> {
        let events = machine.take_events();

        for event in events {
            self.event_handler.handle_event(event).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl Judge for RuleBasedJudge {
    async fn judge(&self, request: JudgeRequest) -> Result<Judgment, CoreError> {
        let lookup = build_variable_lookup(&request.variables, &request.sense_results);
        trace!(step = %request.name, variables = lookup.len(), "Variable lookup built");

        let mut decision = Vec::new();
        let mut triggered_rules = Vec::new();
        let mut metadata = Metadata::new();

        if let Some(machine_id) = &request.state_machine_id {
            let mut machine = self
                .state_machine_repo
                .find_by_id(machine_id)
                .await?
                .ok_or_else(|| {
                    CoreError::EntityNotFound(format!("State machine not found: {}", machine_id))
                })?;

            let fired = machine.evaluate_rules(&lookup);
            debug!(
                step = %request.name,
                state_machine_id = %machine_id,
                fired = fired.len(),
                "State machine rules evaluated"
            );

            // A failing handler leaves the stored version untouched
            self.handle_events(&mut machine).await?;
            if !fired.is_empty() {
                self.state_machine_repo.save(&machine).await?;
            }

            metadata.insert("state_machine_version".to_string(), json!(machine.version()));
            for rule in fired {
                decision.push(rule.rule_name);
                triggered_rules.push(rule.rule_id);
            }
        }

        if !request.rule_ids.is_empty() {
            let mut rules = self.load_rules(&request.rule_ids).await?;
            rules.retain(|r| r.is_active());
            // Stable sort keeps request order among equal priorities
            rules.sort_by_key(|r| r.priority());

            for rule in rules.iter().filter(|r| r.matches(&lookup)) {
                debug!(step = %request.name, rule_id = %rule.id(), rule_name = %rule.name(), "Rule triggered");
                decision.push(rule.name().to_string());
                triggered_rules.push(rule.id().clone());
            }
        }

        let used_default = decision.is_empty();
        if used_default {
            decision = request.default_action_names.clone();
        }
        metadata.insert("used_default_actions".to_string(), json!(used_default));

        info!(
            step = %request.name,
            triggered = triggered_rules.len(),
            actions = decision.len(),
            used_default,
            "Judgment made"
        );

        Ok(Judgment {
            decision,
            triggered_rules,
            metadata,
        })
    }
}
