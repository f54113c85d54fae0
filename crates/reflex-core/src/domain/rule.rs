use crate::domain::condition::{Condition, VariableLookup};
use crate::types::RuleId;
use crate::CoreError;
use serde::{Deserialize, Serialize};

/// Entity: a priority-ordered, condition-gated trigger
///
/// Lower priority values are evaluated first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    id: RuleId,
    name: String,
    condition: Condition,
    priority: i32,
    active: bool,
    description: Option<String>,
}

impl Rule {
    /// Create an active rule with a fresh id
    pub fn new(
        name: impl Into<String>,
        condition: Condition,
        priority: i32,
        description: Option<String>,
    ) -> Result<Self, CoreError> {
        let name = validate_name(name.into())?;

        Ok(Self {
            id: RuleId::new(),
            name,
            condition,
            priority,
            active: true,
            description,
        })
    }

    /// Replace the rule's fields in place; the id is kept
    pub fn update(
        &mut self,
        name: impl Into<String>,
        condition: Condition,
        priority: i32,
        description: Option<String>,
    ) -> Result<(), CoreError> {
        self.name = validate_name(name.into())?;
        self.condition = condition;
        self.priority = priority;
        self.description = description;
        Ok(())
    }

    /// Make the rule eligible for evaluation
    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Exclude the rule from evaluation
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Evaluate the rule's condition
    pub fn matches(&self, lookup: &dyn VariableLookup) -> bool {
        self.condition.evaluate(lookup)
    }

    /// Rule id
    pub fn id(&self) -> &RuleId {
        &self.id
    }

    /// Rule name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Condition gating the rule
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Evaluation priority (lower first)
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether the rule takes part in evaluation
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Optional description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

fn validate_name(name: String) -> Result<String, CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::ValidationError(
            "Rule name cannot be empty".to_string(),
        ));
    }
    Ok(name)
}
