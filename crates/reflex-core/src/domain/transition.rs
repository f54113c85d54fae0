use crate::domain::condition::Condition;
use crate::types::{StateId, TransitionId};
use crate::CoreError;
use serde::{Deserialize, Serialize};

/// Entity: a directed edge between two states
///
/// The guard is optional; a transition without one is always
/// topologically eligible. Endpoint existence is checked by the owning
/// state machine when the transition is added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    id: TransitionId,
    from_state_id: StateId,
    to_state_id: StateId,
    guard: Option<Condition>,
    description: Option<String>,
}

impl Transition {
    /// Create a transition with a fresh id
    pub fn new(
        from_state_id: StateId,
        to_state_id: StateId,
        guard: Option<Condition>,
        description: Option<String>,
    ) -> Result<Self, CoreError> {
        if from_state_id.as_str().is_empty() || to_state_id.as_str().is_empty() {
            return Err(CoreError::ValidationError(
                "Transition endpoints cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            id: TransitionId::new(),
            from_state_id,
            to_state_id,
            guard,
            description,
        })
    }

    /// Unguarded transition without description
    pub fn between(from_state_id: StateId, to_state_id: StateId) -> Result<Self, CoreError> {
        Self::new(from_state_id, to_state_id, None, None)
    }

    /// Transition id
    pub fn id(&self) -> &TransitionId {
        &self.id
    }

    /// Source state
    pub fn from_state_id(&self) -> &StateId {
        &self.from_state_id
    }

    /// Target state
    pub fn to_state_id(&self) -> &StateId {
        &self.to_state_id
    }

    /// Guard condition, if any
    pub fn guard(&self) -> Option<&Condition> {
        self.guard.as_ref()
    }

    /// Optional description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
