use crate::types::StateId;
use crate::CoreError;
use serde::{Deserialize, Serialize};

/// Entity: a named state of a state machine
///
/// Two states are equal when they share an id, whatever their names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    id: StateId,
    name: String,
    description: Option<String>,
}

impl State {
    /// Create a state with a fresh id
    pub fn new(name: impl Into<String>, description: Option<String>) -> Result<Self, CoreError> {
        Self::with_id(StateId::new(), name, description)
    }

    /// Create a state with a caller-chosen id
    pub fn with_id(
        id: StateId,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "State name cannot be empty".to_string(),
            ));
        }
        if id.as_str().is_empty() {
            return Err(CoreError::ValidationError("State id cannot be empty".to_string()));
        }

        Ok(Self {
            id,
            name,
            description,
        })
    }

    /// State id
    pub fn id(&self) -> &StateId {
        &self.id
    }

    /// State name, unique within its machine
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for State {}
