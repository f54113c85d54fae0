use thiserror::Error;

/// Core error type for the Reflex engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Missing or empty required input
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The operation is not allowed in the aggregate's current state
    #[error("Business rule violation: {0}")]
    BusinessRuleViolation(String),

    /// Reference to an id that does not exist
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Sense phase failure
    #[error("Sense error: {0}")]
    SenseError(String),

    /// Judge phase failure
    #[error("Judge error: {0}")]
    JudgeError(String),

    /// Action execution failure
    #[error("Action error: {0}")]
    ActionError(String),

    /// Cooperative cancellation was requested
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Repository failure
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// True for missing/empty input errors
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::ValidationError(_))
    }

    /// True for errors caused by the aggregate's current state
    pub fn is_business_rule_violation(&self) -> bool {
        matches!(self, CoreError::BusinessRuleViolation(_))
    }

    /// True for unknown id references
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::EntityNotFound(_))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}
