//! Repository traits for the Reflex engine
//!
//! Persistence of state machines and standalone rules is delegated to
//! implementations of these traits. Storage schema is up to the
//! implementation; lookups are keyed by identity only.

use async_trait::async_trait;

use super::rule::Rule;
use super::state_machine::StateMachine;
use crate::types::{RuleId, StateMachineId};
use crate::CoreError;

/// Repository for state machines
#[async_trait]
pub trait StateMachineRepository: Send + Sync {
    /// Find a state machine by ID
    async fn find_by_id(&self, id: &StateMachineId) -> Result<Option<StateMachine>, CoreError>;

    /// Save a state machine, replacing any previous version
    async fn save(&self, machine: &StateMachine) -> Result<(), CoreError>;

    /// Delete a state machine
    async fn delete(&self, id: &StateMachineId) -> Result<(), CoreError>;

    /// List all stored state machine IDs
    async fn list_ids(&self) -> Result<Vec<StateMachineId>, CoreError>;
}

/// Repository for rules that are not owned by a state machine
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Find a rule by ID
    async fn find_by_id(&self, id: &RuleId) -> Result<Option<Rule>, CoreError>;

    /// Find every rule in `ids` that exists, in the order requested
    async fn find_by_ids(&self, ids: &[RuleId]) -> Result<Vec<Rule>, CoreError>;

    /// Save a rule
    async fn save(&self, rule: &Rule) -> Result<(), CoreError>;

    /// Delete a rule
    async fn delete(&self, id: &RuleId) -> Result<(), CoreError>;
}

/// Memory implementations for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use dashmap::DashMap;
    use std::sync::Arc;

    /// In-memory state machine repository backed by a concurrent map
    #[derive(Clone)]
    pub struct MemoryStateMachineRepository {
        machines: Arc<DashMap<String, StateMachine>>,
    }

    impl MemoryStateMachineRepository {
        /// Create a new memory state machine repository
        pub fn new() -> Self {
            Self {
                machines: Arc::new(DashMap::with_capacity(16)),
            }
        }
    }

    impl Default for MemoryStateMachineRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl StateMachineRepository for MemoryStateMachineRepository {
        async fn find_by_id(
            &self,
            id: &StateMachineId,
        ) -> Result<Option<StateMachine>, CoreError> {
            Ok(self.machines.get(id.as_str()).map(|machine| machine.clone()))
        }

        async fn save(&self, machine: &StateMachine) -> Result<(), CoreError> {
            self.machines
                .insert(machine.id().as_str().to_string(), machine.clone());
            Ok(())
        }

        async fn delete(&self, id: &StateMachineId) -> Result<(), CoreError> {
            self.machines.remove(id.as_str());
            Ok(())
        }

        async fn list_ids(&self) -> Result<Vec<StateMachineId>, CoreError> {
            Ok(self
                .machines
                .iter()
                .map(|entry| StateMachineId(entry.key().clone()))
                .collect())
        }
    }

    /// In-memory rule repository backed by a concurrent map
    #[derive(Clone)]
    pub struct MemoryRuleRepository {
        rules: Arc<DashMap<String, Rule>>,
    }

    impl MemoryRuleRepository {
        /// Create a new memory rule repository
        pub fn new() -> Self {
            Self {
                rules: Arc::new(DashMap::with_capacity(32)),
            }
        }
    }

    impl Default for MemoryRuleRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl RuleRepository for MemoryRuleRepository {
        async fn find_by_id(&self, id: &RuleId) -> Result<Option<Rule>, CoreError> {
            Ok(self.rules.get(id.as_str()).map(|rule| rule.clone()))
        }

        async fn find_by_ids(&self, ids: &[RuleId]) -> Result<Vec<Rule>, CoreError> {
            Ok(ids
                .iter()
                .filter_map(|id| self.rules.get(id.as_str()).map(|rule| rule.clone()))
                .collect())
        }

        async fn save(&self, rule: &Rule) -> Result<(), CoreError> {
            self.rules.insert(rule.id().as_str().to_string(), rule.clone());
            Ok(())
        }

        async fn delete(&self, id: &RuleId) -> Result<(), CoreError> {
            self.rules.remove(id.as_str());
            Ok(())
        }
    }
}
