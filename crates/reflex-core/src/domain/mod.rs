/// Single-comparison conditions
pub mod condition;

/// State entity
pub mod state;

/// Transition entity
pub mod transition;

/// Decision rule entity
pub mod rule;

/// State machine aggregate
pub mod state_machine;

/// Domain events
pub mod events;

/// Repository interfaces
pub mod repository;
