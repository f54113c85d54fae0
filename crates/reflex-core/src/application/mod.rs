/// Sense / Judge / Act collaborator ports
pub mod ports;

/// Action table, input-device port and default executor
pub mod actions;

/// Rule-based judge and domain event handling
pub mod judge_service;

/// Sense → Judge → Act orchestration
pub mod workflow_orchestrator;
