//! Engine configuration
//!
//! Defaults can be overridden from `REFLEX_*` environment variables.

use crate::application::actions::MouseButton;
use crate::application::ports::ErrorHandlingStrategy;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

/// Longest delay the `delay` action may be configured with
pub const MAX_DELAY_MS: u64 = 60_000;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Act-phase strategy for requests that do not choose one
    #[serde(default)]
    pub default_error_strategy: ErrorHandlingStrategy,

    /// Key pressed by the `key_press` action
    #[serde(default = "default_key_press_key")]
    pub key_press_key: String,

    /// Button clicked by the `mouse_click` action
    #[serde(default)]
    pub mouse_button: MouseButton,

    /// Duration of the `delay` action in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Grayscale preprocessing for sense requests that leave it unset
    #[serde(default)]
    pub grayscale: bool,

    /// Contrast enhancement for sense requests that leave it unset
    #[serde(default)]
    pub enhancement: bool,
}

fn default_key_press_key() -> String {
    "Enter".to_string()
}

fn default_delay_ms() -> u64 {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_error_strategy: ErrorHandlingStrategy::default(),
            key_press_key: default_key_press_key(),
            mouse_button: MouseButton::default(),
            delay_ms: default_delay_ms(),
            grayscale: false,
            enhancement: false,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self, CoreError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve configuration against an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Start with defaults
        let mut config = Self::default();

        if let Some(strategy) = lookup("REFLEX_ERROR_STRATEGY") {
            match strategy.parse() {
                Ok(strategy) => config.default_error_strategy = strategy,
                Err(_) => warn!("Invalid REFLEX_ERROR_STRATEGY value: {}", strategy),
            }
        }

        if let Some(key) = lookup("REFLEX_KEY_PRESS_KEY") {
            if key.trim().is_empty() {
                warn!("Empty REFLEX_KEY_PRESS_KEY ignored");
            } else {
                config.key_press_key = key;
            }
        }

        if let Some(button) = lookup("REFLEX_MOUSE_BUTTON") {
            match button.parse() {
                Ok(button) => config.mouse_button = button,
                Err(_) => warn!("Invalid REFLEX_MOUSE_BUTTON value: {}", button),
            }
        }

        if let Some(delay) = lookup("REFLEX_DELAY_MS") {
            if let Ok(delay) = delay.trim().parse::<u64>() {
                config.delay_ms = delay;
            } else {
                warn!("Invalid REFLEX_DELAY_MS value: {}", delay);
            }
        }

        if let Some(grayscale) = lookup("REFLEX_GRAYSCALE") {
            match parse_bool(&grayscale) {
                Some(value) => config.grayscale = value,
                None => warn!("Invalid REFLEX_GRAYSCALE value: {}", grayscale),
            }
        }

        if let Some(enhancement) = lookup("REFLEX_ENHANCEMENT") {
            match parse_bool(&enhancement) {
                Some(value) => config.enhancement = value,
                None => warn!("Invalid REFLEX_ENHANCEMENT value: {}", enhancement),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.delay_ms > MAX_DELAY_MS {
            return Err(CoreError::ConfigurationError(format!(
                "delay_ms must not exceed {} (got {})",
                MAX_DELAY_MS, self.delay_ms
            )));
        }
        Ok(())
    }
}
