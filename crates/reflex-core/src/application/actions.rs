//! Action names, concrete actions and the default executor
//!
//! The Judge phase decides in terms of action *names*. [`ActionTable`]
//! maps the small fixed set of known names onto concrete [`Action`]s;
//! anything else is dropped. [`SequentialActionExecutor`] then drives an
//! [`InputDevice`] through the resolved sequence.

use crate::application::ports::{
    ActionExecutor, CancellationSignal, ErrorHandlingStrategy, ExecutionResult,
};
use crate::config::EngineConfig;
use crate::CoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Mouse button
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    /// Primary button
    #[default]
    Left,
    /// Secondary button
    Right,
    /// Wheel button
    Middle,
}

impl FromStr for MouseButton {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            other => Err(CoreError::ValidationError(format!(
                "Unknown mouse button: {}",
                other
            ))),
        }
    }
}

/// A concrete input action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Press and release a key
    KeyPress {
        /// Key name understood by the input device
        key: String,
    },
    /// Click a mouse button at the current pointer position
    MouseClick {
        /// Button to click
        button: MouseButton,
    },
    /// Wait before the next action
    Delay {
        /// How long to wait
        duration: Duration,
    },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::KeyPress { key } => write!(f, "key_press({})", key),
            Action::MouseClick { button } => write!(f, "mouse_click({:?})", button),
            Action::Delay { duration } => write!(f, "delay({}ms)", duration.as_millis()),
        }
    }
}

/// Fixed mapping from action names to concrete actions
#[derive(Debug, Clone)]
pub struct ActionTable {
    key_press_key: String,
    mouse_button: MouseButton,
    delay: Duration,
}

impl ActionTable {
    /// Build the table from engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            key_press_key: config.key_press_key.clone(),
            mouse_button: config.mouse_button,
            delay: Duration::from_millis(config.delay_ms),
        }
    }

    /// Resolve one name; unknown names yield `None`
    ///
    /// Matching ignores case and treats `-` as `_`.
    pub fn resolve(&self, name: &str) -> Option<Action> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "key_press" => Some(Action::KeyPress {
                key: self.key_press_key.clone(),
            }),
            "mouse_click" => Some(Action::MouseClick {
                button: self.mouse_button,
            }),
            "right_click" => Some(Action::MouseClick {
                button: MouseButton::Right,
            }),
            "delay" => Some(Action::Delay {
                duration: self.delay,
            }),
            _ => None,
        }
    }

    /// Resolve a decision, dropping unknown names
    pub fn resolve_all(&self, names: &[String]) -> Vec<Action> {
        names
            .iter()
            .filter_map(|name| {
                let action = self.resolve(name);
                if action.is_none() {
                    debug!(action_name = %name, "Dropping unknown action name");
                }
                action
            })
            .collect()
    }
}

impl Default for ActionTable {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Platform input device
///
/// One implementation per platform; the executor only sees this trait.
#[async_trait]
pub trait InputDevice: Send + Sync {
    /// Press and release a key
    async fn press_key(&self, key: &str) -> Result<(), CoreError>;

    /// Click a mouse button
    async fn click(&self, button: MouseButton) -> Result<(), CoreError>;
}

/// Runs actions one after another against an input device
pub struct SequentialActionExecutor<D: InputDevice + ?Sized> {
    device: Arc<D>,
}

impl<D: InputDevice + ?Sized> SequentialActionExecutor<D> {
    /// Create an executor driving `device`
    pub fn new(device: Arc<D>) -> Self {
        Self { device }
    }

    async fn run(&self, action: &Action, cancel: &CancellationSignal) -> Result<(), CoreError> {
        match action {
            Action::KeyPress { key } => self.device.press_key(key).await,
            Action::MouseClick { button } => self.device.click(*button).await,
            Action::Delay { duration } => {
                tokio::select! {
                    _ = tokio::time::sleep(*duration) => Ok(()),
                    _ = cancel.cancelled() => Err(CoreError::Cancelled(
                        "Cancelled during delay".to_string(),
                    )),
                }
            }
        }
    }
}

#[async_trait]
impl<D: InputDevice + ?Sized> ActionExecutor for SequentialActionExecutor<D> {
    async fn execute(
        &self,
        name: &str,
        actions: Vec<Action>,
        strategy: ErrorHandlingStrategy,
        cancel: CancellationSignal,
    ) -> Result<ExecutionResult, CoreError> {
        let mut result = ExecutionResult::new(name);

        for (index, action) in actions.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(step = %name, index, "Action execution cancelled");
                result.cancelled = true;
                break;
            }

            match self.run(action, &cancel).await {
                Ok(()) => {
                    debug!(step = %name, index, action = %action, "Action completed");
                    result.succeeded += 1;
                }
                Err(CoreError::Cancelled(_)) => {
                    info!(step = %name, index, action = %action, "Action execution cancelled");
                    result.cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!(step = %name, index, action = %action, error = %e, "Action failed");
                    result.failed += 1;
                    result.errors.push(format!("{}: {}", action, e));

                    if strategy == ErrorHandlingStrategy::StopOnFirstError {
                        break;
                    }
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDevice {
        log: Mutex<Vec<String>>,
        failing_key: Option<String>,
    }

    impl RecordingDevice {
        fn failing_on(key: &str) -> Self {
            Self {
                failing_key: Some(key.to_string()),
                ..Default::default()
            }
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl InputDevice for RecordingDevice {
        async fn press_key(&self, key: &str) -> Result<(), CoreError> {
            if self.failing_key.as_deref() == Some(key) {
                return Err(CoreError::ActionError(format!("key {} stuck", key)));
            }
            self.log.lock().unwrap().push(format!("key:{}", key));
            Ok(())
        }

        async fn click(&self, button: MouseButton) -> Result<(), CoreError> {
            self.log.lock().unwrap().push(format!("click:{:?}", button));
            Ok(())
        }
    }

    fn key(k: &str) -> Action {
        Action::KeyPress { key: k.to_string() }
    }

    #[test]
    fn test_table_resolves_known_names() {
        let table = ActionTable::default();

        assert_eq!(table.resolve("key_press"), Some(key("Enter")));
        assert_eq!(
            table.resolve("Mouse-Click"),
            Some(Action::MouseClick { button: MouseButton::Left })
        );
        assert_eq!(
            table.resolve("right_click"),
            Some(Action::MouseClick { button: MouseButton::Right })
        );
        assert_eq!(
            table.resolve("DELAY"),
            Some(Action::Delay { duration: Duration::from_millis(500) })
        );
        assert_eq!(table.resolve("launch_rockets"), None);
    }

    #[test]
    fn test_table_uses_config() {
        let config = EngineConfig {
            key_press_key: "Space".to_string(),
            mouse_button: MouseButton::Middle,
            delay_ms: 20,
            ..Default::default()
        };
        let table = ActionTable::from_config(&config);

        assert_eq!(table.resolve("key_press"), Some(key("Space")));
        assert_eq!(
            table.resolve("mouse_click"),
            Some(Action::MouseClick { button: MouseButton::Middle })
        );
    }

    #[test]
    fn test_resolve_all_drops_unknown_names() {
        let table = ActionTable::default();
        let names = vec![
            "mouse_click".to_string(),
            "unknown".to_string(),
            "key_press".to_string(),
        ];

        let actions = table.resolve_all(&names);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1], key("Enter"));
    }

    #[test]
    fn test_mouse_button_from_str() {
        assert_eq!("RIGHT".parse::<MouseButton>().unwrap(), MouseButton::Right);
        assert!("thumb".parse::<MouseButton>().is_err());
    }

    #[tokio::test]
    async fn test_executes_in_order() {
        let device = Arc::new(RecordingDevice::default());
        let executor = SequentialActionExecutor::new(device.clone());

        let result = executor
            .execute(
                "act",
                vec![
                    key("A"),
                    Action::Delay { duration: Duration::from_millis(1) },
                    Action::MouseClick { button: MouseButton::Right },
                ],
                ErrorHandlingStrategy::StopOnFirstError,
                CancellationSignal::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.succeeded, 3);
        assert!(result.is_success());
        assert_eq!(device.log(), vec!["key:A", "click:Right"]);
    }

    #[tokio::test]
    async fn test_stop_on_first_error() {
        let device = Arc::new(RecordingDevice::failing_on("B"));
        let executor = SequentialActionExecutor::new(device.clone());

        let result = executor
            .execute(
                "act",
                vec![key("A"), key("B"), key("C")],
                ErrorHandlingStrategy::StopOnFirstError,
                CancellationSignal::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("stuck"));
        assert_eq!(device.log(), vec!["key:A"]);
    }

    #[tokio::test]
    async fn test_continue_on_error() {
        let device = Arc::new(RecordingDevice::failing_on("B"));
        let executor = SequentialActionExecutor::new(device.clone());

        let result = executor
            .execute(
                "act",
                vec![key("A"), key("B"), key("C")],
                ErrorHandlingStrategy::ContinueOnError,
                CancellationSignal::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(device.log(), vec!["key:A", "key:C"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let device = Arc::new(RecordingDevice::default());
        let executor = SequentialActionExecutor::new(device.clone());
        let cancel = CancellationSignal::new();
        cancel.cancel();

        let result = executor
            .execute("act", vec![key("A")], ErrorHandlingStrategy::StopOnFirstError, cancel)
            .await
            .unwrap();

        assert!(result.cancelled);
        assert_eq!(result.succeeded, 0);
        assert!(device.log().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_delay() {
        let device = Arc::new(RecordingDevice::default());
        let executor = SequentialActionExecutor::new(device.clone());
        let cancel = CancellationSignal::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = executor
            .execute(
                "act",
                vec![Action::Delay { duration: Duration::from_secs(30) }, key("A")],
                ErrorHandlingStrategy::ContinueOnError,
                cancel,
            )
            .await
            .unwrap();

        assert!(result.cancelled);
        assert_eq!(result.failed, 0);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(device.log().is_empty());
    }
}
