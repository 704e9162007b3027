//! Error types for action primitives

use cdp_adapter::{AdapterError, AdapterErrorKind};
use runebattle_core_types::SceneState;
use thiserror::Error;

/// Failures surfaced while waiting on scenes or dispatching UI actions.
#[derive(Debug, Error, Clone)]
pub enum ActionError {
    /// The control is absent; the feature is unavailable in this build or state.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// The element exists but is hidden; callers move on to the next candidate.
    #[error("Element not visible: {0}")]
    ElementNotVisible(String),

    /// A scene marker did not become active in time
    #[error("Scene '{scene}' not active after {timeout_ms}ms")]
    SceneTimeout { scene: SceneState, timeout_ms: u64 },

    /// Dropdown option was not found
    #[error("Option not found in dropdown: {0}")]
    OptionNotFound(String),

    /// Handle outlived the UI it was resolved from
    #[error("Stale element handle: {0}")]
    StaleHandle(String),

    /// Browser driver failure (transport, launch, navigation)
    #[error("Driver failure: {0}")]
    Driver(AdapterError),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AdapterError> for ActionError {
    fn from(err: AdapterError) -> Self {
        let hint = err.hint.clone().unwrap_or_default();
        match err.kind {
            AdapterErrorKind::TargetNotFound => ActionError::ElementNotFound(hint),
            AdapterErrorKind::StaleHandle => ActionError::StaleHandle(hint),
            AdapterErrorKind::OptionNotFound => ActionError::OptionNotFound(hint),
            _ => ActionError::Driver(err),
        }
    }
}

impl ActionError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ActionError::StaleHandle(_) | ActionError::ElementNotVisible(_) => true,
            ActionError::Driver(err) => err.retriable,
            _ => false,
        }
    }

    /// Get error severity level (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            ActionError::Internal(_) | ActionError::Driver(_) => 3,
            ActionError::SceneTimeout { .. } => 2,
            ActionError::StaleHandle(_) | ActionError::OptionNotFound(_) => 1,
            ActionError::ElementNotFound(_) | ActionError::ElementNotVisible(_) => 0,
        }
    }

    pub fn is_scene_timeout(&self) -> bool {
        matches!(self, ActionError::SceneTimeout { .. })
    }

    /// Errors that should end the session rather than the current step.
    pub fn is_driver_failure(&self) -> bool {
        matches!(self, ActionError::Driver(_))
    }
}
