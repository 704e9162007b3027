use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// High-level error categories surfaced by the driver.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterErrorKind {
    #[error("browser launch failed")]
    LaunchFailed,
    #[error("navigation failed")]
    Navigation,
    #[error("wait timed out")]
    WaitTimeout,
    #[error("target element not found")]
    TargetNotFound,
    #[error("element handle is stale")]
    StaleHandle,
    #[error("option not found")]
    OptionNotFound,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("session closed")]
    SessionClosed,
    #[error("internal error")]
    Internal,
}

/// Enriched error metadata passed back to higher layers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        let retriable = matches!(
            kind,
            AdapterErrorKind::WaitTimeout | AdapterErrorKind::CdpIo | AdapterErrorKind::StaleHandle
        );
        Self {
            kind,
            hint: None,
            retriable,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }

    pub fn cdp(err: impl fmt::Display) -> Self {
        Self::new(AdapterErrorKind::CdpIo).with_hint(err.to_string())
    }

    pub fn internal(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Internal).with_hint(hint)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == AdapterErrorKind::WaitTimeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_hint() {
        let err = AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint("#rest-btn");
        assert_eq!(err.to_string(), "target element not found: #rest-btn");
    }

    #[test]
    fn timeouts_and_io_are_retriable_by_default() {
        assert!(AdapterError::new(AdapterErrorKind::WaitTimeout).retriable);
        assert!(AdapterError::new(AdapterErrorKind::CdpIo).retriable);
        assert!(!AdapterError::new(AdapterErrorKind::LaunchFailed).retriable);
        assert!(AdapterError::new(AdapterErrorKind::WaitTimeout).is_timeout());
    }
}
