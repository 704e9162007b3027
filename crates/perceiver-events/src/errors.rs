//! Error types for the event classifier
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("invalid classifier pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, ClassifierError>;
