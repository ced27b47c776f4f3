// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Counter is not configured: configure an order before starting")]
    NotConfigured,

    #[error("Command '{command}' is not allowed while {state}")]
    InvalidStateTransition {
        command: &'static str,
        state: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
