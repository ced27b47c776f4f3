// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Actuator error: {0}")]
    Actuator(#[from] crate::port::ActuatorError),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// True when the command was rejected because the counter has no order
    pub fn is_not_configured(&self) -> bool {
        matches!(self, AppError::Domain(crate::domain::DomainError::NotConfigured))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in the infra-sqlite crate
// by converting to AppError::Persistence(String)
