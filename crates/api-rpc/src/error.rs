//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use linecount_core::domain::DomainError;
use linecount_core::error::AppError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const NOT_CONFIGURED: i32 = 4004;
    pub const PERSISTENCE_ERROR: i32 = 5001;
    pub const ACTUATOR_ERROR: i32 = 5002;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let code = match &err {
        AppError::Domain(DomainError::NotConfigured) => code::NOT_CONFIGURED,
        AppError::Domain(DomainError::InvalidStateTransition { .. }) => code::CONFLICT,
        AppError::Domain(DomainError::ValidationError(_)) => code::VALIDATION_ERROR,
        AppError::NotFound(_) => code::NOT_FOUND,
        AppError::Persistence(_) => code::PERSISTENCE_ERROR,
        AppError::Actuator(_) => code::ACTUATOR_ERROR,
    };
    ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
}
