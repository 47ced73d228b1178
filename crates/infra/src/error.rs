//! Error taxonomy at the service boundary.

use thiserror::Error;

use stockwise_auth::AuthzError;
use stockwise_core::{DomainError, ValidationErrors};

/// Failure of a store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A stream moved on since it was loaded.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// The commit would break a ledger invariant; nothing was written.
    #[error("ledger invariant violated: {0}")]
    Invariant(String),

    /// The commit would drive a stock key below zero; nothing was written.
    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What callers of the services see.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller-correctable, keyed by field.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Lock contention or a concurrent change. Safe to retry.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: missing permission '{0}'")]
    Unauthorized(String),

    /// Store or collaborator failure.
    #[error("system error: {0}")]
    System(String),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Conflict(_))
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            ServiceError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    pub(crate) fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.push(field, message);
        ServiceError::Validation(errors)
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(errors) => ServiceError::Validation(errors),
            DomainError::InvalidId(msg) => {
                let mut errors = ValidationErrors::new();
                errors.push_general(msg);
                ServiceError::Validation(errors)
            }
            DomainError::InvariantViolation(msg) => ServiceError::System(format!("invariant violated: {msg}")),
            DomainError::NotFound(what) => ServiceError::NotFound(what),
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            DomainError::Unauthorized(permission) => ServiceError::Unauthorized(permission),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => ServiceError::Conflict(msg),
            StoreError::InsufficientStock(msg) => ServiceError::Conflict(msg),
            other => ServiceError::System(other.to_string()),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        ServiceError::from(DomainError::from(value))
    }
}
