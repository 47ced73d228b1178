//! Domain error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// One caller-correctable problem, optionally tied to an input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: Option<String>,
    pub message: String,
}

impl core::fmt::Display for FieldError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{field}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Field-keyed list of validation failures.
///
/// Checks that can report several problems at once (order submission, header
/// patches) accumulate here and convert into a single `DomainError`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: Some(field.into()),
            message: message.into(),
        });
    }

    pub fn push_general(&mut self, message: impl Into<String>) {
        self.0.push(FieldError {
            field: None,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Returns `true` when any error is keyed on `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field.as_deref() == Some(field))
    }

    /// `Ok(())` when nothing was collected, otherwise a validation error.
    pub fn into_result(self) -> DomainResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self))
        }
    }
}

impl core::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed validation; the caller can correct it.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced record does not exist (or was soft-deleted).
    #[error("not found: {0}")]
    NotFound(String),

    /// Concurrent change or lock contention; retrying may succeed.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The acting user lacks the named permission.
    #[error("unauthorized: missing permission '{0}'")]
    Unauthorized(String),
}

impl DomainError {
    /// Validation failure not tied to a specific field.
    pub fn validation(msg: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.push_general(msg);
        Self::Validation(errors)
    }

    /// Validation failure keyed on `field`.
    pub fn field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.push(field, msg);
        Self::Validation(errors)
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn unauthorized(permission: impl Into<String>) -> Self {
        Self::Unauthorized(permission.into())
    }

    /// Field-level errors when this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collector_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn collector_reports_every_field() {
        let mut errors = ValidationErrors::new();
        errors.push("vendor", "is required");
        errors.push("currency", "is required");
        let err = errors.into_result().unwrap_err();

        let collected = err.validation_errors().unwrap();
        assert!(collected.has_field("vendor"));
        assert!(collected.has_field("currency"));
        assert_eq!(
            err.to_string(),
            "validation failed: vendor: is required; currency: is required"
        );
    }

    #[test]
    fn general_validation_has_no_field() {
        let err = DomainError::validation("reason must not be blank");
        let collected = err.validation_errors().unwrap();
        assert_eq!(collected.errors()[0].field, None);
        assert!(err.to_string().contains("reason must not be blank"));
    }
}
