use thiserror::Error;

use stockwise_core::DomainError;

use crate::{Actor, Permission};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Forbidden(p) => DomainError::unauthorized(p),
        }
    }
}

/// Pure policy check; no IO.
pub fn authorize(actor: &Actor, required: &Permission) -> Result<(), AuthzError> {
    if actor.has(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Checks an optional requirement; `None` means no permission is needed.
pub fn authorize_opt(actor: &Actor, required: Option<&Permission>) -> Result<(), AuthzError> {
    match required {
        Some(p) => authorize(actor, p),
        None => Ok(()),
    }
}
