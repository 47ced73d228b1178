//! `stockwise-auth`: who may post stock movements and move orders between
//! statuses.
//!
//! Decoupled from transport and storage; the caller supplies an [`Actor`].

pub mod actor;
pub mod authorize;
pub mod permissions;

pub use actor::Actor;
pub use authorize::{AuthzError, authorize, authorize_opt};
pub use permissions::{Permission, catalog};
