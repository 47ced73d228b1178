use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use stockwise_core::UserId;

use crate::Permission;

/// The user behind a posting or status change, with the permissions granted
/// by whatever identity layer authenticated them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub permissions: BTreeSet<Permission>,
}

impl Actor {
    pub fn new(user_id: UserId, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            user_id,
            permissions: permissions.into_iter().collect(),
        }
    }

    /// Actor holding the wildcard permission.
    pub fn superuser(user_id: UserId) -> Self {
        Self::new(user_id, [crate::catalog::ALL])
    }

    pub fn has(&self, permission: &Permission) -> bool {
        self.permissions.iter().any(|p| p.is_wildcard() || p == permission)
    }
}
