use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier such as `"procurement.approve"`.
///
/// `"*"` grants everything; meant for service accounts and tests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Permissions checked by the ledger and the order state machines.
pub mod catalog {
    use super::Permission;

    pub const ALL: Permission = Permission::from_static("*");

    pub const INVENTORY_TRANSACT: Permission = Permission::from_static("inventory.transact");

    pub const PROCUREMENT_SUBMIT: Permission = Permission::from_static("procurement.submit");
    pub const PROCUREMENT_APPROVE: Permission = Permission::from_static("procurement.approve");
    pub const PROCUREMENT_ORDER: Permission = Permission::from_static("procurement.order");
    pub const PROCUREMENT_BILL: Permission = Permission::from_static("procurement.bill");
    pub const PROCUREMENT_CANCEL: Permission = Permission::from_static("procurement.cancel");

    pub const SALES_SUBMIT: Permission = Permission::from_static("sales.submit");
    pub const SALES_APPROVE: Permission = Permission::from_static("sales.approve");
    pub const SALES_DISPATCH: Permission = Permission::from_static("sales.dispatch");
    pub const SALES_BILL: Permission = Permission::from_static("sales.bill");
    pub const SALES_CANCEL: Permission = Permission::from_static("sales.cancel");
}
