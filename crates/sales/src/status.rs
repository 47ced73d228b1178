use serde::{Deserialize, Serialize};

use stockwise_auth::{Permission, catalog};
use stockwise_core::{DomainError, DomainResult};

/// Sales order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesStatus {
    Draft,
    Submitted,
    Approved,
    Billed,
    Paid,
    Cancelled,
}

impl SalesStatus {
    pub const ALL: [SalesStatus; 6] = [
        SalesStatus::Draft,
        SalesStatus::Submitted,
        SalesStatus::Approved,
        SalesStatus::Billed,
        SalesStatus::Paid,
        SalesStatus::Cancelled,
    ];

    pub fn allowed_transitions(self) -> &'static [SalesStatus] {
        use SalesStatus::*;
        match self {
            Draft => &[Submitted],
            Submitted => &[Approved, Cancelled, Draft],
            Approved => &[Billed, Cancelled],
            Billed => &[Paid],
            Paid | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, to: SalesStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    pub fn ensure_transition(self, to: SalesStatus) -> DomainResult<()> {
        if !self.can_transition_to(to) {
            return Err(DomainError::field(
                "status",
                format!("cannot change sales order status from {self} to {to}"),
            ));
        }
        Ok(())
    }

    pub fn required_permission(self) -> Option<Permission> {
        use SalesStatus::*;
        match self {
            Draft => None,
            Submitted => Some(catalog::SALES_SUBMIT),
            Approved => Some(catalog::SALES_APPROVE),
            Billed | Paid => Some(catalog::SALES_BILL),
            Cancelled => Some(catalog::SALES_CANCEL),
        }
    }

    /// Goods can leave the warehouse once the order is approved.
    pub fn accepts_dispatch(self) -> bool {
        matches!(self, SalesStatus::Approved | SalesStatus::Billed | SalesStatus::Paid)
    }

    pub fn as_str(self) -> &'static str {
        use SalesStatus::*;
        match self {
            Draft => "draft",
            Submitted => "submitted",
            Approved => "approved",
            Billed => "billed",
            Paid => "paid",
            Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for SalesStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
