use serde::{Deserialize, Serialize};

use stockwise_auth::{Permission, catalog};
use stockwise_core::{DomainError, DomainResult};

/// Procurement order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcurementStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Ordered,
    Billed,
    Paid,
    Cancelled,
}

impl ProcurementStatus {
    pub const ALL: [ProcurementStatus; 8] = [
        ProcurementStatus::Draft,
        ProcurementStatus::Submitted,
        ProcurementStatus::Approved,
        ProcurementStatus::Rejected,
        ProcurementStatus::Ordered,
        ProcurementStatus::Billed,
        ProcurementStatus::Paid,
        ProcurementStatus::Cancelled,
    ];

    /// Statuses reachable from `self` in one step.
    pub fn allowed_transitions(self) -> &'static [ProcurementStatus] {
        use ProcurementStatus::*;
        match self {
            Draft => &[Submitted],
            Submitted => &[Approved, Rejected, Cancelled, Draft],
            Approved => &[Ordered, Rejected, Cancelled],
            Rejected => &[Draft],
            Ordered => &[Billed, Cancelled],
            Billed => &[Paid],
            Paid | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, to: ProcurementStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    pub fn ensure_transition(self, to: ProcurementStatus) -> DomainResult<()> {
        if !self.can_transition_to(to) {
            return Err(DomainError::field(
                "status",
                format!("cannot change procurement order status from {self} to {to}"),
            ));
        }
        Ok(())
    }

    /// Permission an actor needs to move an order into `self`.
    ///
    /// Going back to draft is open to anyone who can see the order.
    pub fn required_permission(self) -> Option<Permission> {
        use ProcurementStatus::*;
        match self {
            Draft => None,
            Submitted => Some(catalog::PROCUREMENT_SUBMIT),
            Approved | Rejected => Some(catalog::PROCUREMENT_APPROVE),
            Ordered => Some(catalog::PROCUREMENT_ORDER),
            Billed | Paid => Some(catalog::PROCUREMENT_BILL),
            Cancelled => Some(catalog::PROCUREMENT_CANCEL),
        }
    }

    /// Goods can be received once the order has been placed with the vendor.
    pub fn accepts_receipts(self) -> bool {
        matches!(
            self,
            ProcurementStatus::Ordered | ProcurementStatus::Billed | ProcurementStatus::Paid
        )
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    pub fn as_str(self) -> &'static str {
        use ProcurementStatus::*;
        match self {
            Draft => "draft",
            Submitted => "submitted",
            Approved => "approved",
            Rejected => "rejected",
            Ordered => "ordered",
            Billed => "billed",
            Paid => "paid",
            Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for ProcurementStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProcurementStatus::*;

    #[test]
    fn table_is_exhaustive() {
        let expected: &[(ProcurementStatus, &[ProcurementStatus])] = &[
            (Draft, &[Submitted]),
            (Submitted, &[Approved, Rejected, Cancelled, Draft]),
            (Approved, &[Ordered, Rejected, Cancelled]),
            (Rejected, &[Draft]),
            (Ordered, &[Billed, Cancelled]),
            (Billed, &[Paid]),
            (Paid, &[]),
            (Cancelled, &[]),
        ];
        for (from, allowed) in expected {
            for to in ProcurementStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&to),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn rejection_names_both_statuses() {
        let err = Draft.ensure_transition(Paid).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("draft") && msg.contains("paid"), "{msg}");
    }

    #[test]
    fn permissions_per_target() {
        assert_eq!(Draft.required_permission(), None);
        assert_eq!(Rejected.required_permission(), Some(catalog::PROCUREMENT_APPROVE));
        assert_eq!(Paid.required_permission(), Some(catalog::PROCUREMENT_BILL));
    }

    #[test]
    fn receipts_only_after_ordering() {
        let open: Vec<_> = ProcurementStatus::ALL
            .into_iter()
            .filter(|s| s.accepts_receipts())
            .collect();
        assert_eq!(open, vec![Ordered, Billed, Paid]);
    }
}
