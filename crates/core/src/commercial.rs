//! Commercial terms shared by procurement and sales orders.

use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amount::{checked_add, checked_mul};
use crate::currency::Currency;
use crate::error::{DomainError, DomainResult, ValidationErrors};
use crate::value_object::ValueObject;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentTerm {
    NetT,
    DueOnReceipt,
    Cia,
    Cwo,
    Cod,
    Cad,
    Eom,
    TEom,
    Prox,
    PartialAdvance,
    Lc,
    Dc,
    XYNetT,
    TradeDiscount,
}

impl PaymentTerm {
    /// Terms offered on sales orders; procurement accepts every term.
    pub const SALES: [PaymentTerm; 8] = [
        PaymentTerm::NetT,
        PaymentTerm::DueOnReceipt,
        PaymentTerm::Cia,
        PaymentTerm::Cod,
        PaymentTerm::Eom,
        PaymentTerm::PartialAdvance,
        PaymentTerm::Lc,
        PaymentTerm::TradeDiscount,
    ];

    /// Deferred terms need a number of due days.
    pub fn requires_due_days(self) -> bool {
        matches!(
            self,
            PaymentTerm::NetT | PaymentTerm::TEom | PaymentTerm::PartialAdvance | PaymentTerm::XYNetT
        )
    }

    /// Due discount fields may only be set on deferred terms.
    pub fn allows_due_discount(self) -> bool {
        self.requires_due_days()
    }

    /// "X% discount if paid within Y days, net T" needs both discount fields.
    pub fn requires_due_discount(self) -> bool {
        self == PaymentTerm::XYNetT
    }

    /// Last day the invoice can be paid, when the term defines one.
    ///
    /// End-of-month pays on the last day of the invoice month; net and
    /// partial-advance terms pay `due_in_days` after the invoice date.
    pub fn last_payment_date(self, invoice_date: NaiveDate, due_in_days: Option<u32>) -> Option<NaiveDate> {
        match self {
            PaymentTerm::Eom => month_end(invoice_date),
            PaymentTerm::NetT | PaymentTerm::PartialAdvance => {
                invoice_date.checked_add_days(Days::new(u64::from(due_in_days.unwrap_or(0))))
            }
            _ => None,
        }
    }
}

fn month_end(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    BankTransfer,
    Cash,
    CreditCard,
    Cheque,
    Eft,
    PromissoryNote,
    Other,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Incoterm {
    Exw,
    Fca,
    Fas,
    Fob,
    Cfr,
    Cif,
    Cpt,
    Cip,
    Dap,
    Dpu,
    Ddp,
}

/// Header terms of an order.
///
/// Discounts are fractions in `0..=1`; day counts are whole days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommercialTerms {
    pub payment_term: Option<PaymentTerm>,
    pub payment_method: Option<PaymentMethod>,
    pub incoterms: Option<Incoterm>,
    pub trade_discount: Decimal,
    pub due_in_days: Option<u32>,
    pub due_discount: Decimal,
    pub due_discount_days: Option<u32>,
    pub description: Option<String>,
    pub currency: Option<Currency>,
    pub delivery_address: Option<String>,
}

impl ValueObject for CommercialTerms {}

/// Editable header fields. Anything not listed here cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TermsPatch {
    pub payment_term: Option<PaymentTerm>,
    pub payment_method: Option<PaymentMethod>,
    pub incoterms: Option<Incoterm>,
    pub trade_discount: Option<Decimal>,
    pub due_in_days: Option<u32>,
    pub due_discount: Option<Decimal>,
    pub due_discount_days: Option<u32>,
    pub description: Option<String>,
    pub currency: Option<Currency>,
    pub delivery_address: Option<String>,
}

impl TermsPatch {
    pub fn is_empty(&self) -> bool {
        self == &TermsPatch::default()
    }
}

/// Rejects values outside `0..=1`.
pub fn ensure_fraction(field: &str, value: Decimal) -> DomainResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(DomainError::field(field, format!("must be between 0 and 1, got {value}")));
    }
    Ok(())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|s| s.trim().is_empty())
}

impl CommercialTerms {
    /// Terms after applying `patch`.
    ///
    /// When the resulting payment term does not allow a due discount, a
    /// provided discount is rejected and the stored one is reset.
    pub fn patched(&self, patch: &TermsPatch) -> DomainResult<CommercialTerms> {
        let mut errors = ValidationErrors::new();
        let mut next = self.clone();

        if let Some(v) = patch.payment_term {
            next.payment_term = Some(v);
        }
        if let Some(v) = patch.payment_method {
            next.payment_method = Some(v);
        }
        if let Some(v) = patch.incoterms {
            next.incoterms = Some(v);
        }
        if let Some(v) = patch.trade_discount {
            next.trade_discount = v;
        }
        if let Some(v) = patch.due_in_days {
            next.due_in_days = Some(v);
        }
        if let Some(v) = patch.due_discount {
            next.due_discount = v;
        }
        if let Some(v) = patch.due_discount_days {
            next.due_discount_days = Some(v);
        }
        if let Some(v) = &patch.description {
            next.description = Some(v.clone());
        }
        if let Some(v) = patch.currency {
            next.currency = Some(v);
        }
        if let Some(v) = &patch.delivery_address {
            next.delivery_address = Some(v.clone());
        }

        if !next.payment_term.is_some_and(PaymentTerm::allows_due_discount) {
            if patch.due_discount.is_some() {
                errors.push("due_discount", "not allowed for this payment term");
            }
            if patch.due_discount_days.is_some() {
                errors.push("due_discount_days", "not allowed for this payment term");
            }
            next.due_discount = Decimal::ZERO;
            next.due_discount_days = None;
        }

        for (field, value) in [
            ("trade_discount", next.trade_discount),
            ("due_discount", next.due_discount),
        ] {
            if let Err(DomainError::Validation(e)) = ensure_fraction(field, value) {
                for fe in e.errors() {
                    errors.push(field, fe.message.clone());
                }
            }
        }

        errors.into_result()?;
        Ok(next)
    }

    /// Due-day and due-discount requirements of the current payment term.
    pub fn check_term_requirements(&self, errors: &mut ValidationErrors) {
        let Some(term) = self.payment_term else {
            return;
        };
        if term.requires_due_days() && self.due_in_days.unwrap_or(0) == 0 {
            errors.push("due_in_days", "required for this payment term");
        }
        if term.requires_due_discount() {
            if self.due_discount.is_zero() {
                errors.push("due_discount", "required for this payment term");
            }
            if self.due_discount_days.unwrap_or(0) == 0 {
                errors.push("due_discount_days", "required for this payment term");
            }
        }
    }

    /// Header checks applied when an order is submitted.
    pub fn check_submission(&self, errors: &mut ValidationErrors) {
        if self.payment_term.is_none() {
            errors.push("payment_term", "is required");
        }
        if self.payment_method.is_none() {
            errors.push("payment_method", "is required");
        }
        if self.incoterms.is_none() {
            errors.push("incoterms", "is required");
        }
        if is_blank(&self.description) {
            errors.push("description", "is required");
        }
        if self.currency.is_none() {
            errors.push("currency", "is required");
        }
        if is_blank(&self.delivery_address) {
            errors.push("delivery_address", "is required");
        }
        self.check_term_requirements(errors);
    }
}

/// Read access to the priced parts of an order line.
pub trait PricedLine {
    fn unit_price(&self) -> Option<Decimal>;
    fn quantity(&self) -> Decimal;
    fn tax_rate(&self) -> Decimal;

    /// `None` while the line is unpriced or the product does not fit.
    fn total_without_tax(&self) -> Option<Decimal> {
        self.unit_price().and_then(|p| p.checked_mul(self.quantity()))
    }

    fn total_with_tax(&self) -> Option<Decimal> {
        self.total_without_tax()
            .and_then(|t| t.checked_mul(Decimal::ONE + self.tax_rate()))
    }
}

/// Header totals. Unpriced lines are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total_without_tax: Decimal,
    pub total_with_tax: Decimal,
}

impl OrderTotals {
    /// Discount applies to the subtotal; tax is charged on pre-discount line amounts.
    pub fn compute<L: PricedLine>(lines: &[L], terms: &CommercialTerms) -> DomainResult<Self> {
        let mut subtotal = Decimal::ZERO;
        let mut tax = Decimal::ZERO;
        for line in lines {
            let Some(price) = line.unit_price() else {
                continue;
            };
            let amount = checked_mul(price, line.quantity(), "line total")?;
            subtotal = checked_add(subtotal, amount, "subtotal")?;
            tax = checked_add(tax, checked_mul(amount, line.tax_rate(), "line tax")?, "tax")?;
        }
        let discount = checked_mul(subtotal, terms.trade_discount + terms.due_discount, "discount")?;
        let total_without_tax = subtotal - discount;

        Ok(Self {
            subtotal,
            discount,
            tax,
            total_without_tax,
            total_with_tax: checked_add(total_without_tax, tax, "total with tax")?,
        })
    }
}
