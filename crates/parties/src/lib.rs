//! Parties: the company/contact address book orders refer to.
//!
//! Plain master data with soft delete; no lifecycle beyond that.

pub mod company;

pub use company::{Company, CompanyId, Contact, ContactId, ContactRole, Gender, NewCompany, NewContact};
