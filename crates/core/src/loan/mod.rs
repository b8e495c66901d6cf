//! Loan lifecycle.
//!
//! State machine, guarantor and eligibility rules, and payment allocation
//! across an installment's penalty, interest and principal.

pub mod error;
pub mod guarantor;
pub mod payment;
pub mod service;
pub mod types;

#[cfg(test)]
mod payment_props;

pub use error::LoanError;
pub use guarantor::{Eligibility, GuarantorCheck, GuarantorService, PaymentCapacity};
pub use payment::{InstallmentUpdate, PaymentAllocation, PaymentPlan, PaymentService};
pub use service::{ApprovalPlan, LoanBalanceUpdate, LoanService};
pub use types::{
    InstallmentSnapshot, InstallmentStatus, LoanRequestInput, LoanStatus, LoanTypeTerms,
    PaymentMethod,
};
