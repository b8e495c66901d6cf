//! Repository abstractions for data access.
//!
//! Repositories run each operation in one transaction, delegate the rules to
//! `coopbank-core`, and publish audit records and notifications after commit.

pub mod audit;
pub mod delinquency;
pub mod dividend;
pub mod fund;
pub mod loan;
pub mod notification;
pub mod reconciliation;
pub mod savings;

mod hooks;
mod numbering;

pub use audit::AuditRepository;
pub use delinquency::{AccruedInstallment, DelinquencyRepository, SweepReport};
pub use dividend::{CreditReport, CreditedDividend, DividendRepository};
pub use fund::{AidRequestInput, ApprovedAid, ContributionInput, FundPosting, FundRepository};
pub use loan::{
    ApproveLoanInput, ApprovedLoan, Disbursement, EligibilityReport, LoanRepository, LoanRequest,
    PaymentInput, PaymentReceipt,
};
pub use notification::{DispatchError, FlushReport, NotificationDispatcher, NotificationRepository};
pub use reconciliation::{Mismatch, ReconciliationReport, ReconciliationRepository, Subject};
pub use savings::{
    ClosedAccount, MovementInput, OpenAccountInput, OpenedAccount, Posting, SavingsRepository,
};
