//! Audit records emitted by state-changing operations.
//!
//! Records are written after the financial transaction commits; they never
//! take part in it.

pub mod types;

pub use types::{AuditAction, AuditEntity, AuditRecord, SYSTEM_ACTOR};
