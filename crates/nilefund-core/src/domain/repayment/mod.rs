//! Repayment domain module
//!
//! Loan accounts created for completed projects and their monthly
//! installments.

pub mod entity;
pub mod service;

pub use entity::{InstallmentId, InstallmentStatus, LoanAccount, LoanSummary, RepaymentInstallment};
pub use service::RepaymentScheduler;
