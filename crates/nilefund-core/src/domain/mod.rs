//! Domain layer
//!
//! One module per aggregate or service. Projects own their milestones and
//! funding log; loan accounts own their installments. Everything else is a
//! service over those aggregates or a view derived from them.

pub mod admin;
pub mod escrow;
pub mod industry;
pub mod ledger;
pub mod locking;
pub mod portfolio;
pub mod projects;
pub mod repayment;
pub mod scoring;
