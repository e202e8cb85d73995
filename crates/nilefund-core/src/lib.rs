//! Nilefund Core Library
//!
//! Milestone-based project financing engine:
//! - Project catalog with an approval workflow
//! - Milestone escrow state machine
//! - Append-only funding ledger
//! - Derived investor portfolio and industry distribution views
//! - Admin review queue
//! - Loan repayment schedules
//! - Storage (SQLite + JSONL export)

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod storage;

pub use engine::{FundingEngine, StateSnapshot};
pub use error::{Error, ErrorKind, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::industry::{IndustryCategory, RevenueBracket};
    pub use crate::domain::ledger::{FundingRequest, InvestorId};
    pub use crate::domain::projects::{MilestoneId, ProjectDraft, ProjectStatus};
    pub use crate::domain::repayment::InstallmentId;
    pub use crate::engine::{FundingEngine, StateSnapshot};
    pub use crate::error::{Error, ErrorKind, Result};
}
