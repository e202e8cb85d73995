//! Funding ledger domain module
//!
//! Append-only funding transactions and the service that records them.

pub mod lookup;
pub mod service;
pub mod transaction;

pub use lookup::{NoSettlementLookup, SettlementLookup, SettlementRecord, TransactionView};
pub use service::{FundingLedger, FundingReceipt, LedgerConfig};
pub use transaction::{FundingRequest, FundingTransaction, InvestorId, TransactionId};
