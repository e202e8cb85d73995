//! Historical settlement lookup
//!
//! The network mirror may report a corrected amount or timestamp for a
//! settlement. Those values are for display only; the stored transaction stays
//! the system of record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::transaction::FundingTransaction;

/// What the mirror knows about one settlement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub amount: Option<Decimal>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// External lookup keyed by settlement reference
#[async_trait]
pub trait SettlementLookup: Send + Sync {
    async fn lookup(&self, settlement_ref: &str) -> Option<SettlementRecord>;
}

/// Lookup that never knows anything, used when no mirror is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSettlementLookup;

#[async_trait]
impl SettlementLookup for NoSettlementLookup {
    async fn lookup(&self, _settlement_ref: &str) -> Option<SettlementRecord> {
        None
    }
}

/// Display row for one funding transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionView {
    pub transaction: FundingTransaction,
    pub display_amount: Decimal,
    pub display_timestamp: DateTime<Utc>,
    /// Whether the lookup reported a value differing from the ledger
    pub corrected: bool,
}

impl TransactionView {
    pub fn new(transaction: FundingTransaction, record: Option<SettlementRecord>) -> Self {
        let record = record.unwrap_or_default();
        let display_amount = record.amount.unwrap_or(transaction.amount);
        let display_timestamp = record.timestamp.unwrap_or(transaction.timestamp);
        let corrected = display_amount != transaction.amount || display_timestamp != transaction.timestamp;
        Self {
            transaction,
            display_amount,
            display_timestamp,
            corrected,
        }
    }
}
