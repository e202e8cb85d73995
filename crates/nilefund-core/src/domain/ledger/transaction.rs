//! Funding transaction records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::projects::MilestoneId;
use crate::error::{Error, Result};

/// Ledger-wide transaction identifier, strictly increasing in creation order
///
/// The default, zero, sits below every issued id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// Identity of the investor issuing a funding command
///
/// Deserialization goes through [`InvestorId::new`], so stored records obey
/// the same rules as fresh commands.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvestorId(String);

impl InvestorId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::Validation("investor id cannot be empty".to_string()));
        }
        Ok(Self(id.trim().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InvestorId {
    type Error = Error;

    fn try_from(id: String) -> Result<Self> {
        Self::new(id)
    }
}

impl From<InvestorId> for String {
    fn from(id: InvestorId) -> Self {
        id.0
    }
}

impl fmt::Display for InvestorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An append-only funding record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingTransaction {
    pub id: TransactionId,
    pub project_id: Uuid,
    pub milestone_id: MilestoneId,
    /// Milestone name at the time of funding
    pub milestone_name: String,
    pub investor: InvestorId,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Opaque reference to the external settlement
    pub settlement_ref: String,
}

/// A funding command as handed over by the settlement layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRequest {
    pub project_id: Uuid,
    pub milestone_id: MilestoneId,
    pub investor: InvestorId,
    pub amount: Decimal,
    pub settlement_ref: String,
}

impl FundingRequest {
    pub fn new(
        project_id: Uuid,
        milestone_id: MilestoneId,
        investor: InvestorId,
        amount: Decimal,
        settlement_ref: impl Into<String>,
    ) -> Self {
        Self {
            project_id,
            milestone_id,
            investor,
            amount,
            settlement_ref: settlement_ref.into(),
        }
    }

    /// Checks that need no project state
    pub fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(self.amount));
        }
        if self.settlement_ref.trim().is_empty() {
            return Err(Error::Validation(
                "settlement reference cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    #[test]
    fn test_investor_id_trims_and_rejects_empty() {
        assert_eq!(InvestorId::new("  alice ").unwrap().as_str(), "alice");
        assert_eq!(InvestorId::new(" ").unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_investor_id_deserialization_is_validated() {
        let id: InvestorId = serde_json::from_str("\" bob \"").unwrap();
        assert_eq!(id.as_str(), "bob");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"bob\"");

        assert!(serde_json::from_str::<InvestorId>("\"  \"").is_err());
        assert!(serde_json::from_str::<InvestorId>("\"\"").is_err());
    }

    #[test]
    fn test_request_validation() {
        let investor = InvestorId::new("alice").unwrap();
        let request = FundingRequest::new(Uuid::new_v4(), MilestoneId(1), investor, dec!(0), "0.0.1@1");
        assert!(matches!(request.validate(), Err(Error::InvalidAmount(_))));

        let mut request = request;
        request.amount = dec!(100);
        assert!(request.validate().is_ok());

        request.settlement_ref = String::new();
        assert_eq!(request.validate().unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_transaction_id_ordering() {
        assert!(TransactionId(2) > TransactionId(1));
        assert_eq!(TransactionId(7).to_string(), "tx-7");
    }
}
