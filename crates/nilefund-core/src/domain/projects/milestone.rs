//! Milestone entity and its escrow state machine

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Milestone identifier, unique within its project
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MilestoneId(pub u32);

impl fmt::Display for MilestoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Escrow status of a milestone
///
/// `Pending -> Verified -> Released`, with `Verified -> Pending` as the only
/// backward edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    /// Work not yet submitted (or sent back by an admin)
    Pending,
    /// Submitted by the funded party, awaiting admin verification
    Verified,
    /// Verified by an admin; allocated funds are final
    Released,
}

impl MilestoneStatus {
    /// Create from string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "verified" => Some(Self::Verified),
            "released" => Some(Self::Released),
            _ => None,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Released => "released",
        }
    }

    /// Whether the state machine has an edge from `self` to `next`
    pub fn can_transition_to(&self, next: MilestoneStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Verified)
                | (Self::Verified, Self::Released)
                | (Self::Verified, Self::Pending)
        )
    }

    /// Funding may target a milestone until it is released
    pub fn is_open_for_funding(&self) -> bool {
        !matches!(self, Self::Released)
    }
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A percentage-weighted unit of project work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub name: String,
    /// Share of the project's requested amount, 0-100
    pub percentage: u8,
    pub expected_date: NaiveDate,
    pub status: MilestoneStatus,
    /// Last time the funded party submitted the milestone
    pub submitted_at: Option<DateTime<Utc>>,
    /// Evidence of completion from the latest submission (e.g. a document CID)
    #[serde(default)]
    pub proof_reference: Option<String>,
    pub released_at: Option<DateTime<Utc>>,
    /// Settlement reference of the payout, when the admin recorded one
    #[serde(default)]
    pub release_reference: Option<String>,
}

impl Milestone {
    pub fn new(id: MilestoneId, name: String, percentage: u8, expected_date: NaiveDate) -> Self {
        Self {
            id,
            name,
            percentage,
            expected_date,
            status: MilestoneStatus::Pending,
            submitted_at: None,
            proof_reference: None,
            released_at: None,
            release_reference: None,
        }
    }

    /// Amount allocated to this milestone out of `requested_amount`
    pub fn target_amount(&self, requested_amount: Decimal) -> Decimal {
        requested_amount * Decimal::from(self.percentage) / Decimal::ONE_HUNDRED
    }

    pub fn is_open_for_funding(&self) -> bool {
        self.status.is_open_for_funding()
    }

    fn transition(&mut self, next: MilestoneStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::invalid_transition(
                format!("milestone {}", self.id),
                self.status,
                next,
            ));
        }
        self.status = next;
        Ok(())
    }

    /// Funded party asserts the work is done, attaching proof
    ///
    /// A new submission replaces any proof left from a rejected one.
    pub(crate) fn submit(&mut self, proof_reference: &str) -> Result<()> {
        let proof_reference = proof_reference.trim();
        if proof_reference.is_empty() {
            return Err(Error::Validation(format!(
                "milestone {} needs a proof of completion to be submitted",
                self.id
            )));
        }
        self.transition(MilestoneStatus::Verified)?;
        self.submitted_at = Some(Utc::now());
        self.proof_reference = Some(proof_reference.to_string());
        Ok(())
    }

    /// Admin confirms completion and releases the allocation
    pub(crate) fn release(&mut self, release_reference: Option<&str>) -> Result<()> {
        self.transition(MilestoneStatus::Released)?;
        self.released_at = Some(Utc::now());
        self.release_reference = release_reference
            .map(str::trim)
            .filter(|reference| !reference.is_empty())
            .map(str::to_string);
        Ok(())
    }

    /// Admin sends the submission back for rework; the proof stays on record
    pub(crate) fn send_back(&mut self) -> Result<()> {
        self.transition(MilestoneStatus::Pending)
    }
}
