//! Project aggregate
//!
//! A project owns its milestones, supporting documents and append-only funding
//! log. It is mutated only through the catalog, escrow and ledger services.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::milestone::{Milestone, MilestoneId};
use super::value_object::{Document, ProjectDraft};
use crate::domain::industry::IndustryCategory;
use crate::domain::ledger::FundingTransaction;
use crate::domain::scoring::CreditAssessment;
use crate::error::{Error, Result};

/// Project lifecycle status
///
/// `PendingApproval -> Funding -> Completed`, or `PendingApproval -> Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Awaiting admin review
    PendingApproval,
    /// Open to investors
    Funding,
    /// Funded amount reached the requested amount
    Completed,
    /// Turned down by an admin (terminal)
    Rejected,
}

impl ProjectStatus {
    /// Create from string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending_approval" => Some(Self::PendingApproval),
            "funding" => Some(Self::Funding),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingApproval => "pending_approval",
            Self::Funding => "funding",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    /// Whether the state machine has an edge from `self` to `next`
    pub fn can_transition_to(&self, next: ProjectStatus) -> bool {
        matches!(
            (self, next),
            (Self::PendingApproval, Self::Funding)
                | (Self::PendingApproval, Self::Rejected)
                | (Self::Funding, Self::Completed)
        )
    }

    /// Rejected projects are hidden from every investor-facing listing
    pub fn is_investor_visible(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Milestone-financed project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub industry: IndustryCategory,
    pub requested_amount: Decimal,
    /// Always equal to the sum of `transactions`
    pub funded_amount: Decimal,
    pub status: ProjectStatus,
    pub milestones: Vec<Milestone>,
    pub documents: Vec<Document>,
    pub transactions: Vec<FundingTransaction>,
    pub credit_assessment: Option<CreditAssessment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a pending project from a validated draft
    pub fn from_draft(draft: ProjectDraft) -> Result<Self> {
        draft.validate()?;

        let milestones = draft
            .milestones
            .into_iter()
            .zip(1u32..)
            .map(|(m, id)| Milestone::new(MilestoneId(id), m.name.trim().to_string(), m.percentage, m.expected_date))
            .collect();

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            title: draft.title.trim().to_string(),
            description: draft.description,
            industry: draft.industry,
            requested_amount: draft.requested_amount,
            funded_amount: Decimal::ZERO,
            status: ProjectStatus::PendingApproval,
            milestones,
            documents: draft.documents,
            transactions: Vec::new(),
            credit_assessment: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Update the modification timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn milestone(&self, milestone_id: MilestoneId) -> Option<&Milestone> {
        self.milestones.iter().find(|m| m.id == milestone_id)
    }

    /// Look up a milestone, failing with NotFound
    pub fn require_milestone(&self, milestone_id: MilestoneId) -> Result<&Milestone> {
        self.milestone(milestone_id).ok_or(Error::MilestoneNotFound {
            project_id: self.id,
            milestone_id,
        })
    }

    pub(crate) fn require_milestone_mut(&mut self, milestone_id: MilestoneId) -> Result<&mut Milestone> {
        let project_id = self.id;
        self.milestones
            .iter_mut()
            .find(|m| m.id == milestone_id)
            .ok_or(Error::MilestoneNotFound {
                project_id,
                milestone_id,
            })
    }

    /// Amount allocated to a milestone
    pub fn milestone_target(&self, milestone_id: MilestoneId) -> Result<Decimal> {
        Ok(self
            .require_milestone(milestone_id)?
            .target_amount(self.requested_amount))
    }

    /// Funding progress, capped at 100 and rounded to two decimals
    pub fn percent_complete(&self) -> Decimal {
        percent_complete(self.funded_amount, self.requested_amount)
    }

    /// Amount still needed to reach the requested amount
    pub fn remaining_amount(&self) -> Decimal {
        (self.requested_amount - self.funded_amount).max(Decimal::ZERO)
    }

    /// Sum of every recorded transaction
    pub fn ledger_total(&self) -> Decimal {
        self.transactions.iter().map(|tx| tx.amount).sum()
    }

    fn transition(&mut self, next: ProjectStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::invalid_transition("project", self.status, next));
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    pub(crate) fn approve(&mut self) -> Result<()> {
        self.transition(ProjectStatus::Funding)
    }

    pub(crate) fn reject(&mut self) -> Result<()> {
        self.transition(ProjectStatus::Rejected)
    }

    /// Append a transaction and flip to Completed when the threshold is crossed
    ///
    /// Returns true only on the call that completed the project.
    pub(crate) fn append_funding(&mut self, transaction: FundingTransaction) -> Result<bool> {
        self.funded_amount += transaction.amount;
        self.transactions.push(transaction);
        self.touch();

        if self.status == ProjectStatus::Funding && self.funded_amount >= self.requested_amount {
            self.transition(ProjectStatus::Completed)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Check the aggregate's structural invariants
    pub fn check_invariants(&self) -> Result<()> {
        let percentage_total: u32 = self.milestones.iter().map(|m| u32::from(m.percentage)).sum();
        if percentage_total != 100 {
            return Err(Error::DataIntegrity(format!(
                "project {} milestone percentages sum to {}",
                self.id, percentage_total
            )));
        }

        let ledger_total = self.ledger_total();
        if ledger_total != self.funded_amount {
            return Err(Error::DataIntegrity(format!(
                "project {} funded amount {} differs from ledger total {}",
                self.id, self.funded_amount, ledger_total
            )));
        }

        let reached = self.funded_amount >= self.requested_amount;
        let consistent = match self.status {
            ProjectStatus::Completed => reached,
            ProjectStatus::Funding => !reached,
            ProjectStatus::PendingApproval | ProjectStatus::Rejected => self.transactions.is_empty(),
        };
        if !consistent {
            return Err(Error::DataIntegrity(format!(
                "project {} has status {} with funded amount {} of {}",
                self.id, self.status, self.funded_amount, self.requested_amount
            )));
        }

        Ok(())
    }
}

/// `min(100, funded / requested * 100)`, rounded to two decimals
pub fn percent_complete(funded: Decimal, requested: Decimal) -> Decimal {
    if requested <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (funded / requested * Decimal::ONE_HUNDRED)
        .min(Decimal::ONE_HUNDRED)
        .round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::{InvestorId, TransactionId};
    use crate::error::ErrorKind;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn project() -> Project {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        Project::from_draft(
            ProjectDraft::new("CairoPay", "Mobile wallet", IndustryCategory::FinancialTech, dec!(50000))
                .milestone("App complete", 30, date)
                .milestone("Banking license", 70, date),
        )
        .unwrap()
    }

    fn transaction(project: &Project, id: u64, amount: Decimal) -> FundingTransaction {
        FundingTransaction {
            id: TransactionId(id),
            project_id: project.id,
            milestone_id: MilestoneId(1),
            milestone_name: "App complete".to_string(),
            investor: InvestorId::new("alice").unwrap(),
            amount,
            timestamp: Utc::now(),
            settlement_ref: format!("0.0.98765@{}", id),
        }
    }

    #[test]
    fn test_new_project_defaults() {
        let project = project();
        assert_eq!(project.status, ProjectStatus::PendingApproval);
        assert_eq!(project.funded_amount, Decimal::ZERO);
        assert_eq!(project.milestones[0].id, MilestoneId(1));
        assert_eq!(project.milestones[1].id, MilestoneId(2));
        assert!(project.check_invariants().is_ok());
    }

    #[test]
    fn test_state_machine_edges() {
        use ProjectStatus::*;
        assert!(PendingApproval.can_transition_to(Funding));
        assert!(PendingApproval.can_transition_to(Rejected));
        assert!(Funding.can_transition_to(Completed));
        assert!(!Funding.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Funding));
        assert!(!Completed.can_transition_to(Funding));
        assert!(!PendingApproval.can_transition_to(Completed));
    }

    #[test]
    fn test_approve_twice_fails_without_change() {
        let mut project = project();
        project.approve().unwrap();
        let before = project.clone();

        let error = project.approve().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidTransition);
        assert_eq!(project, before);
    }

    #[test]
    fn test_append_funding_completes_once() {
        let mut project = project();
        project.approve().unwrap();

        let tx = transaction(&project, 1, dec!(15000));
        assert!(!project.append_funding(tx).unwrap());
        assert_eq!(project.status, ProjectStatus::Funding);

        let tx = transaction(&project, 2, dec!(35000));
        assert!(project.append_funding(tx).unwrap());
        assert_eq!(project.status, ProjectStatus::Completed);

        let tx = transaction(&project, 3, dec!(1000));
        assert!(!project.append_funding(tx).unwrap());
        assert_eq!(project.status, ProjectStatus::Completed);
        assert_eq!(project.funded_amount, dec!(51000));
        assert!(project.check_invariants().is_ok());
    }

    #[test]
    fn test_percent_complete_is_capped() {
        assert_eq!(percent_complete(dec!(15000), dec!(50000)), dec!(30));
        assert_eq!(percent_complete(dec!(51000), dec!(50000)), dec!(100));
        assert_eq!(percent_complete(dec!(1), dec!(3)), dec!(33.33));
    }

    #[test]
    fn test_invariant_detects_ledger_drift() {
        let mut project = project();
        project.approve().unwrap();
        project.funded_amount = dec!(10);
        assert_eq!(project.check_invariants().unwrap_err().kind(), ErrorKind::DataIntegrity);
    }

    #[test]
    fn test_milestone_lookup() {
        let project = project();
        assert_eq!(project.milestone_target(MilestoneId(2)).unwrap(), dec!(35000));
        assert_eq!(
            project.require_milestone(MilestoneId(9)).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
