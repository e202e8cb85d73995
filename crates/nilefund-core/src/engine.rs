//! Funding engine
//!
//! The command surface exposed to callers. Wires the catalog, escrow, ledger,
//! portfolio, admin queue and repayment scheduler over shared state.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::admin::AdminReviewQueue;
use crate::domain::escrow::MilestoneEscrow;
use crate::domain::ledger::{
    FundingLedger, FundingReceipt, FundingRequest, FundingTransaction, InvestorId, LedgerConfig,
    SettlementLookup, TransactionId, TransactionView,
};
use crate::domain::locking::LockConfig;
use crate::domain::portfolio::{FundedProjectSummary, IndustryDistributionEntry, PortfolioAggregator, PortfolioView};
use crate::domain::projects::{Milestone, MilestoneId, Project, ProjectCatalog, ProjectDraft, ProjectStatus};
use crate::domain::repayment::{InstallmentId, LoanAccount, LoanSummary, RepaymentInstallment, RepaymentScheduler};
use crate::domain::scoring::CreditAssessment;
use crate::error::{Error, Result};

/// Every durable record, as stored or exported
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub projects: Vec<Project>,
    pub loans: Vec<LoanAccount>,
}

impl StateSnapshot {
    /// Highest transaction id across every project
    pub fn highest_transaction_id(&self) -> Option<TransactionId> {
        self.projects
            .iter()
            .flat_map(|project| project.transactions.iter().map(|tx| tx.id))
            .max()
    }

    /// Reject records that collide on identity
    ///
    /// Every project id, loan id and transaction id must be unique across
    /// the snapshot, and every loan must belong to a listed project.
    pub fn check_identities(&self) -> Result<()> {
        let mut projects = HashSet::new();
        let mut transactions = HashSet::new();
        for project in &self.projects {
            if !projects.insert(project.id) {
                return Err(Error::DataIntegrity(format!("project {} appears twice", project.id)));
            }
            for tx in &project.transactions {
                if !transactions.insert(tx.id) {
                    return Err(Error::DataIntegrity(format!(
                        "{} is recorded more than once (seen again in project {})",
                        tx.id, project.id
                    )));
                }
            }
        }

        let mut loans = HashSet::new();
        for loan in &self.loans {
            if !loans.insert(loan.project_id) {
                return Err(Error::DataIntegrity(format!(
                    "project {} has more than one loan",
                    loan.project_id
                )));
            }
            if !projects.contains(&loan.project_id) {
                return Err(Error::DataIntegrity(format!(
                    "loan for unknown project {}",
                    loan.project_id
                )));
            }
        }
        Ok(())
    }
}

/// Result of a consistency check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub projects: usize,
    pub transactions: u64,
    pub total_funded: Decimal,
}

/// Milestone-based project financing engine
#[derive(Debug, Clone)]
pub struct FundingEngine {
    catalog: Arc<ProjectCatalog>,
    escrow: MilestoneEscrow,
    ledger: Arc<FundingLedger>,
    portfolio: Arc<PortfolioAggregator>,
    admin: AdminReviewQueue,
    repayments: Arc<RepaymentScheduler>,
}

impl Default for FundingEngine {
    fn default() -> Self {
        Self::new(LockConfig::default(), LedgerConfig::default())
    }
}

impl FundingEngine {
    pub fn new(lock_config: LockConfig, ledger_config: LedgerConfig) -> Self {
        let catalog = Arc::new(ProjectCatalog::new(lock_config.clone()));
        let portfolio = Arc::new(PortfolioAggregator::new());
        let escrow = MilestoneEscrow::new(catalog.clone());
        let ledger = Arc::new(FundingLedger::new(catalog.clone(), portfolio.clone(), ledger_config));
        let admin = AdminReviewQueue::new(catalog.clone(), escrow.clone());
        let repayments = Arc::new(RepaymentScheduler::new(lock_config));

        Self {
            catalog,
            escrow,
            ledger,
            portfolio,
            admin,
            repayments,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.lock_config(), config.ledger_config())
    }

    pub fn admin(&self) -> &AdminReviewQueue {
        &self.admin
    }

    // Projects

    pub async fn create_project(&self, draft: ProjectDraft) -> Result<Project> {
        self.catalog.create_project(draft).await
    }

    pub async fn approve_project(&self, project_id: Uuid) -> Result<Project> {
        self.admin.approve_project(project_id).await
    }

    pub async fn reject_project(&self, project_id: Uuid) -> Result<Project> {
        self.admin.reject_project(project_id).await
    }

    pub async fn get_project(&self, project_id: Uuid) -> Result<Project> {
        self.catalog.get_project(project_id).await
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.catalog.list_projects().await
    }

    pub async fn list_open_projects(&self) -> Result<Vec<Project>> {
        self.catalog.list_open_projects().await
    }

    pub async fn attach_credit_assessment(
        &self,
        project_id: Uuid,
        assessment: CreditAssessment,
    ) -> Result<Project> {
        self.catalog.attach_credit_assessment(project_id, assessment).await
    }

    // Milestones

    pub async fn submit_milestone(
        &self,
        project_id: Uuid,
        milestone_id: MilestoneId,
        proof_reference: &str,
    ) -> Result<Milestone> {
        self.escrow
            .submit_for_verification(project_id, milestone_id, proof_reference)
            .await
    }

    pub async fn verify_milestone(
        &self,
        project_id: Uuid,
        milestone_id: MilestoneId,
        release_reference: Option<&str>,
    ) -> Result<Milestone> {
        self.admin
            .verify_milestone(project_id, milestone_id, release_reference)
            .await
    }

    pub async fn reject_milestone(&self, project_id: Uuid, milestone_id: MilestoneId) -> Result<Milestone> {
        self.admin.reject_milestone(project_id, milestone_id).await
    }

    pub async fn fundable_milestones(&self, project_id: Uuid) -> Result<Vec<Milestone>> {
        self.escrow.fundable_milestones(project_id).await
    }

    // Funding

    pub async fn record_funding(&self, request: FundingRequest) -> Result<FundingReceipt> {
        self.ledger.record_funding(request).await
    }

    pub async fn transactions(&self, project_id: Uuid) -> Result<Vec<FundingTransaction>> {
        self.ledger.transactions(project_id).await
    }

    pub async fn transaction_history(
        &self,
        project_id: Uuid,
        lookup: &dyn SettlementLookup,
    ) -> Result<Vec<TransactionView>> {
        self.ledger.transaction_history(project_id, lookup).await
    }

    // Portfolio

    pub async fn investor_summaries(&self, investor: &InvestorId) -> Vec<FundedProjectSummary> {
        self.portfolio.investor_summaries(investor).await
    }

    pub async fn industry_distribution(&self) -> Vec<IndustryDistributionEntry> {
        self.portfolio.industry_distribution().await
    }

    /// Recompute the portfolio from every transaction log and install it
    ///
    /// Fails with a conflict, keeping the current view, if funding landed
    /// while the rebuild was computed.
    pub async fn rebuild_portfolio(&self) -> Result<PortfolioView> {
        let projects = self.catalog.all_projects().await?;
        let rebuilt = PortfolioView::rebuild(&projects)?;
        if !self.portfolio.replace_if_current(rebuilt.clone()).await {
            return Err(Error::Conflict(
                "funding was recorded during the portfolio rebuild".to_string(),
            ));
        }
        info!(transactions = rebuilt.applied(), "Portfolio rebuilt");
        Ok(rebuilt)
    }

    /// Compare the incremental portfolio with a full recomputation
    pub async fn verify_consistency(&self) -> Result<ConsistencyReport> {
        let projects = self.catalog.all_projects().await?;
        for project in &projects {
            project.check_invariants()?;
        }

        let rebuilt = PortfolioView::rebuild(&projects)?;
        let current = self.portfolio.snapshot().await;
        if current.applied() != rebuilt.applied() {
            return Err(Error::Conflict(
                "funding was recorded during the consistency check".to_string(),
            ));
        }
        if current != rebuilt {
            warn!("Incremental portfolio differs from recomputation");
            return Err(Error::DataIntegrity(
                "incremental portfolio differs from a full recomputation".to_string(),
            ));
        }

        let total_funded = FundingLedger::total_recorded(&projects);
        if current.distribution_total() != total_funded {
            return Err(Error::DataIntegrity(format!(
                "industry distribution totals {} but {} was funded",
                current.distribution_total(),
                total_funded
            )));
        }

        Ok(ConsistencyReport {
            projects: projects.len(),
            transactions: current.applied(),
            total_funded,
        })
    }

    // Repayment

    /// Open a repayment schedule for a completed project
    pub async fn create_schedule(
        &self,
        project_id: Uuid,
        total_amount: Decimal,
        installment_count: u32,
        start_date: NaiveDate,
    ) -> Result<LoanAccount> {
        let project = self.catalog.get_project(project_id).await?;
        if project.status != ProjectStatus::Completed {
            return Err(Error::invalid_transition(
                "loan for project",
                project.status,
                "repayment",
            ));
        }
        self.repayments
            .create_schedule(project_id, total_amount, installment_count, start_date)
            .await
    }

    pub async fn record_payment(&self, installment_id: InstallmentId) -> Result<RepaymentInstallment> {
        self.repayments.record_payment(installment_id).await
    }

    pub async fn schedule(&self, project_id: Uuid, as_of: NaiveDate) -> Result<LoanAccount> {
        self.repayments.schedule(project_id, as_of).await
    }

    pub async fn advance_overdue(&self, project_id: Uuid, as_of: NaiveDate) -> Result<LoanAccount> {
        self.repayments.advance_overdue(project_id, as_of).await
    }

    pub async fn loan_summary(&self, project_id: Uuid, as_of: NaiveDate) -> Result<LoanSummary> {
        self.repayments.loan_summary(project_id, as_of).await
    }

    // State

    /// Copy of every durable record
    pub async fn snapshot(&self) -> Result<StateSnapshot> {
        Ok(StateSnapshot {
            projects: self.catalog.all_projects().await?,
            loans: self.repayments.all_loans().await?,
        })
    }

    /// Issue future transaction ids above `highest`
    ///
    /// For ids handed out by other writers to the same store that the
    /// restored snapshot does not show.
    pub fn reseed_transactions(&self, highest: TransactionId) {
        self.ledger.reseed(highest);
    }

    /// Replace all state with a stored snapshot
    ///
    /// Derived views are recomputed from the transaction logs and the
    /// transaction sequence continues above the highest stored id.
    pub async fn restore(&self, snapshot: StateSnapshot) -> Result<()> {
        snapshot.check_identities()?;
        for project in &snapshot.projects {
            project.check_invariants()?;
        }
        for loan in &snapshot.loans {
            loan.check_invariants()?;
        }
        let view = PortfolioView::rebuild(&snapshot.projects)?;
        if let Some(highest) = snapshot.highest_transaction_id() {
            self.ledger.reseed(highest);
        }

        let project_count = snapshot.projects.len();
        let loan_count = snapshot.loans.len();
        self.catalog.load(snapshot.projects).await?;
        self.repayments.load(snapshot.loans).await?;
        self.portfolio.replace(view).await;

        info!(projects = project_count, loans = loan_count, "State restored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::industry::IndustryCategory;
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
    }

    async fn funded_project(engine: &FundingEngine, requested: Decimal) -> Project {
        let project = engine
            .create_project(
                ProjectDraft::new("Mazraa", "Drip irrigation", IndustryCategory::AgricultureTech, requested)
                    .milestone("Pilot farm", 100, date()),
            )
            .await
            .unwrap();
        engine.approve_project(project.id).await.unwrap();
        project
    }

    fn request(project_id: Uuid, amount: Decimal) -> FundingRequest {
        FundingRequest::new(
            project_id,
            MilestoneId(1),
            InvestorId::new("amira").unwrap(),
            amount,
            "0.0.777@1",
        )
    }

    #[tokio::test]
    async fn test_schedule_requires_completed_project() {
        let engine = FundingEngine::default();
        let project = funded_project(&engine, dec!(1000)).await;

        let error = engine
            .create_schedule(project.id, dec!(1000), 4, date())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidTransition);

        engine.record_funding(request(project.id, dec!(1000))).await.unwrap();
        let loan = engine.create_schedule(project.id, dec!(1000), 4, date()).await.unwrap();
        assert_eq!(loan.installments.len(), 4);

        let error = engine
            .create_schedule(Uuid::new_v4(), dec!(1000), 4, date())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_snapshot_restore_rebuilds_portfolio() {
        let engine = FundingEngine::default();
        let project = funded_project(&engine, dec!(1000)).await;
        engine.record_funding(request(project.id, dec!(400))).await.unwrap();
        engine.record_funding(request(project.id, dec!(600))).await.unwrap();
        engine.create_schedule(project.id, dec!(1000), 2, date()).await.unwrap();

        let snapshot = engine.snapshot().await.unwrap();
        let restored = FundingEngine::default();
        restored.restore(snapshot.clone()).await.unwrap();

        assert_eq!(restored.snapshot().await.unwrap(), snapshot);
        let investor = InvestorId::new("amira").unwrap();
        assert_eq!(
            restored.investor_summaries(&investor).await,
            engine.investor_summaries(&investor).await
        );
        assert_eq!(restored.industry_distribution().await, engine.industry_distribution().await);

        // sequence continues above restored ids
        let receipt = restored.record_funding(request(project.id, dec!(5))).await.unwrap();
        assert_eq!(receipt.transaction.id.0, 3);
    }

    #[tokio::test]
    async fn test_verify_consistency_and_rebuild() {
        let engine = FundingEngine::default();
        let project = funded_project(&engine, dec!(1000)).await;
        engine.record_funding(request(project.id, dec!(250))).await.unwrap();

        let report = engine.verify_consistency().await.unwrap();
        assert_eq!(report.transactions, 1);
        assert_eq!(report.total_funded, dec!(250));

        let rebuilt = engine.rebuild_portfolio().await.unwrap();
        assert_eq!(rebuilt.distribution_total(), dec!(250));
    }

    #[tokio::test]
    async fn test_restore_rejects_corrupt_project() {
        let engine = FundingEngine::default();
        let project = funded_project(&engine, dec!(1000)).await;
        engine.record_funding(request(project.id, dec!(250))).await.unwrap();

        let mut snapshot = engine.snapshot().await.unwrap();
        snapshot.projects[0].funded_amount = dec!(999);

        let restored = FundingEngine::default();
        let error = restored.restore(snapshot).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::DataIntegrity);
    }

    #[tokio::test]
    async fn test_restore_rejects_colliding_records() {
        let engine = FundingEngine::default();
        let first = funded_project(&engine, dec!(1000)).await;
        let second = funded_project(&engine, dec!(1000)).await;
        engine.record_funding(request(first.id, dec!(1000))).await.unwrap();
        engine.record_funding(request(second.id, dec!(300))).await.unwrap();
        engine.create_schedule(first.id, dec!(1000), 2, date()).await.unwrap();
        let snapshot = engine.snapshot().await.unwrap();

        let mut duplicate_project = snapshot.clone();
        duplicate_project.projects.push(snapshot.projects[0].clone());

        let mut duplicate_loan = snapshot.clone();
        duplicate_loan.loans.push(snapshot.loans[0].clone());

        let mut orphan_loan = snapshot.clone();
        orphan_loan.loans[0].project_id = Uuid::new_v4();

        // same transaction id in two different projects
        let mut duplicate_tx = snapshot.clone();
        let second_index = duplicate_tx.projects.iter().position(|p| p.id == second.id).unwrap();
        duplicate_tx.projects[second_index].transactions[0].id = TransactionId(1);

        for broken in [duplicate_project, duplicate_loan, orphan_loan, duplicate_tx] {
            let restored = FundingEngine::default();
            let error = restored.restore(broken).await.unwrap_err();
            assert_eq!(error.kind(), ErrorKind::DataIntegrity);
            assert!(restored.list_projects().await.unwrap().is_empty());
            assert_eq!(restored.industry_distribution().await.iter().map(|e| e.total).sum::<Decimal>(), Decimal::ZERO);
        }

        let restored = FundingEngine::default();
        restored.restore(snapshot).await.unwrap();
    }
}
