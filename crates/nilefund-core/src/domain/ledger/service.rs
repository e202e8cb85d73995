//! Funding ledger service
//!
//! Records funding against a project milestone. The transaction, the funded
//! total, the completion flip and the portfolio update land together or not
//! at all.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use super::lookup::{SettlementLookup, TransactionView};
use super::transaction::{FundingRequest, FundingTransaction, TransactionId};
use crate::domain::portfolio::{FundingContext, PortfolioAggregator};
use crate::domain::projects::{Project, ProjectCatalog, ProjectStatus};
use crate::error::{Error, Result};

/// Ledger behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Accept funding beyond the requested amount, including on Completed projects
    pub allow_overfunding: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            allow_overfunding: true,
        }
    }
}

/// Outcome of a successful funding command
#[derive(Debug, Clone, PartialEq)]
pub struct FundingReceipt {
    pub transaction: FundingTransaction,
    /// Project state after the transaction
    pub project: Project,
    /// True only for the transaction that completed the project
    pub completed_now: bool,
}

/// Append-only funding ledger
#[derive(Debug)]
pub struct FundingLedger {
    catalog: Arc<ProjectCatalog>,
    portfolio: Arc<PortfolioAggregator>,
    next_id: AtomicU64,
    config: LedgerConfig,
}

impl FundingLedger {
    pub fn new(catalog: Arc<ProjectCatalog>, portfolio: Arc<PortfolioAggregator>, config: LedgerConfig) -> Self {
        Self {
            catalog,
            portfolio,
            next_id: AtomicU64::new(1),
            config,
        }
    }

    pub fn config(&self) -> LedgerConfig {
        self.config
    }

    /// Record one funding command
    pub async fn record_funding(&self, request: FundingRequest) -> Result<FundingReceipt> {
        request.validate()?;

        let mut guard = self.catalog.lock_project(request.project_id).await?;
        self.check_preconditions(&guard, &request)?;

        let milestone_name = guard.require_milestone(request.milestone_id)?.name.clone();
        let transaction = FundingTransaction {
            id: TransactionId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            project_id: request.project_id,
            milestone_id: request.milestone_id,
            milestone_name,
            investor: request.investor,
            amount: request.amount,
            timestamp: Utc::now(),
            settlement_ref: request.settlement_ref,
        };

        let mut draft = (*guard).clone();
        let completed_now = draft.append_funding(transaction.clone())?;
        draft.check_invariants()?;
        self.portfolio
            .record(&transaction, &FundingContext::from_project(&draft))
            .await?;
        *guard = draft.clone();
        drop(guard);

        info!(
            transaction_id = %transaction.id,
            project_id = %transaction.project_id,
            milestone_id = %transaction.milestone_id,
            investor = %transaction.investor,
            amount = %transaction.amount,
            funded_amount = %draft.funded_amount,
            "Funding recorded"
        );
        if completed_now {
            info!(
                project_id = %draft.id,
                funded_amount = %draft.funded_amount,
                requested_amount = %draft.requested_amount,
                "Project fully funded"
            );
        }

        Ok(FundingReceipt {
            transaction,
            project: draft,
            completed_now,
        })
    }

    fn check_preconditions(&self, project: &Project, request: &FundingRequest) -> Result<()> {
        let accepting = match project.status {
            ProjectStatus::Funding => true,
            ProjectStatus::Completed => self.config.allow_overfunding,
            ProjectStatus::PendingApproval | ProjectStatus::Rejected => false,
        };
        if !accepting {
            return Err(Error::ProjectNotFunding {
                project_id: project.id,
                status: project.status,
            });
        }

        let milestone = project.require_milestone(request.milestone_id)?;
        if !milestone.is_open_for_funding() {
            return Err(Error::MilestoneClosed {
                project_id: project.id,
                milestone_id: milestone.id,
            });
        }

        if !self.config.allow_overfunding && request.amount > project.remaining_amount() {
            warn!(
                project_id = %project.id,
                amount = %request.amount,
                remaining = %project.remaining_amount(),
                "Funding exceeds remaining amount"
            );
            return Err(Error::InvalidAmount(request.amount));
        }
        Ok(())
    }

    /// Keep issued ids above every id already in the ledger
    pub(crate) fn reseed(&self, highest: TransactionId) {
        self.next_id.fetch_max(highest.0.saturating_add(1), Ordering::SeqCst);
    }

    /// The project's transactions, oldest first
    pub async fn transactions(&self, project_id: Uuid) -> Result<Vec<FundingTransaction>> {
        let mut transactions = self.catalog.get_project(project_id).await?.transactions;
        transactions.sort_by_key(|tx| tx.id);
        Ok(transactions)
    }

    /// Transactions with any display corrections from the settlement mirror
    pub async fn transaction_history(
        &self,
        project_id: Uuid,
        lookup: &dyn SettlementLookup,
    ) -> Result<Vec<TransactionView>> {
        let mut rows = Vec::new();
        for transaction in self.transactions(project_id).await? {
            let record = lookup.lookup(&transaction.settlement_ref).await;
            rows.push(TransactionView::new(transaction, record));
        }
        Ok(rows)
    }

    /// Total recorded across the given projects
    pub fn total_recorded(projects: &[Project]) -> Decimal {
        projects.iter().map(Project::ledger_total).sum()
    }
}
