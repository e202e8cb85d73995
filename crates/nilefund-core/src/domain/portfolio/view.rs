//! Derived portfolio views
//!
//! A pure fold over the funding transaction stream. Applying transactions one
//! at a time and rebuilding from the full history produce identical views.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::industry::IndustryCategory;
use crate::domain::ledger::{FundingTransaction, InvestorId};
use crate::domain::projects::{percent_complete, Project, ProjectStatus};
use crate::error::{Error, Result};

/// Investor-facing status of a funded project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Active,
    Completed,
}

impl SummaryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for SummaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One investor's position in one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundedProjectSummary {
    pub investor: InvestorId,
    pub project_id: Uuid,
    pub project_title: String,
    pub total_invested: Decimal,
    pub percent_complete: Decimal,
    pub last_payment: DateTime<Utc>,
    pub status: SummaryStatus,
}

/// Cumulative funding for one industry category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryDistributionEntry {
    pub industry: IndustryCategory,
    pub total: Decimal,
}

/// Project state right after a transaction was appended
#[derive(Debug, Clone, Copy)]
pub struct FundingContext<'a> {
    pub title: &'a str,
    pub industry: IndustryCategory,
    pub requested_amount: Decimal,
    pub funded_after: Decimal,
    pub status_after: ProjectStatus,
}

impl<'a> FundingContext<'a> {
    /// Context taken from a project that already contains the transaction
    pub fn from_project(project: &'a Project) -> Self {
        Self {
            title: &project.title,
            industry: project.industry,
            requested_amount: project.requested_amount,
            funded_after: project.funded_amount,
            status_after: project.status,
        }
    }
}

/// Per-investor summaries and the industry distribution
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioView {
    summaries: BTreeMap<(InvestorId, Uuid), FundedProjectSummary>,
    distribution: BTreeMap<IndustryCategory, Decimal>,
    applied: u64,
}

impl Default for PortfolioView {
    fn default() -> Self {
        Self::new()
    }
}

impl PortfolioView {
    /// Empty view with every industry bucket seeded at zero
    pub fn new() -> Self {
        Self {
            summaries: BTreeMap::new(),
            distribution: IndustryCategory::ALL
                .iter()
                .map(|industry| (*industry, Decimal::ZERO))
                .collect(),
            applied: 0,
        }
    }

    /// Fold one transaction into the view
    ///
    /// Fails with DataIntegrity, leaving the view untouched, when the
    /// transaction's industry has no bucket.
    pub fn apply(&mut self, tx: &FundingTransaction, context: &FundingContext<'_>) -> Result<()> {
        let Some(bucket) = self.distribution.get_mut(&context.industry) else {
            return Err(Error::DataIntegrity(format!(
                "no distribution bucket for industry '{}'",
                context.industry.as_str()
            )));
        };
        *bucket += tx.amount;

        let status = if context.status_after == ProjectStatus::Completed {
            SummaryStatus::Completed
        } else {
            SummaryStatus::Active
        };
        let progress = percent_complete(context.funded_after, context.requested_amount);

        self.summaries
            .entry((tx.investor.clone(), tx.project_id))
            .and_modify(|summary| {
                summary.total_invested += tx.amount;
                summary.percent_complete = progress;
                summary.last_payment = tx.timestamp;
                summary.status = status;
            })
            .or_insert_with(|| FundedProjectSummary {
                investor: tx.investor.clone(),
                project_id: tx.project_id,
                project_title: context.title.to_string(),
                total_invested: tx.amount,
                percent_complete: progress,
                last_payment: tx.timestamp,
                status,
            });

        self.applied += 1;
        Ok(())
    }

    /// Recompute the view from every project's transaction log
    ///
    /// Transactions are replayed in id order with the project's running
    /// funded total, exactly as they were applied when recorded.
    pub fn rebuild<'a>(projects: impl IntoIterator<Item = &'a Project>) -> Result<Self> {
        let mut replay = Vec::new();
        for project in projects {
            let mut running = Decimal::ZERO;
            let mut transactions: Vec<&FundingTransaction> = project.transactions.iter().collect();
            transactions.sort_by_key(|tx| tx.id);
            for tx in transactions {
                running += tx.amount;
                let status_after = if running >= project.requested_amount {
                    ProjectStatus::Completed
                } else {
                    ProjectStatus::Funding
                };
                replay.push((
                    tx,
                    FundingContext {
                        title: &project.title,
                        industry: project.industry,
                        requested_amount: project.requested_amount,
                        funded_after: running,
                        status_after,
                    },
                ));
            }
        }
        replay.sort_by_key(|(tx, _)| tx.id);

        let mut view = Self::new();
        for (tx, context) in &replay {
            view.apply(tx, context)?;
        }
        Ok(view)
    }

    /// Number of transactions folded into this view
    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn summary(&self, investor: &InvestorId, project_id: Uuid) -> Option<&FundedProjectSummary> {
        self.summaries.get(&(investor.clone(), project_id))
    }

    /// Every summary held for one investor, ordered by project id
    pub fn summaries_for(&self, investor: &InvestorId) -> Vec<FundedProjectSummary> {
        self.summaries
            .values()
            .filter(|summary| &summary.investor == investor)
            .cloned()
            .collect()
    }

    pub fn all_summaries(&self) -> Vec<FundedProjectSummary> {
        self.summaries.values().cloned().collect()
    }

    /// One entry per known industry, zero totals included
    pub fn distribution(&self) -> Vec<IndustryDistributionEntry> {
        self.distribution
            .iter()
            .map(|(industry, total)| IndustryDistributionEntry {
                industry: *industry,
                total: *total,
            })
            .collect()
    }

    /// Sum over all industry buckets
    pub fn distribution_total(&self) -> Decimal {
        self.distribution.values().copied().sum()
    }

    #[cfg(test)]
    fn unseeded() -> Self {
        Self {
            summaries: BTreeMap::new(),
            distribution: BTreeMap::new(),
            applied: 0,
        }
    }
}
