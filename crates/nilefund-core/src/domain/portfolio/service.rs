//! Portfolio aggregator service

use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::view::{FundedProjectSummary, FundingContext, IndustryDistributionEntry, PortfolioView};
use crate::domain::ledger::{FundingTransaction, InvestorId};
use crate::error::Result;

/// Holder of the incrementally maintained portfolio view
#[derive(Debug, Default)]
pub struct PortfolioAggregator {
    view: RwLock<PortfolioView>,
}

impl PortfolioAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a freshly recorded transaction into the view
    ///
    /// Called with the owning project's lock held.
    pub(crate) async fn record(&self, tx: &FundingTransaction, context: &FundingContext<'_>) -> Result<()> {
        let mut view = self.view.write().await;
        if let Err(error) = view.apply(tx, context) {
            warn!(transaction_id = %tx.id, error = %error, "Portfolio update rejected");
            return Err(error);
        }
        debug!(transaction_id = %tx.id, project_id = %tx.project_id, "Portfolio updated");
        Ok(())
    }

    /// Every project summary for one investor
    pub async fn investor_summaries(&self, investor: &InvestorId) -> Vec<FundedProjectSummary> {
        self.view.read().await.summaries_for(investor)
    }

    /// Distribution across every industry, zero totals included
    pub async fn industry_distribution(&self) -> Vec<IndustryDistributionEntry> {
        self.view.read().await.distribution()
    }

    /// Copy of the current view
    pub async fn snapshot(&self) -> PortfolioView {
        self.view.read().await.clone()
    }

    /// Swap in a rebuilt view if no transaction landed since it was computed
    ///
    /// Returns false, keeping the current view, when the transaction counts
    /// differ.
    pub(crate) async fn replace_if_current(&self, rebuilt: PortfolioView) -> bool {
        let mut view = self.view.write().await;
        if view.applied() != rebuilt.applied() {
            return false;
        }
        *view = rebuilt;
        true
    }

    /// Unconditionally install a view
    pub(crate) async fn replace(&self, rebuilt: PortfolioView) {
        *self.view.write().await = rebuilt;
    }
}
