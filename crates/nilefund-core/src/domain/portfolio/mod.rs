//! Portfolio domain module
//!
//! Derived per-investor summaries and the industry distribution, maintained
//! incrementally and reproducible from the transaction logs.

pub mod service;
pub mod view;

pub use service::PortfolioAggregator;
pub use view::{FundedProjectSummary, FundingContext, IndustryDistributionEntry, PortfolioView, SummaryStatus};
