//! Credit scoring collaborator interface
//!
//! Scores are produced outside the core by a document-understanding service.
//! The core only stores the resulting assessment on the project profile; it
//! never validates or recomputes the score.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::industry::{IndustryCategory, RevenueBracket};

/// Everything the scoring service needs to assess a business
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditProfile {
    pub registration_document: String,
    pub business_plan: String,
    pub financial_report: String,
    pub industry: IndustryCategory,
    pub years_in_operation: u32,
    pub monthly_revenue: RevenueBracket,
    pub team_size: u32,
    pub goals_next_12_months: String,
}

/// Opaque scoring result attached to a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAssessment {
    /// Score reported by the collaborator, nominally 0-100
    pub score: u8,
    pub explanation: String,
    pub assessed_at: DateTime<Utc>,
}

impl CreditAssessment {
    pub fn new(score: u8, explanation: impl Into<String>) -> Self {
        Self {
            score,
            explanation: explanation.into(),
            assessed_at: Utc::now(),
        }
    }
}

/// The scoring service could not produce an assessment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Credit scoring failed: {reason}")]
pub struct ScoringFailure {
    pub reason: String,
}

/// External credit scoring service
#[async_trait]
pub trait CreditScorer: Send + Sync {
    async fn assess(&self, profile: &CreditProfile) -> std::result::Result<CreditAssessment, ScoringFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedScorer(u8);

    #[async_trait]
    impl CreditScorer for FixedScorer {
        async fn assess(&self, profile: &CreditProfile) -> std::result::Result<CreditAssessment, ScoringFailure> {
            if profile.registration_document.is_empty() {
                return Err(ScoringFailure {
                    reason: "registration document missing".to_string(),
                });
            }
            Ok(CreditAssessment::new(self.0, "steady revenue"))
        }
    }

    fn profile() -> CreditProfile {
        CreditProfile {
            registration_document: "ipfs://registration".to_string(),
            business_plan: "ipfs://plan".to_string(),
            financial_report: "ipfs://financials".to_string(),
            industry: IndustryCategory::FinancialTech,
            years_in_operation: 3,
            monthly_revenue: RevenueBracket::UpTo25k,
            team_size: 12,
            goals_next_12_months: "Expand to three new cities and double merchants".to_string(),
        }
    }

    // Verify trait is object-safe
    fn _assert_object_safe(_: &dyn CreditScorer) {}

    #[tokio::test]
    async fn test_scorer_outcomes() {
        let scorer = FixedScorer(72);
        let assessment = scorer.assess(&profile()).await.unwrap();
        assert_eq!(assessment.score, 72);

        let mut incomplete = profile();
        incomplete.registration_document.clear();
        let failure = scorer.assess(&incomplete).await.unwrap_err();
        assert!(failure.to_string().contains("registration document missing"));
    }
}
