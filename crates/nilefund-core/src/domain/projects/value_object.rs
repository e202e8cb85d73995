//! Project value objects: creation drafts and supporting documents

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::industry::IndustryCategory;
use crate::error::{Error, Result};

/// Supporting document attached to a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    /// Storage reference (e.g. a content address or URL)
    pub reference: String,
}

impl Document {
    pub fn new(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference: reference.into(),
        }
    }
}

/// Milestone as submitted at project creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneDraft {
    pub name: String,
    pub percentage: u8,
    pub expected_date: NaiveDate,
}

impl MilestoneDraft {
    pub fn new(name: impl Into<String>, percentage: u8, expected_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            percentage,
            expected_date,
        }
    }
}

/// Input to `create_project`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub title: String,
    pub description: String,
    pub industry: IndustryCategory,
    pub requested_amount: Decimal,
    pub milestones: Vec<MilestoneDraft>,
    #[serde(default)]
    pub documents: Vec<Document>,
}

impl ProjectDraft {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        industry: IndustryCategory,
        requested_amount: Decimal,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            industry,
            requested_amount,
            milestones: Vec::new(),
            documents: Vec::new(),
        }
    }

    /// Append a milestone
    pub fn milestone(mut self, name: impl Into<String>, percentage: u8, expected_date: NaiveDate) -> Self {
        self.milestones
            .push(MilestoneDraft::new(name, percentage, expected_date));
        self
    }

    /// Append a supporting document
    pub fn document(mut self, name: impl Into<String>, reference: impl Into<String>) -> Self {
        self.documents.push(Document::new(name, reference));
        self
    }

    /// Validate the draft before a project is created from it
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("project title cannot be empty".to_string()));
        }
        if self.requested_amount <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "requested amount must be positive, got {}",
                self.requested_amount
            )));
        }
        if self.milestones.is_empty() {
            return Err(Error::Validation(
                "a project needs at least one milestone".to_string(),
            ));
        }

        let mut total: u32 = 0;
        for milestone in &self.milestones {
            if milestone.name.trim().is_empty() {
                return Err(Error::Validation("milestone name cannot be empty".to_string()));
            }
            if milestone.percentage > 100 {
                return Err(Error::Validation(format!(
                    "milestone '{}' has percentage {} (max 100)",
                    milestone.name, milestone.percentage
                )));
            }
            total += u32::from(milestone.percentage);
        }
        if total != 100 {
            return Err(Error::Validation(format!(
                "milestone percentages must sum to 100, got {}",
                total
            )));
        }

        for document in &self.documents {
            if document.name.trim().is_empty() {
                return Err(Error::Validation("document name cannot be empty".to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()
    }

    fn draft() -> ProjectDraft {
        ProjectDraft::new(
            "EcoHarvest",
            "AI-powered crop monitoring",
            IndustryCategory::AgricultureTech,
            dec!(50000),
        )
        .milestone("Beta launch", 30, date())
        .milestone("Onboard farmers", 70, date())
    }

    #[test]
    fn test_valid_draft() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn test_percentages_must_sum_to_100() {
        let draft = ProjectDraft::new("P", "", IndustryCategory::Other, dec!(1000))
            .milestone("a", 30, date())
            .milestone("b", 60, date());
        let error = draft.validate().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert!(error.to_string().contains("90"));
    }

    #[test]
    fn test_non_positive_requested_amount() {
        let mut draft = draft();
        draft.requested_amount = Decimal::ZERO;
        assert_eq!(draft.validate().unwrap_err().kind(), ErrorKind::Validation);

        draft.requested_amount = dec!(-10);
        assert_eq!(draft.validate().unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_empty_fields_rejected() {
        let mut untitled = draft();
        untitled.title = "   ".to_string();
        assert!(untitled.validate().is_err());

        let mut no_milestones = draft();
        no_milestones.milestones.clear();
        assert!(no_milestones.validate().is_err());

        let mut unnamed = draft();
        unnamed.milestones[0].name.clear();
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn test_single_percentage_over_100() {
        let draft = ProjectDraft::new("P", "", IndustryCategory::Other, dec!(1000))
            .milestone("a", 150, date());
        assert!(draft.validate().is_err());
    }
}
