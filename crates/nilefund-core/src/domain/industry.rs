//! Fixed industry and revenue enumerations
//!
//! Industry attribution is a stored field chosen at project creation, never
//! inferred from a project's title.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Industry category a project belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndustryCategory {
    AgricultureTech,
    FinancialTech,
    HealthcareTech,
    ECommerce,
    EducationTech,
    LogisticsSupplyChain,
    RenewableEnergy,
    Other,
}

impl IndustryCategory {
    /// Every category, in display order
    pub const ALL: [IndustryCategory; 8] = [
        Self::AgricultureTech,
        Self::FinancialTech,
        Self::HealthcareTech,
        Self::ECommerce,
        Self::EducationTech,
        Self::LogisticsSupplyChain,
        Self::RenewableEnergy,
        Self::Other,
    ];

    /// Create from string representation (slug or display name)
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|category| {
            category.as_str() == normalized || category.display_name().to_lowercase() == normalized
        })
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgricultureTech => "agriculture_tech",
            Self::FinancialTech => "financial_tech",
            Self::HealthcareTech => "healthcare_tech",
            Self::ECommerce => "e_commerce",
            Self::EducationTech => "education_tech",
            Self::LogisticsSupplyChain => "logistics_supply_chain",
            Self::RenewableEnergy => "renewable_energy",
            Self::Other => "other",
        }
    }

    /// Human-readable label
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::AgricultureTech => "Agriculture Tech",
            Self::FinancialTech => "Financial Tech",
            Self::HealthcareTech => "Healthcare Tech",
            Self::ECommerce => "E-commerce",
            Self::EducationTech => "Education Tech",
            Self::LogisticsSupplyChain => "Logistics & Supply Chain",
            Self::RenewableEnergy => "Renewable Energy",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for IndustryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Self-reported monthly revenue bracket used in credit profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueBracket {
    PreRevenue,
    UpTo1k,
    UpTo5k,
    UpTo25k,
    UpTo100k,
    Above100k,
}

impl RevenueBracket {
    pub const ALL: [RevenueBracket; 6] = [
        Self::PreRevenue,
        Self::UpTo1k,
        Self::UpTo5k,
        Self::UpTo25k,
        Self::UpTo100k,
        Self::Above100k,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|bracket| {
            bracket.as_str() == normalized || bracket.display_name().to_lowercase() == normalized
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreRevenue => "pre_revenue",
            Self::UpTo1k => "up_to_1k",
            Self::UpTo5k => "up_to_5k",
            Self::UpTo25k => "up_to_25k",
            Self::UpTo100k => "up_to_100k",
            Self::Above100k => "above_100k",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PreRevenue => "Pre-revenue",
            Self::UpTo1k => "$1 - $1,000",
            Self::UpTo5k => "$1,001 - $5,000",
            Self::UpTo25k => "$5,001 - $25,000",
            Self::UpTo100k => "$25,001 - $100,000",
            Self::Above100k => "$100,001+",
        }
    }
}

impl fmt::Display for RevenueBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_industry_parsing_accepts_slug_and_label() {
        assert_eq!(
            IndustryCategory::from_str("financial_tech"),
            Some(IndustryCategory::FinancialTech)
        );
        assert_eq!(
            IndustryCategory::from_str("Logistics & Supply Chain"),
            Some(IndustryCategory::LogisticsSupplyChain)
        );
        assert_eq!(
            IndustryCategory::from_str("  e-commerce "),
            Some(IndustryCategory::ECommerce)
        );
        assert_eq!(IndustryCategory::from_str("crypto"), None);
    }

    #[test]
    fn test_industry_round_trips_through_as_str() {
        for category in IndustryCategory::ALL {
            assert_eq!(IndustryCategory::from_str(category.as_str()), Some(category));
        }
    }

    #[test]
    fn test_revenue_bracket_parsing() {
        assert_eq!(RevenueBracket::from_str("Pre-revenue"), Some(RevenueBracket::PreRevenue));
        assert_eq!(RevenueBracket::from_str("$100,001+"), Some(RevenueBracket::Above100k));
        assert_eq!(RevenueBracket::from_str("lots"), None);
    }
}
