//! Error types for Nilefund

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::projects::{MilestoneId, ProjectStatus};
use crate::domain::repayment::InstallmentId;

/// Result type alias using Nilefund's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Nilefund error types
///
/// Every failed command leaves projects, milestones, the ledger and the
/// derived views exactly as they were before the call.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors (E001-E099)
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid amount {0}: funding amounts must be greater than zero")]
    InvalidAmount(Decimal),

    // State machine errors (E100-E199)
    #[error("Invalid transition: {entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    // Entity errors (E200-E299)
    #[error("Project '{0}' not found.")]
    ProjectNotFound(Uuid),

    #[error("Milestone {milestone_id} not found in project '{project_id}'.")]
    MilestoneNotFound {
        project_id: Uuid,
        milestone_id: MilestoneId,
    },

    #[error("No loan account exists for project '{0}'.")]
    LoanNotFound(Uuid),

    #[error("Installment {0} not found.")]
    InstallmentNotFound(InstallmentId),

    // Funding errors (E300-E399)
    #[error("Milestone {milestone_id} of project '{project_id}' is released and closed to funding")]
    MilestoneClosed {
        project_id: Uuid,
        milestone_id: MilestoneId,
    },

    #[error("Project '{project_id}' is not accepting funding (status: {status})")]
    ProjectNotFunding {
        project_id: Uuid,
        status: ProjectStatus,
    },

    // Repayment errors (E400-E499)
    #[error("Installment {0} has already been paid")]
    AlreadyPaid(InstallmentId),

    // Integrity errors (E500-E599)
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    // Concurrency errors (E600-E699)
    #[error("Lock timeout: {0} is held by another operation. Try again later.")]
    LockTimeout(String),

    #[error("Concurrent update conflict: {0}. Try again later.")]
    Conflict(String),

    // Storage errors (E700-E799)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The caller-facing classification of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InvalidTransition,
    NotFound,
    MilestoneClosed,
    ProjectNotFunding,
    AlreadyPaid,
    DataIntegrity,
    Concurrency,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::InvalidTransition => "invalid_transition",
            Self::NotFound => "not_found",
            Self::MilestoneClosed => "milestone_closed",
            Self::ProjectNotFunding => "project_not_funding",
            Self::AlreadyPaid => "already_paid",
            Self::DataIntegrity => "data_integrity",
            Self::Concurrency => "concurrency",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Error {
    /// Shorthand for a state machine violation
    pub fn invalid_transition(
        entity: impl Into<String>,
        from: impl fmt::Display,
        to: impl fmt::Display,
    ) -> Self {
        Self::InvalidTransition {
            entity: entity.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Get the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::InvalidAmount(_) => ErrorKind::Validation,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::ProjectNotFound(_)
            | Self::MilestoneNotFound { .. }
            | Self::LoanNotFound(_)
            | Self::InstallmentNotFound(_) => ErrorKind::NotFound,
            Self::MilestoneClosed { .. } => ErrorKind::MilestoneClosed,
            Self::ProjectNotFunding { .. } => ErrorKind::ProjectNotFunding,
            Self::AlreadyPaid(_) => ErrorKind::AlreadyPaid,
            Self::DataIntegrity(_) => ErrorKind::DataIntegrity,
            Self::LockTimeout(_) | Self::Conflict(_) => ErrorKind::Concurrency,
            Self::DatabaseError(_) | Self::Serialization(_) | Self::Storage(_) | Self::Io(_) => {
                ErrorKind::Storage
            }
        }
    }

    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E001",
            Self::InvalidAmount(_) => "E002",
            Self::InvalidTransition { .. } => "E100",
            Self::ProjectNotFound(_) => "E200",
            Self::MilestoneNotFound { .. } => "E201",
            Self::LoanNotFound(_) => "E202",
            Self::InstallmentNotFound(_) => "E203",
            Self::MilestoneClosed { .. } => "E300",
            Self::ProjectNotFunding { .. } => "E301",
            Self::AlreadyPaid(_) => "E400",
            Self::DataIntegrity(_) => "E500",
            Self::LockTimeout(_) => "E600",
            Self::Conflict(_) => "E601",
            Self::DatabaseError(_) => "E700",
            Self::Serialization(_) => "E701",
            Self::Storage(_) | Self::Io(_) => "E702",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_kinds() {
        let error = Error::Validation("milestone percentages sum to 90".to_string());
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_eq!(error.code(), "E001");
        assert!(error.to_string().contains("sum to 90"));

        let error = Error::InvalidAmount(Decimal::ZERO);
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_eq!(error.code(), "E002");
    }

    #[test]
    fn test_not_found_kinds() {
        let project_id = Uuid::new_v4();
        assert_eq!(Error::ProjectNotFound(project_id).kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::MilestoneNotFound {
                project_id,
                milestone_id: MilestoneId(3),
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            Error::InstallmentNotFound(InstallmentId::new(project_id, 4)).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_invalid_transition_message() {
        let error = Error::invalid_transition("project", ProjectStatus::Funding, ProjectStatus::Rejected);
        assert_eq!(error.kind(), ErrorKind::InvalidTransition);
        assert_eq!(
            error.to_string(),
            "Invalid transition: project cannot move from funding to rejected"
        );
    }

    #[test]
    fn test_project_not_funding_message() {
        let project_id = Uuid::new_v4();
        let error = Error::ProjectNotFunding {
            project_id,
            status: ProjectStatus::PendingApproval,
        };
        assert_eq!(error.code(), "E301");
        assert!(error.to_string().contains("pending_approval"));
    }

    #[test]
    fn test_lock_timeout_is_concurrency() {
        let error = Error::LockTimeout("project:abc".to_string());
        assert_eq!(error.kind(), ErrorKind::Concurrency);
        assert_eq!(error.kind().to_string(), "concurrency");
    }
}
