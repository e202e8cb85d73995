//! Admin review queue
//!
//! Read projections over pending work plus the admin commands, which delegate
//! to the catalog and escrow and surface their errors unchanged.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::escrow::MilestoneEscrow;
use crate::domain::projects::{Milestone, MilestoneId, MilestoneStatus, Project, ProjectCatalog, ProjectStatus};
use crate::error::Result;

/// A submitted milestone waiting for an admin decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneReview {
    pub project_id: Uuid,
    pub project_title: String,
    /// Evidence the admin verifies against
    pub proof_reference: Option<String>,
    pub milestone: Milestone,
}

/// Admin-facing review queue
#[derive(Debug, Clone)]
pub struct AdminReviewQueue {
    catalog: Arc<ProjectCatalog>,
    escrow: MilestoneEscrow,
}

impl AdminReviewQueue {
    pub fn new(catalog: Arc<ProjectCatalog>, escrow: MilestoneEscrow) -> Self {
        Self { catalog, escrow }
    }

    /// Projects awaiting approval, oldest first
    pub async fn list_pending_projects(&self) -> Result<Vec<Project>> {
        self.catalog.list_by_status(ProjectStatus::PendingApproval).await
    }

    /// Verified milestones across every approved project
    pub async fn list_milestones_awaiting_verification(&self) -> Result<Vec<MilestoneReview>> {
        let mut reviews = Vec::new();
        for project in self.catalog.all_projects().await? {
            if !matches!(project.status, ProjectStatus::Funding | ProjectStatus::Completed) {
                continue;
            }
            for milestone in &project.milestones {
                if milestone.status == MilestoneStatus::Verified {
                    reviews.push(MilestoneReview {
                        project_id: project.id,
                        project_title: project.title.clone(),
                        proof_reference: milestone.proof_reference.clone(),
                        milestone: milestone.clone(),
                    });
                }
            }
        }
        Ok(reviews)
    }

    pub async fn approve_project(&self, project_id: Uuid) -> Result<Project> {
        self.catalog.approve_project(project_id).await
    }

    pub async fn reject_project(&self, project_id: Uuid) -> Result<Project> {
        self.catalog.reject_project(project_id).await
    }

    pub async fn verify_milestone(
        &self,
        project_id: Uuid,
        milestone_id: MilestoneId,
        release_reference: Option<&str>,
    ) -> Result<Milestone> {
        self.escrow.verify(project_id, milestone_id, release_reference).await
    }

    pub async fn reject_milestone(&self, project_id: Uuid, milestone_id: MilestoneId) -> Result<Milestone> {
        self.escrow.reject(project_id, milestone_id).await
    }
}
