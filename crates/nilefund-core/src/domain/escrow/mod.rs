//! Milestone escrow
//!
//! Drives per-milestone status transitions. Funds committed against a
//! milestone stay conceptually escrowed until an admin verifies the submitted
//! work, which releases the milestone and closes it to further funding.
//! Escrow only runs for approved projects (Funding or Completed).

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::projects::{Milestone, MilestoneId, ProjectCatalog, ProjectStatus};
use crate::error::{Error, Result};

/// Milestone escrow service
#[derive(Debug, Clone)]
pub struct MilestoneEscrow {
    catalog: Arc<ProjectCatalog>,
}

impl MilestoneEscrow {
    pub fn new(catalog: Arc<ProjectCatalog>) -> Self {
        Self { catalog }
    }

    /// Funded party asserts the work is done (Pending -> Verified)
    pub async fn submit_for_verification(
        &self,
        project_id: Uuid,
        milestone_id: MilestoneId,
        proof_reference: &str,
    ) -> Result<Milestone> {
        let milestone = self
            .transition(project_id, milestone_id, |m| m.submit(proof_reference))
            .await?;
        info!(
            project_id = %project_id,
            milestone_id = %milestone_id,
            proof = proof_reference.trim(),
            "Milestone submitted for verification"
        );
        Ok(milestone)
    }

    /// Admin confirms completion (Verified -> Released)
    pub async fn verify(
        &self,
        project_id: Uuid,
        milestone_id: MilestoneId,
        release_reference: Option<&str>,
    ) -> Result<Milestone> {
        let milestone = self
            .transition(project_id, milestone_id, |m| m.release(release_reference))
            .await?;
        info!(
            project_id = %project_id,
            milestone_id = %milestone_id,
            release_reference = ?milestone.release_reference,
            "Milestone verified and released"
        );
        Ok(milestone)
    }

    /// Admin sends the submission back (Verified -> Pending)
    pub async fn reject(&self, project_id: Uuid, milestone_id: MilestoneId) -> Result<Milestone> {
        let milestone = self
            .transition(project_id, milestone_id, |m| m.send_back())
            .await?;
        info!(
            project_id = %project_id,
            milestone_id = %milestone_id,
            "Milestone sent back for rework"
        );
        Ok(milestone)
    }

    /// Milestones of a project that can still receive funding
    pub async fn fundable_milestones(&self, project_id: Uuid) -> Result<Vec<Milestone>> {
        let project = self.catalog.get_project(project_id).await?;
        Ok(project
            .milestones
            .into_iter()
            .filter(Milestone::is_open_for_funding)
            .collect())
    }

    async fn transition<F>(&self, project_id: Uuid, milestone_id: MilestoneId, op: F) -> Result<Milestone>
    where
        F: FnOnce(&mut Milestone) -> Result<()>,
    {
        let project = self
            .catalog
            .update(project_id, |project| {
                if !matches!(project.status, ProjectStatus::Funding | ProjectStatus::Completed) {
                    return Err(Error::invalid_transition(
                        format!("milestones of project '{}'", project.id),
                        project.status,
                        "escrow",
                    ));
                }
                op(project.require_milestone_mut(milestone_id)?)
            })
            .await?;
        Ok(project.require_milestone(milestone_id)?.clone())
    }
}
