//! Project catalog service
//!
//! Owns every Project aggregate and its lifecycle status.

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};
use uuid::Uuid;

use super::entity::{Project, ProjectStatus};
use super::value_object::ProjectDraft;
use crate::domain::locking::{LockConfig, LockedRegistry, ResourceType};
use crate::domain::scoring::CreditAssessment;
use crate::error::{Error, Result};

/// Project catalog, the single owner of project state
#[derive(Debug)]
pub struct ProjectCatalog {
    projects: LockedRegistry<Project>,
}

impl ProjectCatalog {
    pub fn new(config: LockConfig) -> Self {
        Self {
            projects: LockedRegistry::new(ResourceType::Project, config),
        }
    }

    /// Create a project in PendingApproval with nothing funded
    pub async fn create_project(&self, draft: ProjectDraft) -> Result<Project> {
        let project = Project::from_draft(draft)?;
        if !self.projects.insert(project.id, project.clone()).await {
            return Err(Error::DataIntegrity(format!(
                "project id {} already exists",
                project.id
            )));
        }

        info!(
            project_id = %project.id,
            industry = %project.industry,
            requested_amount = %project.requested_amount,
            milestones = project.milestones.len(),
            "Project created"
        );
        Ok(project)
    }

    /// PendingApproval -> Funding
    pub async fn approve_project(&self, project_id: Uuid) -> Result<Project> {
        let project = self.update(project_id, |project| project.approve()).await?;
        info!(project_id = %project_id, "Project approved");
        Ok(project)
    }

    /// PendingApproval -> Rejected
    pub async fn reject_project(&self, project_id: Uuid) -> Result<Project> {
        let project = self.update(project_id, |project| project.reject()).await?;
        info!(project_id = %project_id, "Project rejected");
        Ok(project)
    }

    /// Store a credit assessment produced by the scoring collaborator
    pub async fn attach_credit_assessment(
        &self,
        project_id: Uuid,
        assessment: CreditAssessment,
    ) -> Result<Project> {
        let score = assessment.score;
        let project = self
            .update(project_id, move |project| {
                project.credit_assessment = Some(assessment);
                project.touch();
                Ok(())
            })
            .await?;
        info!(project_id = %project_id, score = score, "Credit assessment attached");
        Ok(project)
    }

    /// Current snapshot of a project
    pub async fn get_project(&self, project_id: Uuid) -> Result<Project> {
        debug!(project_id = %project_id, "Fetching project");
        self.projects
            .get(project_id)
            .await?
            .ok_or(Error::ProjectNotFound(project_id))
    }

    /// Every project, rejected ones included
    pub async fn all_projects(&self) -> Result<Vec<Project>> {
        let mut projects = self.projects.snapshot().await?;
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(projects)
    }

    /// Investor-facing listing: everything except rejected projects
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self
            .all_projects()
            .await?
            .into_iter()
            .filter(|p| p.status.is_investor_visible())
            .collect())
    }

    /// Projects currently open to investors
    pub async fn list_open_projects(&self) -> Result<Vec<Project>> {
        self.list_by_status(ProjectStatus::Funding).await
    }

    pub async fn list_by_status(&self, status: ProjectStatus) -> Result<Vec<Project>> {
        Ok(self
            .all_projects()
            .await?
            .into_iter()
            .filter(|p| p.status == status)
            .collect())
    }

    /// Acquire the project's lock for a multi-step mutation
    pub(crate) async fn lock_project(&self, project_id: Uuid) -> Result<OwnedMutexGuard<Project>> {
        self.projects
            .lock(project_id)
            .await?
            .ok_or(Error::ProjectNotFound(project_id))
    }

    /// Apply `op` to a copy of the project and commit only if it succeeds
    pub(crate) async fn update<F>(&self, project_id: Uuid, op: F) -> Result<Project>
    where
        F: FnOnce(&mut Project) -> Result<()>,
    {
        let mut guard = self.lock_project(project_id).await?;
        let mut draft = (*guard).clone();
        op(&mut draft)?;
        draft.check_invariants()?;
        *guard = draft.clone();
        Ok(draft)
    }

    /// Replace the catalog contents with restored projects
    pub(crate) async fn load(&self, projects: Vec<Project>) -> Result<()> {
        for project in &projects {
            project.check_invariants()?;
        }
        self.projects
            .replace_all(projects.into_iter().map(|p| (p.id, p)))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::industry::IndustryCategory;
    use crate::error::ErrorKind;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn draft(title: &str) -> ProjectDraft {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        ProjectDraft::new(title, "", IndustryCategory::LogisticsSupplyChain, dec!(40000))
            .milestone("Courier app MVP", 50, date)
            .milestone("Launch in Cairo", 50, date)
            .document("Pitch deck.pdf", "ipfs://deck")
    }

    fn catalog() -> ProjectCatalog {
        ProjectCatalog::new(LockConfig::default())
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let catalog = catalog();
        let created = catalog.create_project(draft("NileDash")).await.unwrap();
        let fetched = catalog.get_project(created.id).await.unwrap();

        assert_eq!(created, fetched);
        assert_eq!(fetched.status, ProjectStatus::PendingApproval);
        assert_eq!(fetched.documents.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_draft_creates_nothing() {
        let catalog = catalog();
        let mut bad = draft("NileDash");
        bad.milestones[0].percentage = 10;

        let error = catalog.create_project(bad).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert!(catalog.all_projects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_project() {
        let error = catalog().get_project(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_approve_and_reject_transitions() {
        let catalog = catalog();
        let approved = catalog.create_project(draft("A")).await.unwrap();
        let rejected = catalog.create_project(draft("B")).await.unwrap();

        catalog.approve_project(approved.id).await.unwrap();
        catalog.reject_project(rejected.id).await.unwrap();

        // no edge out of Funding to Rejected, nor out of Rejected
        let error = catalog.reject_project(approved.id).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidTransition);
        let error = catalog.approve_project(rejected.id).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidTransition);

        assert_eq!(
            catalog.get_project(approved.id).await.unwrap().status,
            ProjectStatus::Funding
        );
        assert_eq!(
            catalog.get_project(rejected.id).await.unwrap().status,
            ProjectStatus::Rejected
        );
    }

    #[tokio::test]
    async fn test_rejected_projects_hidden_from_listings() {
        let catalog = catalog();
        let open = catalog.create_project(draft("Open")).await.unwrap();
        let pending = catalog.create_project(draft("Pending")).await.unwrap();
        let rejected = catalog.create_project(draft("Rejected")).await.unwrap();
        catalog.approve_project(open.id).await.unwrap();
        catalog.reject_project(rejected.id).await.unwrap();

        let listed: Vec<Uuid> = catalog.list_projects().await.unwrap().iter().map(|p| p.id).collect();
        assert!(listed.contains(&open.id));
        assert!(listed.contains(&pending.id));
        assert!(!listed.contains(&rejected.id));

        let open_ids: Vec<Uuid> = catalog.list_open_projects().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(open_ids, vec![open.id]);
        assert_eq!(catalog.all_projects().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_attach_credit_assessment() {
        let catalog = catalog();
        let project = catalog.create_project(draft("Scored")).await.unwrap();

        let updated = catalog
            .attach_credit_assessment(project.id, CreditAssessment::new(81, "two years of revenue"))
            .await
            .unwrap();
        assert_eq!(updated.credit_assessment.as_ref().map(|a| a.score), Some(81));
    }
}
