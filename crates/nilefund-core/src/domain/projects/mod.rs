//! Project domain module
//!
//! Contains the Project aggregate, its milestones, creation drafts and the
//! catalog service that owns project lifecycle status.

pub mod entity;
pub mod milestone;
pub mod service;
pub mod value_object;

// Re-export project types
pub use entity::{percent_complete, Project, ProjectStatus};
pub use milestone::{Milestone, MilestoneId, MilestoneStatus};
pub use service::ProjectCatalog;
pub use value_object::{Document, MilestoneDraft, ProjectDraft};
