//! Per-aggregate locking
//!
//! Every project and loan account lives behind its own async mutex inside a
//! keyed registry. Mutating operations lock only the aggregate they touch, so
//! operations on different aggregates proceed in parallel while operations on
//! the same aggregate are serialized.
//!
//! # Example
//!
//! ```ignore
//! use nilefund_core::domain::locking::{LockConfig, LockedRegistry, ResourceType};
//!
//! let registry = LockedRegistry::new(ResourceType::Project, LockConfig::default());
//! registry.insert(project.id, project).await;
//!
//! let mut guard = registry.lock(project_id).await?.ok_or(...)?;
//! // mutate a copy, then commit with a single assignment
//! ```

pub mod registry;
pub mod types;

pub use registry::LockedRegistry;
pub use types::{LockConfig, ResourceType};
