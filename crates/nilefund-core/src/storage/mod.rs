//! Storage layer - SQLite + JSONL export
//!
//! - `database`: connection pool management and initialization
//! - `migrations`: schema versioning and automatic migration
//! - `repository`: versioned persistence, one row per aggregate
//! - `jsonl`: JSONL export format for git-based synchronization
//!
//! # Usage
//!
//! ```ignore
//! use nilefund_core::storage::{Database, StateStore};
//!
//! let store = StateStore::new(Database::in_memory().await?);
//! let base = store.load_state().await?;
//! engine.restore(base.snapshot.clone()).await?;
//! engine.reseed_transactions(base.highest_transaction_id);
//! // ... run commands ...
//! store.save_changes(&base, &engine.snapshot().await?).await?;
//! ```

pub mod database;
pub mod jsonl;
pub mod migrations;
pub mod repository;

pub use database::{default_database_path, Database, DatabaseConfig};
pub use jsonl::{export_to_jsonl, import_from_jsonl, ExportResult, ImportResult, SyncMetadata};
pub use migrations::{migration_status, run_migrations, MigrationStatus, CURRENT_VERSION};
pub use repository::{StateStore, StoredState};
