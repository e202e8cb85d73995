//! Durable state store
//!
//! One row per Project and one per LoanAccount. Each row carries the whole
//! aggregate as JSON next to a few indexed columns used for listings, plus a
//! version that every write bumps. Writers name the version they loaded and
//! fail with a conflict when another writer got there first. The ledger
//! sequence row guards transaction ids the same way.

use std::collections::HashMap;

use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::database::Database;
use crate::domain::ledger::TransactionId;
use crate::domain::projects::Project;
use crate::domain::repayment::LoanAccount;
use crate::engine::StateSnapshot;
use crate::error::{Error, Result};

/// A snapshot together with the row versions it was read at
#[derive(Debug, Clone, Default)]
pub struct StoredState {
    pub snapshot: StateSnapshot,
    /// Highest transaction id handed out by any writer
    pub highest_transaction_id: TransactionId,
    project_versions: HashMap<Uuid, i64>,
    loan_versions: HashMap<Uuid, i64>,
}

impl StoredState {
    pub fn project_version(&self, id: Uuid) -> Option<i64> {
        self.project_versions.get(&id).copied()
    }

    pub fn loan_version(&self, project_id: Uuid) -> Option<i64> {
        self.loan_versions.get(&project_id).copied()
    }
}

/// SQLite-backed store for engine snapshots
#[derive(Debug, Clone)]
pub struct StateStore {
    db: Database,
}

impl StateStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Write back what changed since `base` was loaded
    ///
    /// Aggregates equal to their loaded copy are skipped. Changed ones are
    /// written only if their stored version still matches, new ones only if
    /// nobody inserted the same id meanwhile. Any mismatch rolls the whole
    /// save back with [`Error::Conflict`]. Returns the number of aggregates
    /// written.
    pub async fn save_changes(&self, base: &StoredState, current: &StateSnapshot) -> Result<usize> {
        let loaded_projects: HashMap<Uuid, &Project> =
            base.snapshot.projects.iter().map(|project| (project.id, project)).collect();
        let loaded_loans: HashMap<Uuid, &LoanAccount> =
            base.snapshot.loans.iter().map(|loan| (loan.project_id, loan)).collect();

        let mut tx = self.pool().begin().await?;
        let mut written = 0;

        for project in &current.projects {
            if loaded_projects.get(&project.id) == Some(&project) {
                continue;
            }
            match base.project_version(project.id) {
                Some(version) => update_project(&mut tx, project, version).await?,
                None => insert_project(&mut tx, project, 0).await?,
            }
            written += 1;
        }
        for loan in &current.loans {
            if loaded_loans.get(&loan.project_id) == Some(&loan) {
                continue;
            }
            match base.loan_version(loan.project_id) {
                Some(version) => update_loan(&mut tx, loan, version).await?,
                None => insert_loan(&mut tx, loan, 0).await?,
            }
            written += 1;
        }

        if let Some(highest) = current.highest_transaction_id() {
            if highest > base.highest_transaction_id {
                advance_sequence(&mut tx, base.highest_transaction_id, highest).await?;
            }
        }

        tx.commit().await?;
        debug!(written, "Changes saved");
        Ok(written)
    }

    /// Drop every stored aggregate and write the snapshot in its place
    ///
    /// Rows come back at a version above anything stored before, so writers
    /// holding an older load conflict instead of resurrecting replaced state.
    pub async fn replace_snapshot(&self, snapshot: &StateSnapshot) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        let (floor,): (i64,) = sqlx::query_as(
            "SELECT MAX(
                (SELECT COALESCE(MAX(version), -1) FROM projects),
                (SELECT COALESCE(MAX(version), -1) FROM loan_accounts)
            ) + 1",
        )
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM loan_accounts").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM projects").execute(&mut *tx).await?;
        for project in &snapshot.projects {
            insert_project(&mut tx, project, floor).await?;
        }
        for loan in &snapshot.loans {
            insert_loan(&mut tx, loan, floor).await?;
        }

        let imported = snapshot.highest_transaction_id().unwrap_or_default();
        sqlx::query("UPDATE ledger_sequence SET highest = MAX(highest, ?) WHERE id = 1")
            .bind(sequence_value(imported)?)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            projects = snapshot.projects.len(),
            loans = snapshot.loans.len(),
            "Stored state replaced"
        );
        Ok(())
    }

    /// Read every stored aggregate along with its version
    pub async fn load_state(&self) -> Result<StoredState> {
        let mut tx = self.pool().begin().await?;
        let project_rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT version, record FROM projects ORDER BY created_at, id")
                .fetch_all(&mut *tx)
                .await?;
        let loan_rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT version, record FROM loan_accounts ORDER BY project_id")
                .fetch_all(&mut *tx)
                .await?;
        let (highest,): (i64,) = sqlx::query_as("SELECT highest FROM ledger_sequence WHERE id = 1")
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        let mut state = StoredState {
            highest_transaction_id: TransactionId(u64::try_from(highest).map_err(|_| {
                Error::DataIntegrity(format!("negative ledger sequence {}", highest))
            })?),
            ..StoredState::default()
        };
        for (version, record) in &project_rows {
            let project: Project = serde_json::from_str(record)?;
            state.project_versions.insert(project.id, *version);
            state.snapshot.projects.push(project);
        }
        for (version, record) in &loan_rows {
            let loan: LoanAccount = serde_json::from_str(record)?;
            state.loan_versions.insert(loan.project_id, *version);
            state.snapshot.loans.push(loan);
        }

        if let Some(recorded) = state.snapshot.highest_transaction_id() {
            if recorded > state.highest_transaction_id {
                warn!(sequence = %state.highest_transaction_id, recorded = %recorded, "Ledger sequence behind stored transactions");
            }
        }

        debug!(
            projects = state.snapshot.projects.len(),
            loans = state.snapshot.loans.len(),
            highest = %state.highest_transaction_id,
            "State loaded"
        );
        Ok(state)
    }

    /// Read every stored aggregate
    pub async fn load_snapshot(&self) -> Result<StateSnapshot> {
        Ok(self.load_state().await?.snapshot)
    }
}

fn sequence_value(id: TransactionId) -> Result<i64> {
    i64::try_from(id.0).map_err(|_| Error::DataIntegrity(format!("{} does not fit the ledger sequence", id)))
}

fn conflict(what: String) -> Error {
    Error::Conflict(format!("{} was changed by another writer", what))
}

async fn insert_project(tx: &mut Transaction<'_, Sqlite>, project: &Project, version: i64) -> Result<()> {
    let record = serde_json::to_string(project)?;
    let result = sqlx::query(
        r#"
        INSERT INTO projects (id, title, status, industry, record, created_at, updated_at, version)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(project.id.to_string())
    .bind(&project.title)
    .bind(project.status.as_str())
    .bind(project.industry.as_str())
    .bind(record)
    .bind(project.created_at.to_rfc3339())
    .bind(project.updated_at.to_rfc3339())
    .bind(version)
    .execute(&mut **tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(conflict(format!("project '{}'", project.id)));
    }
    Ok(())
}

async fn update_project(tx: &mut Transaction<'_, Sqlite>, project: &Project, version: i64) -> Result<()> {
    let record = serde_json::to_string(project)?;
    let result = sqlx::query(
        r#"
        UPDATE projects
        SET title = ?, status = ?, industry = ?, record = ?, updated_at = ?, version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(&project.title)
    .bind(project.status.as_str())
    .bind(project.industry.as_str())
    .bind(record)
    .bind(project.updated_at.to_rfc3339())
    .bind(project.id.to_string())
    .bind(version)
    .execute(&mut **tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(conflict(format!("project '{}'", project.id)));
    }
    Ok(())
}

async fn insert_loan(tx: &mut Transaction<'_, Sqlite>, loan: &LoanAccount, version: i64) -> Result<()> {
    let record = serde_json::to_string(loan)?;
    let result = sqlx::query(
        r#"
        INSERT INTO loan_accounts (project_id, record, created_at, version)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(project_id) DO NOTHING
        "#,
    )
    .bind(loan.project_id.to_string())
    .bind(record)
    .bind(loan.created_at.to_rfc3339())
    .bind(version)
    .execute(&mut **tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(conflict(format!("loan of project '{}'", loan.project_id)));
    }
    Ok(())
}

async fn update_loan(tx: &mut Transaction<'_, Sqlite>, loan: &LoanAccount, version: i64) -> Result<()> {
    let record = serde_json::to_string(loan)?;
    let result = sqlx::query(
        "UPDATE loan_accounts SET record = ?, version = version + 1 WHERE project_id = ? AND version = ?",
    )
    .bind(record)
    .bind(loan.project_id.to_string())
    .bind(version)
    .execute(&mut **tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(conflict(format!("loan of project '{}'", loan.project_id)));
    }
    Ok(())
}

/// Move the ledger sequence from `loaded` to `highest`
///
/// Fails when another writer issued transaction ids since `loaded` was read,
/// since the ids in hand may then be taken.
async fn advance_sequence(tx: &mut Transaction<'_, Sqlite>, loaded: TransactionId, highest: TransactionId) -> Result<()> {
    let result = sqlx::query("UPDATE ledger_sequence SET highest = ? WHERE id = 1 AND highest = ?")
        .bind(sequence_value(highest)?)
        .bind(sequence_value(loaded)?)
        .execute(&mut **tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::Conflict(format!(
            "transaction ids above {} were issued by another writer",
            loaded
        )));
    }
    Ok(())
}
