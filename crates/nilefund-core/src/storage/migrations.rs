//! Database migrations
//!
//! Versioned SQLite schema, applied automatically on connection.

use sqlx::SqlitePool;

/// Current schema version
pub const CURRENT_VERSION: i32 = 3;

const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: one row per aggregate, the aggregate itself stored as JSON
const MIGRATION_V1: &str = r#"
    CREATE TABLE IF NOT EXISTS projects (
        id TEXT PRIMARY KEY NOT NULL,
        title TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('pending_approval', 'funding', 'completed', 'rejected')),
        industry TEXT NOT NULL,
        record TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS loan_accounts (
        project_id TEXT PRIMARY KEY NOT NULL REFERENCES projects(id),
        record TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
"#;

/// Migration 2: listing indexes
const MIGRATION_V2: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(status);
    CREATE INDEX IF NOT EXISTS idx_projects_industry ON projects(industry);
    CREATE INDEX IF NOT EXISTS idx_projects_created_at ON projects(created_at);
"#;

/// Migration 3: row versions for optimistic writes and the shared ledger
/// sequence, seeded from transactions already on record
const MIGRATION_V3: &str = r#"
    ALTER TABLE projects ADD COLUMN version INTEGER NOT NULL DEFAULT 0;
    ALTER TABLE loan_accounts ADD COLUMN version INTEGER NOT NULL DEFAULT 0;

    CREATE TABLE IF NOT EXISTS ledger_sequence (
        id INTEGER PRIMARY KEY NOT NULL CHECK (id = 1),
        highest INTEGER NOT NULL CHECK (highest >= 0)
    );

    INSERT OR IGNORE INTO ledger_sequence (id, highest)
    SELECT 1, COALESCE(MAX(json_extract(tx.value, '$.id')), 0)
    FROM projects, json_each(projects.record, '$.transactions') AS tx;
"#;

async fn get_current_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let row: Option<(Option<i32>,)> = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_optional(pool)
        .await?;

    Ok(row.and_then(|(v,)| v).unwrap_or(0))
}

async fn record_migration(pool: &SqlitePool, version: i32) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let current_version = get_current_version(pool).await?;

    tracing::info!(
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking database migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Database is up to date");
        return Ok(());
    }

    if current_version < 1 {
        tracing::info!("Applying migration v1: Aggregate tables");
        sqlx::raw_sql(MIGRATION_V1).execute(pool).await?;
        record_migration(pool, 1).await?;
    }

    if current_version < 2 {
        tracing::info!("Applying migration v2: Listing indexes");
        sqlx::raw_sql(MIGRATION_V2).execute(pool).await?;
        record_migration(pool, 2).await?;
    }

    if current_version < 3 {
        tracing::info!("Applying migration v3: Row versions and ledger sequence");
        sqlx::raw_sql(MIGRATION_V3).execute(pool).await?;
        record_migration(pool, 3).await?;
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = get_current_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub current_version: i32,
    pub target_version: i32,
    pub needs_migration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = pool().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
        assert!(!status.needs_migration);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, i64::from(CURRENT_VERSION));
    }

    #[tokio::test]
    async fn test_status_check_rejected() {
        let pool = pool().await;
        run_migrations(&pool).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO projects (id, title, status, industry, record, created_at, updated_at) \
             VALUES ('p', 't', 'archived', 'other', '{}', '', '')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_ledger_sequence_seeded_from_existing_records() {
        let pool = pool().await;
        sqlx::raw_sql(MIGRATION_V1).execute(&pool).await.unwrap();
        sqlx::raw_sql(MIGRATION_V2).execute(&pool).await.unwrap();
        sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(&pool).await.unwrap();
        record_migration(&pool, 1).await.unwrap();
        record_migration(&pool, 2).await.unwrap();
        sqlx::query(
            "INSERT INTO projects (id, title, status, industry, record, created_at, updated_at) \
             VALUES ('p', 't', 'funding', 'other', '{\"transactions\":[{\"id\":4},{\"id\":9}]}', '', '')",
        )
        .execute(&pool)
        .await
        .unwrap();

        run_migrations(&pool).await.unwrap();

        let (highest,): (i64,) = sqlx::query_as("SELECT highest FROM ledger_sequence WHERE id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(highest, 9);
        let (version,): (i64,) = sqlx::query_as("SELECT version FROM projects WHERE id = 'p'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(version, 0);
    }

    #[tokio::test]
    async fn test_fresh_database_starts_sequence_at_zero() {
        let pool = pool().await;
        run_migrations(&pool).await.unwrap();
        let (highest,): (i64,) = sqlx::query_as("SELECT highest FROM ledger_sequence WHERE id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(highest, 0);
    }
}
