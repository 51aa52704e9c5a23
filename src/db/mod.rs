//! Database module: the resource store holding team-member rows.
//!
//! SQLite is the source of truth for member records; photos live in the blob store.

mod repository;

pub use repository::*;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::errors::AppError;
use crate::models::{MemberPatch, MemberRecord, TeamMember};

/// Row-level operations on the `team` table.
///
/// Each call is a single statement; atomicity across calls is not provided.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// All members, oldest first.
    async fn list_members(&self) -> Result<Vec<TeamMember>, AppError>;

    async fn get_member(&self, id: i64) -> Result<Option<TeamMember>, AppError>;

    /// Insert a row and return it with its assigned `id` and `created_at`.
    async fn insert_member(&self, record: &MemberRecord) -> Result<TeamMember, AppError>;

    /// Apply a partial update. Returns `None` when no row has this `id`.
    async fn update_member(
        &self,
        id: i64,
        patch: &MemberPatch,
    ) -> Result<Option<TeamMember>, AppError>;

    /// Delete by `id`, returning the number of rows removed.
    async fn delete_member(&self, id: i64) -> Result<u64, AppError>;
}

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // AUTOINCREMENT keeps deleted ids from being handed out again.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS team (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            category TEXT,
            term TEXT,
            description TEXT,
            photo_url TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_team_created_at ON team(created_at);")
        .execute(pool)
        .await?;

    tracing::debug!("Database migrations applied");
    Ok(())
}
