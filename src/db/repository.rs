//! SQLite implementation of the resource store.
//!
//! Uses prepared statements; every operation is a single statement.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use super::ResourceStore;
use crate::errors::AppError;
use crate::models::{MemberPatch, MemberRecord, TeamMember};

const MEMBER_COLUMNS: &str = "id, name, role, category, term, description, photo_url, created_at";

/// Database repository for team-member rows.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceStore for Repository {
    async fn list_members(&self) -> Result<Vec<TeamMember>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM team ORDER BY created_at ASC, id ASC",
            MEMBER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(member_from_row).collect()
    }

    async fn get_member(&self, id: i64) -> Result<Option<TeamMember>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM team WHERE id = ?", MEMBER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(member_from_row).transpose()
    }

    async fn insert_member(&self, record: &MemberRecord) -> Result<TeamMember, AppError> {
        let now = format_timestamp(Utc::now());

        let row = sqlx::query(&format!(
            "INSERT INTO team (name, role, category, term, description, photo_url, created_at) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {}",
            MEMBER_COLUMNS
        ))
        .bind(&record.name)
        .bind(&record.role)
        .bind(&record.category)
        .bind(&record.term)
        .bind(&record.description)
        .bind(&record.photo_url)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        let member = member_from_row(&row)?;
        tracing::debug!(id = member.id, "Inserted team member row");
        Ok(member)
    }

    async fn update_member(
        &self,
        id: i64,
        patch: &MemberPatch,
    ) -> Result<Option<TeamMember>, AppError> {
        // COALESCE keeps the stored value for every field the patch leaves out.
        let row = sqlx::query(&format!(
            r#"UPDATE team SET
                name = COALESCE(?, name),
                role = COALESCE(?, role),
                category = COALESCE(?, category),
                term = COALESCE(?, term),
                description = COALESCE(?, description),
                photo_url = COALESCE(?, photo_url)
            WHERE id = ?
            RETURNING {}"#,
            MEMBER_COLUMNS
        ))
        .bind(&patch.name)
        .bind(&patch.role)
        .bind(&patch.category)
        .bind(&patch.term)
        .bind(&patch.description)
        .bind(&patch.photo_url)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(member_from_row).transpose()
    }

    async fn delete_member(&self, id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM team WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

// Fixed-width UTC text so lexical order in SQLite matches time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn member_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<TeamMember, AppError> {
    let created_at: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| AppError::Persistence(format!("Corrupt created_at '{}': {}", created_at, e)))?
        .with_timezone(&Utc);

    Ok(TeamMember {
        id: row.get("id"),
        name: row.get("name"),
        role: row.get("role"),
        category: row.get("category"),
        term: row.get("term"),
        description: row.get("description"),
        photo_url: row.get("photo_url"),
        created_at,
    })
}
