//! SQLite implementation of the ProgressRepository.
//!
//! Each user is one row holding the JSON progress document plus a version
//! counter. Writes are compare-and-swap on that counter.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::adapters::sqlite::parse_datetime;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::UserProgress;
use crate::domain::ports::ProgressRepository;

#[derive(Clone)]
pub struct SqliteProgressRepository {
    pool: SqlitePool,
}

impl SqliteProgressRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn conflict(user: &str) -> DomainError {
        DomainError::ConcurrencyConflict {
            entity: "user_progress".to_string(),
            id: user.to_string(),
        }
    }
}

#[async_trait]
impl ProgressRepository for SqliteProgressRepository {
    async fn create(&self, progress: &UserProgress) -> DomainResult<u64> {
        let document = serde_json::to_string(progress)?;
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r"INSERT INTO user_progress (id, document, version, created_at, updated_at)
              VALUES (?, ?, 1, ?, ?)
              ON CONFLICT(id) DO NOTHING",
        )
        .bind(&progress.id)
        .bind(&document)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::AlreadyRegistered(progress.id.clone()));
        }
        Ok(1)
    }

    async fn get(&self, user: &str) -> DomainResult<Option<UserProgress>> {
        let row: Option<ProgressRow> = sqlx::query_as(
            "SELECT id, document, version, updated_at FROM user_progress WHERE id = ?",
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn upsert(&self, progress: &UserProgress) -> DomainResult<u64> {
        let document = serde_json::to_string(progress)?;
        let now = Utc::now().to_rfc3339();
        let expected = i64::try_from(progress.version)
            .map_err(|_| DomainError::ValidationFailed(format!("version {} out of range", progress.version)))?;
        let next = expected + 1;

        // Only a document that was never stored may insert. A stored one must
        // still exist at `expected`, so a record deleted by a reset stays gone.
        let result = if expected == 0 {
            sqlx::query(
                r"INSERT INTO user_progress (id, document, version, created_at, updated_at)
                  VALUES (?, ?, ?, ?, ?)
                  ON CONFLICT(id) DO NOTHING",
            )
            .bind(&progress.id)
            .bind(&document)
            .bind(next)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r"UPDATE user_progress
                  SET document = ?, version = ?, updated_at = ?
                  WHERE id = ? AND version = ?",
            )
            .bind(&document)
            .bind(next)
            .bind(&now)
            .bind(&progress.id)
            .bind(expected)
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(Self::conflict(&progress.id));
        }

        #[allow(clippy::cast_sign_loss)]
        Ok(next as u64)
    }

    async fn delete(&self, user: &str) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM user_progress WHERE id = ?")
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> DomainResult<Vec<UserProgress>> {
        let rows: Vec<ProgressRow> = sqlx::query_as(
            "SELECT id, document, version, updated_at FROM user_progress ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ProgressRow {
    id: String,
    document: String,
    version: i64,
    updated_at: String,
}

impl TryFrom<ProgressRow> for UserProgress {
    type Error = DomainError;

    fn try_from(row: ProgressRow) -> Result<Self, Self::Error> {
        let mut progress: UserProgress = serde_json::from_str(&row.document)?;
        if progress.id != row.id {
            return Err(DomainError::DataInconsistency {
                user: row.id,
                reason: format!("document belongs to {}", progress.id),
            });
        }
        progress.version = u64::try_from(row.version)
            .map_err(|_| DomainError::SerializationError(format!("negative version {}", row.version)))?;
        progress.updated_at = parse_datetime(&row.updated_at)?;
        Ok(progress)
    }
}
