//! Postgres-backed `StoryConfigRepositoryPort`, grounded on the pack's
//! `SqliteQueue` row-mapping style, ported to native Postgres column types
//! (`UUID`, `TIMESTAMPTZ`, `JSONB`) instead of the SQLite string encodings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::str::FromStr;

use crate::application::errors::RepositoryError;
use crate::application::ports::outbound::StoryConfigRepositoryPort;
use crate::domain::entities::StoryConfig;
use crate::domain::value_objects::{StoryConfigId, StoryConfigStatus, UserId};

pub struct PostgresStoryConfigRepository {
    pool: PgPool,
}

impl PostgresStoryConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_draft(row: &sqlx::postgres::PgRow) -> Result<StoryConfig, RepositoryError> {
        let status_str: String = row.get("status");
        let status = StoryConfigStatus::from_str(&status_str)
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        Ok(StoryConfig {
            id: StoryConfigId::from_uuid(row.get("id")),
            user_id: UserId::from_uuid(row.get("user_id")),
            user_input: row.get("user_input"),
            config_json: row.get("config_json"),
            status,
            error_details: row.get("error_details"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl StoryConfigRepositoryPort for PostgresStoryConfigRepository {
    async fn save(&self, draft: &StoryConfig) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO story_configs
                (id, user_id, user_input, config_json, status, error_details, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                config_json = EXCLUDED.config_json,
                status = EXCLUDED.status,
                error_details = EXCLUDED.error_details,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(draft.id.as_uuid())
        .bind(draft.user_id.as_uuid())
        .bind(&draft.user_input)
        .bind(&draft.config_json)
        .bind(draft.status.as_str())
        .bind(&draft.error_details)
        .bind(draft.created_at)
        .bind(draft.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, id: StoryConfigId) -> Result<Option<StoryConfig>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM story_configs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        row.as_ref().map(Self::row_to_draft).transpose()
    }

    async fn delete(&self, id: StoryConfigId, owner: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM story_configs WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_generating_for_user(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM story_configs WHERE user_id = $1 AND status = 'generating'",
        )
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        Ok(row.get("count"))
    }

    async fn find_stuck(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<StoryConfig>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM story_configs WHERE status = 'generating' AND updated_at < $1",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        rows.iter().map(Self::row_to_draft).collect()
    }
}
