//! Postgres-backed `PublishedStoryRepositoryPort`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::str::FromStr;

use crate::application::errors::RepositoryError;
use crate::application::ports::outbound::PublishedStoryRepositoryPort;
use crate::domain::entities::PublishedStory;
use crate::domain::value_objects::{PublishedStoryId, PublishedStoryStatus, UserId};

pub struct PostgresPublishedStoryRepository {
    pool: PgPool,
}

impl PostgresPublishedStoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_story(row: &sqlx::postgres::PgRow) -> Result<PublishedStory, RepositoryError> {
        let status_str: String = row.get("status");
        let status = PublishedStoryStatus::from_str(&status_str)
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        Ok(PublishedStory {
            id: PublishedStoryId::from_uuid(row.get("id")),
            user_id: UserId::from_uuid(row.get("user_id")),
            config_json: row.get("config_json"),
            setup_json: row.get("setup_json"),
            status,
            error_details: row.get("error_details"),
            is_first_scene_pending: row.get("is_first_scene_pending"),
            are_images_pending: row.get("are_images_pending"),
            is_public: row.get("is_public"),
            likes_count: row.get("likes_count"),
            preview_image_ref: row.get("preview_image_ref"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl PublishedStoryRepositoryPort for PostgresPublishedStoryRepository {
    async fn save(&self, story: &PublishedStory) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO published_stories
                (id, user_id, config_json, setup_json, status, error_details,
                 is_first_scene_pending, are_images_pending, is_public, likes_count,
                 preview_image_ref, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                setup_json = EXCLUDED.setup_json,
                status = EXCLUDED.status,
                error_details = EXCLUDED.error_details,
                is_first_scene_pending = EXCLUDED.is_first_scene_pending,
                are_images_pending = EXCLUDED.are_images_pending,
                is_public = EXCLUDED.is_public,
                likes_count = EXCLUDED.likes_count,
                preview_image_ref = EXCLUDED.preview_image_ref,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(story.id.as_uuid())
        .bind(story.user_id.as_uuid())
        .bind(&story.config_json)
        .bind(&story.setup_json)
        .bind(story.status.as_str())
        .bind(&story.error_details)
        .bind(story.is_first_scene_pending)
        .bind(story.are_images_pending)
        .bind(story.is_public)
        .bind(story.likes_count)
        .bind(&story.preview_image_ref)
        .bind(story.created_at)
        .bind(story.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, id: PublishedStoryId) -> Result<Option<PublishedStory>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM published_stories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        row.as_ref().map(Self::row_to_story).transpose()
    }

    async fn delete(&self, id: PublishedStoryId, owner: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM published_stories WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_generating_for_user(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM published_stories WHERE user_id = $1 AND status IN ('setup_generating', 'first_scene_generating')",
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
    ) -> Result<Vec<PublishedStory>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM published_stories WHERE status IN ('setup_generating', 'first_scene_generating') AND updated_at < $1",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        rows.iter().map(Self::row_to_story).collect()
    }
}
