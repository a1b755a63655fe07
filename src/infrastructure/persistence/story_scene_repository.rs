//! Postgres-backed `StorySceneRepositoryPort`. The unique index on
//! `(published_story_id, state_hash)` is the cache-semantics enforcement
//! point (§3, §8 invariant 2).

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::application::errors::RepositoryError;
use crate::application::ports::outbound::StorySceneRepositoryPort;
use crate::domain::entities::StoryScene;
use crate::domain::value_objects::{PublishedStoryId, StateHash, StorySceneId};

pub struct PostgresStorySceneRepository {
    pool: PgPool,
}

impl PostgresStorySceneRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_scene(row: &sqlx::postgres::PgRow) -> Result<StoryScene, RepositoryError> {
        let state_hash_str: String = row.get("state_hash");
        Ok(StoryScene {
            id: StorySceneId::from_uuid(row.get("id")),
            published_story_id: PublishedStoryId::from_uuid(row.get("published_story_id")),
            state_hash: StateHash::from(state_hash_str),
            content_json: row.get("content_json"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl StorySceneRepositoryPort for PostgresStorySceneRepository {
    /// `ON CONFLICT (story_id, state_hash) DO NOTHING` (§4.2), then a
    /// follow-up read so the caller always gets back whichever row is now
    /// canonical for the key — the one it just inserted, or the winner of
    /// a race with another writer.
    async fn insert_if_absent(&self, scene: &StoryScene) -> Result<StoryScene, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO story_scenes (id, published_story_id, state_hash, content_json, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (published_story_id, state_hash) DO NOTHING
            "#,
        )
        .bind(scene.id.as_uuid())
        .bind(scene.published_story_id.as_uuid())
        .bind(scene.state_hash.as_str())
        .bind(&scene.content_json)
        .bind(scene.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        self.find_by_state_hash(scene.published_story_id, &scene.state_hash)
            .await?
            .ok_or_else(|| {
                RepositoryError::Backend(
                    "scene insert_if_absent: row missing immediately after insert".to_string(),
                )
            })
    }

    async fn find_by_state_hash(
        &self,
        published_story_id: PublishedStoryId,
        state_hash: &StateHash,
    ) -> Result<Option<StoryScene>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM story_scenes WHERE published_story_id = $1 AND state_hash = $2",
        )
        .bind(published_story_id.as_uuid())
        .bind(state_hash.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        row.as_ref().map(Self::row_to_scene).transpose()
    }

    async fn get(&self, id: StorySceneId) -> Result<Option<StoryScene>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM story_scenes WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        row.as_ref().map(Self::row_to_scene).transpose()
    }
}
