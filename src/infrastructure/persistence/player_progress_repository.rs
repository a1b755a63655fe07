//! Postgres-backed `PlayerProgressRepositoryPort`. Single row per
//! `(user_id, published_story_id)` (DESIGN.md Open Question decision #2).

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::{BTreeMap, BTreeSet};

use crate::application::errors::RepositoryError;
use crate::application::ports::outbound::PlayerProgressRepositoryPort;
use crate::domain::entities::{PlayerProgress, UserChoice};
use crate::domain::value_objects::{PlayerProgressId, PublishedStoryId, StateHash, UserId};

pub struct PostgresPlayerProgressRepository {
    pool: PgPool,
}

impl PostgresPlayerProgressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_progress(row: &sqlx::postgres::PgRow) -> Result<PlayerProgress, RepositoryError> {
        let core_stats_json: serde_json::Value = row.get("core_stats");
        let core_stats: BTreeMap<String, i64> = serde_json::from_value(core_stats_json)
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        let global_flags_json: serde_json::Value = row.get("global_flags");
        let global_flags: BTreeSet<String> = serde_json::from_value(global_flags_json)
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        let choice_history_json: serde_json::Value = row.get("choice_history");
        let choice_history: Vec<UserChoice> = serde_json::from_value(choice_history_json)
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        let state_hash_str: String = row.get("state_hash");

        Ok(PlayerProgress {
            id: PlayerProgressId::from_uuid(row.get("id")),
            user_id: UserId::from_uuid(row.get("user_id")),
            published_story_id: PublishedStoryId::from_uuid(row.get("published_story_id")),
            core_stats,
            global_flags,
            story_variables: row.get("story_variables"),
            state_hash: StateHash::from(state_hash_str),
            choice_history,
        })
    }
}

#[async_trait]
impl PlayerProgressRepositoryPort for PostgresPlayerProgressRepository {
    async fn upsert(&self, progress: &PlayerProgress) -> Result<(), RepositoryError> {
        let core_stats = serde_json::to_value(&progress.core_stats)
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        let global_flags = serde_json::to_value(&progress.global_flags)
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        let choice_history = serde_json::to_value(&progress.choice_history)
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO player_progress
                (id, user_id, published_story_id, core_stats, global_flags, story_variables,
                 state_hash, choice_history)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, published_story_id) DO UPDATE SET
                core_stats = EXCLUDED.core_stats,
                global_flags = EXCLUDED.global_flags,
                story_variables = EXCLUDED.story_variables,
                state_hash = EXCLUDED.state_hash,
                choice_history = EXCLUDED.choice_history
            "#,
        )
        .bind(progress.id.as_uuid())
        .bind(progress.user_id.as_uuid())
        .bind(progress.published_story_id.as_uuid())
        .bind(core_stats)
        .bind(global_flags)
        .bind(&progress.story_variables)
        .bind(progress.state_hash.as_str())
        .bind(choice_history)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, id: PlayerProgressId) -> Result<Option<PlayerProgress>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM player_progress WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        row.as_ref().map(Self::row_to_progress).transpose()
    }

    async fn get_for_user_story(
        &self,
        user_id: UserId,
        published_story_id: PublishedStoryId,
    ) -> Result<Option<PlayerProgress>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM player_progress WHERE user_id = $1 AND published_story_id = $2",
        )
        .bind(user_id.as_uuid())
        .bind(published_story_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        row.as_ref().map(Self::row_to_progress).transpose()
    }
}
