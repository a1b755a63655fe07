//! Postgres-backed `PlayerGameStateRepositoryPort`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::str::FromStr;

use crate::application::errors::RepositoryError;
use crate::application::ports::outbound::PlayerGameStateRepositoryPort;
use crate::domain::entities::PlayerGameState;
use crate::domain::value_objects::{
    PlayerGameStateId, PlayerProgressId, PlayerStatus, PublishedStoryId, StateHash, StorySceneId,
    UserId,
};

pub struct PostgresPlayerGameStateRepository {
    pool: PgPool,
}

impl PostgresPlayerGameStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_state(row: &sqlx::postgres::PgRow) -> Result<PlayerGameState, RepositoryError> {
        let status_str: String = row.get("player_status");
        let player_status =
            PlayerStatus::from_str(&status_str).map_err(|e| RepositoryError::Backend(e.to_string()))?;

        let current_scene_id: Option<uuid::Uuid> = row.get("current_scene_id");

        Ok(PlayerGameState {
            id: PlayerGameStateId::from_uuid(row.get("id")),
            player_id: UserId::from_uuid(row.get("player_id")),
            published_story_id: PublishedStoryId::from_uuid(row.get("published_story_id")),
            current_scene_id: current_scene_id.map(StorySceneId::from_uuid),
            player_progress_id: PlayerProgressId::from_uuid(row.get("player_progress_id")),
            player_status,
            ending_text: row.get("ending_text"),
            started_at: row.get("started_at"),
            last_activity_at: row.get("last_activity_at"),
            completed_at: row.get("completed_at"),
        })
    }
}

#[async_trait]
impl PlayerGameStateRepositoryPort for PostgresPlayerGameStateRepository {
    async fn save(&self, state: &PlayerGameState) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO player_game_states
                (id, player_id, published_story_id, current_scene_id, player_progress_id,
                 player_status, ending_text, started_at, last_activity_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                current_scene_id = EXCLUDED.current_scene_id,
                player_status = EXCLUDED.player_status,
                ending_text = EXCLUDED.ending_text,
                last_activity_at = EXCLUDED.last_activity_at,
                completed_at = EXCLUDED.completed_at
            "#,
        )
        .bind(state.id.as_uuid())
        .bind(state.player_id.as_uuid())
        .bind(state.published_story_id.as_uuid())
        .bind(state.current_scene_id.as_ref().map(|id| *id.as_uuid()))
        .bind(state.player_progress_id.as_uuid())
        .bind(state.player_status.as_str())
        .bind(&state.ending_text)
        .bind(state.started_at)
        .bind(state.last_activity_at)
        .bind(state.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, id: PlayerGameStateId) -> Result<Option<PlayerGameState>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM player_game_states WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        row.as_ref().map(Self::row_to_state).transpose()
    }

    async fn delete(&self, id: PlayerGameStateId, owner: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM player_game_states WHERE id = $1 AND player_id = $2")
            .bind(id.as_uuid())
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// §4.4 "subscribe to the producing task's completion rather than
    /// dispatching a duplicate" — join through `player_progress` to find
    /// every game state sitting on the `state_hash` that just resolved.
    async fn find_awaiting_state_hash(
        &self,
        published_story_id: PublishedStoryId,
        state_hash: &StateHash,
    ) -> Result<Vec<PlayerGameState>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT gs.* FROM player_game_states gs
            JOIN player_progress pp ON pp.id = gs.player_progress_id
            WHERE gs.published_story_id = $1
              AND pp.state_hash = $2
              AND gs.player_status = 'generating_scene'
            "#,
        )
        .bind(published_story_id.as_uuid())
        .bind(state_hash.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        rows.iter().map(Self::row_to_state).collect()
    }

    async fn find_stuck(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<PlayerGameState>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM player_game_states WHERE player_status IN ('generating_scene', 'game_over_pending') AND last_activity_at < $1",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        rows.iter().map(Self::row_to_state).collect()
    }
}
