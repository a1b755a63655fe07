//! Postgres persistence adapters (§3 "Postgres-compatible tables"),
//! grounded on the pack's `SqliteQueue` — runtime-checked `sqlx::query()`
//! builder calls, never the compile-time `query!()` macro, since this
//! workspace's schema is never available to a live `DATABASE_URL` at
//! compile time.

pub mod device_token_repository;
pub mod generation_result_repository;
pub mod image_reference_repository;
pub mod player_game_state_repository;
pub mod player_progress_repository;
pub mod published_story_repository;
pub mod story_config_repository;
pub mod story_scene_repository;

pub use device_token_repository::PostgresDeviceTokenRepository;
pub use generation_result_repository::PostgresGenerationResultRepository;
pub use image_reference_repository::PostgresImageReferenceRepository;
pub use player_game_state_repository::PostgresPlayerGameStateRepository;
pub use player_progress_repository::PostgresPlayerProgressRepository;
pub use published_story_repository::PostgresPublishedStoryRepository;
pub use story_config_repository::PostgresStoryConfigRepository;
pub use story_scene_repository::PostgresStorySceneRepository;

use crate::application::errors::RepositoryError;

/// Creates every table this crate owns if absent. Called once at each
/// binary's startup, ahead of wiring the repository adapters.
pub async fn migrate(pool: &sqlx::PgPool) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS story_configs (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL,
            user_input TEXT NOT NULL,
            config_json JSONB,
            status TEXT NOT NULL,
            error_details TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| RepositoryError::Backend(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS published_stories (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL,
            config_json JSONB NOT NULL,
            setup_json JSONB,
            status TEXT NOT NULL,
            error_details TEXT,
            is_first_scene_pending BOOLEAN NOT NULL,
            are_images_pending BOOLEAN NOT NULL,
            is_public BOOLEAN NOT NULL,
            likes_count BIGINT NOT NULL,
            preview_image_ref TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| RepositoryError::Backend(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS player_game_states (
            id UUID PRIMARY KEY,
            player_id UUID NOT NULL,
            published_story_id UUID NOT NULL,
            current_scene_id UUID,
            player_progress_id UUID NOT NULL,
            player_status TEXT NOT NULL,
            ending_text TEXT,
            started_at TIMESTAMPTZ NOT NULL,
            last_activity_at TIMESTAMPTZ NOT NULL,
            completed_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| RepositoryError::Backend(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS player_progress (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL,
            published_story_id UUID NOT NULL,
            core_stats JSONB NOT NULL,
            global_flags JSONB NOT NULL,
            story_variables JSONB NOT NULL,
            state_hash TEXT NOT NULL,
            choice_history JSONB NOT NULL,
            UNIQUE (user_id, published_story_id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| RepositoryError::Backend(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS story_scenes (
            id UUID PRIMARY KEY,
            published_story_id UUID NOT NULL,
            state_hash TEXT NOT NULL,
            content_json JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            UNIQUE (published_story_id, state_hash)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| RepositoryError::Backend(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS generation_results (
            task_id UUID NOT NULL,
            user_id UUID NOT NULL,
            prompt_type TEXT NOT NULL,
            generated_text TEXT,
            prompt_tokens BIGINT,
            completion_tokens BIGINT,
            estimated_cost_usd DOUBLE PRECISION,
            created_at TIMESTAMPTZ NOT NULL,
            completed_at TIMESTAMPTZ,
            error TEXT,
            PRIMARY KEY (task_id, prompt_type)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| RepositoryError::Backend(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS image_references (
            reference_key TEXT PRIMARY KEY,
            image_url TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| RepositoryError::Backend(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS device_tokens (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL,
            token TEXT NOT NULL,
            platform TEXT NOT NULL,
            UNIQUE (user_id, token)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| RepositoryError::Backend(e.to_string()))?;

    Ok(())
}
