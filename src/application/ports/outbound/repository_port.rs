//! Repository ports — one trait per aggregate/entity in spec.md §3, so a
//! test harness can substitute in-memory doubles (§9 "interfaces over
//! concrete types"). Each returns the shared `RepositoryError` so services
//! can compose several repositories behind `Arc<dyn _>`, following the
//! teacher's `SettingsRepositoryPort`/`ChallengeRepositoryPort` shape.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::errors::RepositoryError;
use crate::domain::entities::{
    DeviceToken, GenerationResult, ImageReference, PlayerGameState, PlayerProgress,
    PublishedStory, StoryConfig, StoryScene,
};
use crate::domain::value_objects::{
    PlayerGameStateId, PlayerProgressId, PromptType, PublishedStoryId, StateHash, StoryConfigId,
    StorySceneId, TaskId, UserId,
};

#[async_trait]
pub trait StoryConfigRepositoryPort: Send + Sync {
    async fn save(&self, draft: &StoryConfig) -> Result<(), RepositoryError>;
    async fn get(&self, id: StoryConfigId) -> Result<Option<StoryConfig>, RepositoryError>;
    async fn delete(&self, id: StoryConfigId, owner: UserId) -> Result<bool, RepositoryError>;

    /// §4.3 rate-limit check backing `CountActiveGenerationsForUser`
    /// (SPEC_FULL §11).
    async fn count_generating_for_user(&self, user_id: UserId) -> Result<i64, RepositoryError>;

    /// §4.5 reaper sweep target.
    async fn find_stuck(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<StoryConfig>, RepositoryError>;
}

#[async_trait]
pub trait PublishedStoryRepositoryPort: Send + Sync {
    async fn save(&self, story: &PublishedStory) -> Result<(), RepositoryError>;
    async fn get(&self, id: PublishedStoryId) -> Result<Option<PublishedStory>, RepositoryError>;
    async fn delete(&self, id: PublishedStoryId, owner: UserId) -> Result<bool, RepositoryError>;
    async fn count_generating_for_user(&self, user_id: UserId) -> Result<i64, RepositoryError>;
    async fn find_stuck(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<PublishedStory>, RepositoryError>;
}

#[async_trait]
pub trait PlayerGameStateRepositoryPort: Send + Sync {
    async fn save(&self, state: &PlayerGameState) -> Result<(), RepositoryError>;
    async fn get(&self, id: PlayerGameStateId) -> Result<Option<PlayerGameState>, RepositoryError>;
    async fn delete(&self, id: PlayerGameStateId, owner: UserId) -> Result<bool, RepositoryError>;

    /// §4.4 "subscribe to the producing task's completion rather than
    /// dispatching a duplicate" — find every game state waiting on a
    /// `state_hash` that just resolved.
    async fn find_awaiting_state_hash(
        &self,
        published_story_id: PublishedStoryId,
        state_hash: &StateHash,
    ) -> Result<Vec<PlayerGameState>, RepositoryError>;

    async fn find_stuck(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<PlayerGameState>, RepositoryError>;
}

#[async_trait]
pub trait PlayerProgressRepositoryPort: Send + Sync {
    async fn upsert(&self, progress: &PlayerProgress) -> Result<(), RepositoryError>;
    async fn get(&self, id: PlayerProgressId) -> Result<Option<PlayerProgress>, RepositoryError>;
    async fn get_for_user_story(
        &self,
        user_id: UserId,
        published_story_id: PublishedStoryId,
    ) -> Result<Option<PlayerProgress>, RepositoryError>;
}

#[async_trait]
pub trait StorySceneRepositoryPort: Send + Sync {
    /// §4.4 `Insert`: idempotent insert-if-absent, `ON CONFLICT (story_id,
    /// state_hash) DO NOTHING` (§4.2 idempotency) — returns whichever row
    /// now exists, whether it was just inserted or already present.
    async fn insert_if_absent(&self, scene: &StoryScene) -> Result<StoryScene, RepositoryError>;

    async fn find_by_state_hash(
        &self,
        published_story_id: PublishedStoryId,
        state_hash: &StateHash,
    ) -> Result<Option<StoryScene>, RepositoryError>;

    async fn get(&self, id: StorySceneId) -> Result<Option<StoryScene>, RepositoryError>;
}

#[async_trait]
pub trait GenerationResultRepositoryPort: Send + Sync {
    /// §4.1 "writes a `GenerationResult` row (one row per `task_id`;
    /// identical `task_id` from redelivery must upsert)".
    async fn upsert(&self, result: &GenerationResult) -> Result<(), RepositoryError>;
    async fn get(
        &self,
        task_id: TaskId,
        prompt_type: PromptType,
    ) -> Result<Option<GenerationResult>, RepositoryError>;
}

#[async_trait]
pub trait ImageReferenceRepositoryPort: Send + Sync {
    async fn upsert(&self, reference: &ImageReference) -> Result<(), RepositoryError>;
    async fn get(&self, reference_key: &str) -> Result<Option<ImageReference>, RepositoryError>;
}

#[async_trait]
pub trait DeviceTokenRepositoryPort: Send + Sync {
    async fn register(&self, token: &DeviceToken) -> Result<(), RepositoryError>;
    async fn unregister(&self, user_id: UserId, token: &str) -> Result<(), RepositoryError>;
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<DeviceToken>, RepositoryError>;
}
