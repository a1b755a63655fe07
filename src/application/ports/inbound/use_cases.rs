//! Inbound ports — the Task Dispatcher's use-case surface (§4.3), the seam
//! a gameplay/HTTP layer would call into. That layer itself is out of
//! scope (§1 Non-goals); this trait exists so TD is exercised the same way
//! by NC and by tests (§9 "interfaces over concrete types").

use async_trait::async_trait;
use thiserror::Error;

use crate::application::errors::{DispatchError, RepositoryError};
use crate::domain::entities::PlayerGameState;
use crate::domain::value_objects::{
    GameOverReason, PlayerGameStateId, PublishedStoryId, StoryConfigId,
};

#[derive(Debug, Error)]
pub enum UseCaseError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for UseCaseError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => Self::NotFound(msg),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            RepositoryError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl From<DispatchError> for UseCaseError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Repository(e) => e.into(),
            DispatchError::Broker(e) => Self::Internal(e.to_string()),
            DispatchError::RateLimited(n) => {
                Self::Conflict(format!("{n} active generations already in flight"))
            }
            DispatchError::AlreadyGenerating => {
                Self::Conflict("aggregate already has a live generation task".to_string())
            }
        }
    }
}

/// Outcome of dispatching against the Scene Cache (§4.4): either a task
/// was published, or an existing/in-flight scene makes one unnecessary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    TaskPublished,
    CacheHit,
    AttachedToInFlightBuild,
}

#[async_trait]
pub trait GenerationPipelineUseCase: Send + Sync {
    /// Trigger `user_publishes_draft` (§4.3).
    async fn publish_draft(&self, draft_id: StoryConfigId) -> Result<DispatchOutcome, UseCaseError>;

    /// Trigger `setup_ready` (§4.3).
    async fn dispatch_first_scene(
        &self,
        published_story_id: PublishedStoryId,
    ) -> Result<DispatchOutcome, UseCaseError>;

    /// Trigger `player_choice` (§4.3); `choice_index` identifies which of
    /// the current scene's options was taken.
    async fn apply_player_choice(
        &self,
        game_state_id: PlayerGameStateId,
        choice_index: u32,
    ) -> Result<DispatchOutcome, UseCaseError>;

    /// Trigger `game_over_detected` (§4.3).
    async fn dispatch_game_over(
        &self,
        game_state_id: PlayerGameStateId,
        reason: GameOverReason,
    ) -> Result<DispatchOutcome, UseCaseError>;

    /// §7 "retry endpoints move the aggregate back to the appropriate
    /// `*_generating` status and TD is invoked".
    async fn retry_initial_generation(
        &self,
        draft_id: StoryConfigId,
    ) -> Result<DispatchOutcome, UseCaseError>;

    async fn retry_generation_for_game_state(
        &self,
        game_state_id: PlayerGameStateId,
    ) -> Result<PlayerGameState, UseCaseError>;
}
