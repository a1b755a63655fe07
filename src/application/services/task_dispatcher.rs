//! Task Dispatcher (TD, §4.3): given an aggregate and a trigger, computes
//! the next `GenerationTaskPayload`, transitions the aggregate's status,
//! and publishes the task — "commit-then-publish", per §9's simpler
//! alternative to a true transactional outbox (the reaper covers the
//! crash-between-commit-and-publish window). Grounded on the teacher's
//! status-then-persist ordering (`SqliteQueue::enqueue`).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::application::dto::GenerationTaskPayload;
use crate::application::errors::DispatchError;
use crate::application::ports::inbound::{DispatchOutcome, GenerationPipelineUseCase, UseCaseError};
use crate::application::ports::outbound::{
    BrokerPort, PlayerGameStateRepositoryPort, PlayerProgressRepositoryPort,
    PublishedStoryRepositoryPort, StoryConfigRepositoryPort, StorySceneRepositoryPort,
};
use crate::application::services::scene_cache_service::{SceneCacheOutcome, SceneCacheService};
use crate::application::topology::{GENERATION_TASKS_EXCHANGE, GENERATION_TASKS_QUEUE};
use crate::domain::entities::{PlayerGameState, PlayerProgress, PublishedStory, StoryConfig};
use crate::domain::value_objects::{
    detect_game_over, GameOverBoundary, GameOverReason, PlayerGameStateId, PromptType,
    PublishedStoryId, StoryConfigId, UserId,
};

pub struct TaskDispatcher {
    story_configs: Arc<dyn StoryConfigRepositoryPort>,
    published_stories: Arc<dyn PublishedStoryRepositoryPort>,
    game_states: Arc<dyn PlayerGameStateRepositoryPort>,
    progress: Arc<dyn PlayerProgressRepositoryPort>,
    scenes: Arc<dyn StorySceneRepositoryPort>,
    scene_cache: Arc<SceneCacheService>,
    broker: Arc<dyn BrokerPort>,
    /// §4.3 "Rate-limit: `CountActiveGenerationsForUser` ≤ N per user".
    max_active_generations_per_user: i64,
}

impl TaskDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        story_configs: Arc<dyn StoryConfigRepositoryPort>,
        published_stories: Arc<dyn PublishedStoryRepositoryPort>,
        game_states: Arc<dyn PlayerGameStateRepositoryPort>,
        progress: Arc<dyn PlayerProgressRepositoryPort>,
        scenes: Arc<dyn StorySceneRepositoryPort>,
        scene_cache: Arc<SceneCacheService>,
        broker: Arc<dyn BrokerPort>,
        max_active_generations_per_user: i64,
    ) -> Self {
        Self {
            story_configs,
            published_stories,
            game_states,
            progress,
            scenes,
            scene_cache,
            broker,
            max_active_generations_per_user,
        }
    }

    async fn check_rate_limit(&self, user_id: UserId) -> Result<(), DispatchError> {
        let drafts = self.story_configs.count_generating_for_user(user_id).await?;
        let stories = self
            .published_stories
            .count_generating_for_user(user_id)
            .await?;
        let active = drafts + stories;
        if active >= self.max_active_generations_per_user {
            return Err(DispatchError::RateLimited(active));
        }
        Ok(())
    }

    async fn publish_task(&self, payload: &GenerationTaskPayload) -> Result<(), DispatchError> {
        let bytes = serde_json::to_vec(payload)
            .map_err(|e| DispatchError::Broker(crate::application::errors::BrokerError::Publish(e.to_string())))?;
        self.broker
            .publish(GENERATION_TASKS_EXCHANGE, GENERATION_TASKS_QUEUE, &bytes)
            .await?;
        Ok(())
    }

    /// TD dispatch of the very first `narrator` task on initial draft
    /// submission — the HTTP-facing step §1 scopes out, reproduced here
    /// since `retry_initial_generation` needs the same mechanics.
    pub async fn submit_draft(
        &self,
        user_id: UserId,
        user_input: String,
    ) -> Result<StoryConfigId, DispatchError> {
        self.check_rate_limit(user_id).await?;
        let mut draft = StoryConfig::new(user_id, user_input.clone());
        draft.begin_generation();
        let id = draft.id;
        self.story_configs.save(&draft).await?;

        let payload = GenerationTaskPayload {
            task_id: Uuid::new_v4(),
            user_id: user_id.into(),
            prompt_type: PromptType::Narrator.to_string(),
            user_input,
            story_config_id: Some(id.into()),
            published_story_id: None,
            state_hash: None,
            game_state_id: None,
        };
        self.publish_task(&payload).await?;
        Ok(id)
    }

    async fn dispatch_novel_creator(
        &self,
        game_state: &PlayerGameState,
        progress: &PlayerProgress,
    ) -> Result<(), DispatchError> {
        let payload = GenerationTaskPayload {
            task_id: Uuid::new_v4(),
            user_id: game_state.player_id.into(),
            prompt_type: PromptType::NovelCreator.to_string(),
            user_input: serde_json::to_string(&progress_context(progress))
                .unwrap_or_default(),
            story_config_id: None,
            published_story_id: Some(game_state.published_story_id.into()),
            state_hash: Some(progress.state_hash.to_string()),
            game_state_id: Some(game_state.id.into()),
        };
        self.publish_task(&payload).await
    }

    async fn dispatch_game_over_internal(
        &self,
        game_state: &PlayerGameState,
        reason: &GameOverReason,
    ) -> Result<(), DispatchError> {
        let payload = GenerationTaskPayload {
            task_id: Uuid::new_v4(),
            user_id: game_state.player_id.into(),
            prompt_type: PromptType::NovelGameOverCreator.to_string(),
            user_input: reason.describe(),
            story_config_id: None,
            published_story_id: Some(game_state.published_story_id.into()),
            state_hash: None,
            game_state_id: Some(game_state.id.into()),
        };
        self.publish_task(&payload).await
    }
}

/// The subset of `PlayerProgress` the `novel_creator`/`novel_game_over_creator`
/// prompts are conditioned on.
#[derive(serde::Serialize)]
struct ProgressContext<'a> {
    core_stats: &'a BTreeMap<String, i64>,
    global_flags: Vec<&'a str>,
    story_variables: &'a Value,
    last_choice_index: Option<u32>,
}

fn progress_context(progress: &PlayerProgress) -> ProgressContext<'_> {
    ProgressContext {
        core_stats: &progress.core_stats,
        global_flags: progress.global_flags.iter().map(String::as_str).collect(),
        story_variables: &progress.story_variables,
        last_choice_index: progress.last_choice_index(),
    }
}

/// Reads `game_over_boundaries` out of `PublishedStory.setup_json`, the
/// shape this implementation assumes the `novel_setup` generation wrote
/// (an array matching `GameOverBoundary`'s fields) — the wire schema for
/// setup content itself is not pinned down by spec.md beyond "core stats".
fn read_game_over_boundaries(story: &PublishedStory) -> Vec<GameOverBoundary> {
    story
        .setup_json
        .as_ref()
        .and_then(|v| v.get("game_over_boundaries"))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

#[async_trait]
impl GenerationPipelineUseCase for TaskDispatcher {
    async fn publish_draft(&self, draft_id: StoryConfigId) -> Result<DispatchOutcome, UseCaseError> {
        let draft = self
            .story_configs
            .get(draft_id)
            .await?
            .ok_or_else(|| UseCaseError::NotFound(format!("StoryConfig {draft_id}")))?;

        if !matches!(draft.status, crate::domain::value_objects::StoryConfigStatus::Ready) {
            return Err(UseCaseError::Conflict(
                "draft is not ready to publish".to_string(),
            ));
        }

        self.check_rate_limit(draft.user_id).await?;

        let config_json = draft.config_json.clone().unwrap_or(Value::Null);
        let story = PublishedStory::new(draft.user_id, config_json.clone());
        let story_id = story.id;
        self.published_stories.save(&story).await?;

        let payload = GenerationTaskPayload {
            task_id: Uuid::new_v4(),
            user_id: draft.user_id.into(),
            prompt_type: PromptType::NovelSetup.to_string(),
            user_input: serde_json::to_string(&config_json).unwrap_or_default(),
            story_config_id: Some(draft_id.into()),
            published_story_id: Some(story_id.into()),
            state_hash: None,
            game_state_id: None,
        };
        self.publish_task(&payload).await?;
        Ok(DispatchOutcome::TaskPublished)
    }

    async fn dispatch_first_scene(
        &self,
        published_story_id: PublishedStoryId,
    ) -> Result<DispatchOutcome, UseCaseError> {
        let story = self
            .published_stories
            .get(published_story_id)
            .await?
            .ok_or_else(|| UseCaseError::NotFound(format!("PublishedStory {published_story_id}")))?;

        if !story.is_first_scene_pending {
            return Err(UseCaseError::Conflict(
                "first scene is not pending dispatch".to_string(),
            ));
        }

        let user_input = serde_json::json!({
            "config": story.config_json,
            "setup": story.setup_json,
        })
        .to_string();

        let payload = GenerationTaskPayload {
            task_id: Uuid::new_v4(),
            user_id: story.user_id.into(),
            prompt_type: PromptType::NovelFirstSceneCreator.to_string(),
            user_input,
            story_config_id: None,
            published_story_id: Some(published_story_id.into()),
            state_hash: None,
            game_state_id: None,
        };
        self.publish_task(&payload).await?;
        Ok(DispatchOutcome::TaskPublished)
    }

    async fn apply_player_choice(
        &self,
        game_state_id: PlayerGameStateId,
        choice_index: u32,
    ) -> Result<DispatchOutcome, UseCaseError> {
        let mut game_state = self
            .game_states
            .get(game_state_id)
            .await?
            .ok_or_else(|| UseCaseError::NotFound(format!("PlayerGameState {game_state_id}")))?;

        if game_state.is_generating() {
            return Err(UseCaseError::Conflict(
                "a generation task is already in flight for this game state".to_string(),
            ));
        }

        let mut progress = self
            .progress
            .get_for_user_story(game_state.player_id, game_state.published_story_id)
            .await?
            .ok_or_else(|| UseCaseError::NotFound("PlayerProgress".to_string()))?;

        let scene = match game_state.current_scene_id {
            Some(scene_id) => self.scenes.get(scene_id).await?,
            None => None,
        };
        let (choice_text, stat_deltas, new_flags) = scene
            .as_ref()
            .and_then(|s| extract_choice(&s.content_json, choice_index))
            .unwrap_or_else(|| (format!("choice #{choice_index}"), BTreeMap::new(), Vec::new()));

        progress.apply_choice(choice_text, &stat_deltas, &new_flags);
        self.progress.upsert(&progress).await?;

        let story = self
            .published_stories
            .get(game_state.published_story_id)
            .await?
            .ok_or_else(|| UseCaseError::NotFound("PublishedStory".to_string()))?;
        let boundaries = read_game_over_boundaries(&story);

        if let Some(reason) = detect_game_over(&progress.core_stats, &boundaries) {
            game_state.begin_game_over();
            self.game_states.save(&game_state).await?;
            self.dispatch_game_over_internal(&game_state, &reason)
                .await?;
            return Ok(DispatchOutcome::TaskPublished);
        }

        match self
            .scene_cache
            .reserve_or_lookup(game_state.published_story_id, &progress.state_hash)
            .await?
        {
            SceneCacheOutcome::Hit(scene) => {
                game_state.attach_scene(scene.id);
                self.game_states.save(&game_state).await?;
                Ok(DispatchOutcome::CacheHit)
            }
            SceneCacheOutcome::Reserved => {
                game_state.begin_scene_generation();
                self.game_states.save(&game_state).await?;
                self.dispatch_novel_creator(&game_state, &progress).await?;
                Ok(DispatchOutcome::TaskPublished)
            }
            SceneCacheOutcome::Building => {
                game_state.begin_scene_generation();
                self.game_states.save(&game_state).await?;
                Ok(DispatchOutcome::AttachedToInFlightBuild)
            }
        }
    }

    async fn dispatch_game_over(
        &self,
        game_state_id: PlayerGameStateId,
        reason: GameOverReason,
    ) -> Result<DispatchOutcome, UseCaseError> {
        let mut game_state = self
            .game_states
            .get(game_state_id)
            .await?
            .ok_or_else(|| UseCaseError::NotFound(format!("PlayerGameState {game_state_id}")))?;

        game_state.begin_game_over();
        self.game_states.save(&game_state).await?;
        self.dispatch_game_over_internal(&game_state, &reason)
            .await?;
        Ok(DispatchOutcome::TaskPublished)
    }

    async fn retry_initial_generation(
        &self,
        draft_id: StoryConfigId,
    ) -> Result<DispatchOutcome, UseCaseError> {
        let mut draft = self
            .story_configs
            .get(draft_id)
            .await?
            .ok_or_else(|| UseCaseError::NotFound(format!("StoryConfig {draft_id}")))?;

        if !draft.is_terminal() {
            return Err(UseCaseError::Conflict(
                "draft is still generating".to_string(),
            ));
        }

        draft.begin_generation();
        self.story_configs.save(&draft).await?;

        let payload = GenerationTaskPayload {
            task_id: Uuid::new_v4(),
            user_id: draft.user_id.into(),
            prompt_type: PromptType::Narrator.to_string(),
            user_input: draft.user_input.clone(),
            story_config_id: Some(draft_id.into()),
            published_story_id: None,
            state_hash: None,
            game_state_id: None,
        };
        self.publish_task(&payload).await?;
        Ok(DispatchOutcome::TaskPublished)
    }

    async fn retry_generation_for_game_state(
        &self,
        game_state_id: PlayerGameStateId,
    ) -> Result<PlayerGameState, UseCaseError> {
        let mut game_state = self
            .game_states
            .get(game_state_id)
            .await?
            .ok_or_else(|| UseCaseError::NotFound(format!("PlayerGameState {game_state_id}")))?;

        let progress = self
            .progress
            .get_for_user_story(game_state.player_id, game_state.published_story_id)
            .await?
            .ok_or_else(|| UseCaseError::NotFound("PlayerProgress".to_string()))?;

        game_state.begin_scene_generation();
        self.game_states.save(&game_state).await?;
        self.dispatch_novel_creator(&game_state, &progress)
            .await?;
        Ok(game_state)
    }
}

/// Reads choice #`index` out of a scene's `content_json["choices"]` array,
/// the shape this implementation assumes `novel_creator`/
/// `novel_first_scene_creator` generations write (each entry
/// `{text, stat_deltas, flags}`) — again not pinned down verbatim by
/// spec.md, which leaves scene content opaque to everything but the
/// `state_hash` computation.
fn extract_choice(
    content_json: &Value,
    index: u32,
) -> Option<(String, BTreeMap<String, i64>, Vec<String>)> {
    let choice = content_json.get("choices")?.get(index as usize)?;
    let text = choice.get("text")?.as_str()?.to_string();
    let stat_deltas: BTreeMap<String, i64> = choice
        .get("stat_deltas")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    let flags: Vec<String> = choice
        .get("flags")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    Some((text, stat_deltas, flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_choice_effects_from_scene_content() {
        let content = json!({
            "choices": [
                {"text": "fight", "stat_deltas": {"health": -3}, "flags": ["met_wolf"]},
                {"text": "flee", "stat_deltas": {"courage": -1}, "flags": []},
            ]
        });
        let (text, deltas, flags) = extract_choice(&content, 0).unwrap();
        assert_eq!(text, "fight");
        assert_eq!(deltas["health"], -3);
        assert_eq!(flags, vec!["met_wolf".to_string()]);
    }

    #[test]
    fn missing_choice_index_returns_none() {
        let content = json!({"choices": []});
        assert!(extract_choice(&content, 0).is_none());
    }

    #[test]
    fn reads_game_over_boundaries_from_setup_json() {
        let story = PublishedStory {
            setup_json: Some(json!({
                "game_over_boundaries": [
                    {"stat_name": "health", "min": 0, "max": null}
                ]
            })),
            ..PublishedStory::new(UserId::new(), json!({}))
        };
        let boundaries = read_game_over_boundaries(&story);
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].stat_name, "health");
    }
}
