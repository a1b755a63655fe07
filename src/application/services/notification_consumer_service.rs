//! Notification Consumer (NC, §4.2): the state-machine heart. Consumes
//! `internal_updates`, routes by `PromptType`, applies the result to the
//! owning aggregate, dispatches the next task where the table demands one,
//! and emits a `ClientUpdate` (plus an optional push event). Grounded on
//! the teacher's `LLMQueueService::run_worker` consume-loop shape and its
//! dispatch-by-variant match in `queue_workers.rs`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::application::dto::{ClientUpdate, NotificationPayload, NotificationStatus, PushNotificationEvent};
use crate::application::errors::{BrokerError, RepositoryError};
use crate::application::ports::inbound::GenerationPipelineUseCase;
use crate::application::ports::outbound::{
    BrokerPort, DeviceTokenRepositoryPort, ImageReferenceRepositoryPort,
    PlayerGameStateRepositoryPort, PublishedStoryRepositoryPort, StoryConfigRepositoryPort,
};
use crate::application::services::json_extract::extract_json;
use crate::application::services::scene_cache_service::SceneCacheService;
use crate::application::topology::{CLIENT_UPDATES_EXCHANGE, INTERNAL_UPDATES_QUEUE, PUSH_NOTIFICATIONS_EXCHANGE, PUSH_NOTIFICATIONS_QUEUE};
use crate::domain::entities::{ImageReference, StoryScene};
use crate::domain::value_objects::{
    PlayerGameStateId, PromptType, PublishedStoryId, StateHash, StoryConfigId,
};

pub struct NotificationConsumerService {
    story_configs: Arc<dyn StoryConfigRepositoryPort>,
    published_stories: Arc<dyn PublishedStoryRepositoryPort>,
    game_states: Arc<dyn PlayerGameStateRepositoryPort>,
    images: Arc<dyn ImageReferenceRepositoryPort>,
    device_tokens: Arc<dyn DeviceTokenRepositoryPort>,
    scene_cache: Arc<SceneCacheService>,
    dispatcher: Arc<dyn GenerationPipelineUseCase>,
    broker: Arc<dyn BrokerPort>,
    consumer_tag: String,
}

impl NotificationConsumerService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        story_configs: Arc<dyn StoryConfigRepositoryPort>,
        published_stories: Arc<dyn PublishedStoryRepositoryPort>,
        game_states: Arc<dyn PlayerGameStateRepositoryPort>,
        images: Arc<dyn ImageReferenceRepositoryPort>,
        device_tokens: Arc<dyn DeviceTokenRepositoryPort>,
        scene_cache: Arc<SceneCacheService>,
        dispatcher: Arc<dyn GenerationPipelineUseCase>,
        broker: Arc<dyn BrokerPort>,
        consumer_tag: impl Into<String>,
    ) -> Self {
        Self {
            story_configs,
            published_stories,
            game_states,
            images,
            device_tokens,
            scene_cache,
            dispatcher,
            broker,
            consumer_tag: consumer_tag.into(),
        }
    }

    pub async fn run(&self) -> Result<(), BrokerError> {
        let mut consumer = self
            .broker
            .consume(INTERNAL_UPDATES_QUEUE, &self.consumer_tag, 1)
            .await?;

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(d) => d,
                Err(e) => {
                    tracing::error!(error = %e, "broker delivery error");
                    continue;
                }
            };

            let payload: NotificationPayload = match serde_json::from_slice(&delivery.data) {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!(error = %e, "unparseable NotificationPayload");
                    let _ = delivery.nack(false).await;
                    continue;
                }
            };

            match self.apply(&payload).await {
                Ok(()) => {
                    let _ = delivery.ack().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, task_id = %payload.task_id, "failed to apply notification");
                    let _ = delivery.nack(false).await;
                }
            }
        }

        Ok(())
    }

    /// §4.2 dispatch table. One DB transaction per message in a real
    /// Postgres-backed repository implementation; here each repository
    /// call is the transactional unit the port contract promises.
    pub async fn apply(&self, payload: &NotificationPayload) -> Result<(), RepositoryError> {
        let prompt_type: PromptType = payload
            .prompt_type
            .parse()
            .map_err(|_| RepositoryError::Backend(format!("unknown prompt_type {}", payload.prompt_type)))?;

        if payload.status == NotificationStatus::Error {
            return self.apply_error(payload, prompt_type).await;
        }

        match prompt_type {
            PromptType::Narrator | PromptType::NarratorReviser => self.apply_narrator(payload).await,
            PromptType::NovelSetup => self.apply_novel_setup(payload).await,
            PromptType::NovelFirstSceneCreator => self.apply_first_scene(payload).await,
            PromptType::NovelCreator => self.apply_novel_creator(payload).await,
            PromptType::NovelGameOverCreator => self.apply_game_over(payload).await,
            PromptType::CharacterImage | PromptType::StoryPreviewImage => {
                self.apply_image_result(payload, prompt_type).await
            }
        }
    }

    /// §4.2 "set the owning aggregate to `error`... and flush its pending
    /// flags." Routed by which aggregate `prompt_type` actually owns (the
    /// table in §4.2), not by which correlation id happens to be set on
    /// the payload — `novel_setup` tasks carry both `story_config_id` (the
    /// originating draft, already `ready`) and `published_story_id` (the
    /// aggregate actually generating), so id-presence would pick the
    /// wrong one.
    async fn apply_error(&self, payload: &NotificationPayload, prompt_type: PromptType) -> Result<(), RepositoryError> {
        let details = payload
            .error_details
            .clone()
            .unwrap_or_else(|| "unknown generation error".to_string());

        match prompt_type {
            PromptType::Narrator | PromptType::NarratorReviser => {
                let Some(id) = payload.story_config_id else {
                    return Ok(());
                };
                let id = StoryConfigId::from_uuid(id);
                if let Some(mut draft) = self.story_configs.get(id).await? {
                    draft.mark_error(details.clone());
                    self.story_configs.save(&draft).await?;
                }
                self.publish_client_update(&ClientUpdate {
                    user_id: payload.user_id,
                    aggregate_type: "story_config".to_string(),
                    aggregate_id: id.into(),
                    status: "error".to_string(),
                    error_details: Some(details),
                    scene_id: None,
                })
                .await
            }
            PromptType::NovelSetup | PromptType::NovelFirstSceneCreator => {
                let Some(id) = payload.published_story_id else {
                    return Ok(());
                };
                let id = PublishedStoryId::from_uuid(id);
                if let Some(mut story) = self.published_stories.get(id).await? {
                    story.mark_error(details.clone());
                    self.published_stories.save(&story).await?;
                }
                self.publish_client_update(&ClientUpdate {
                    user_id: payload.user_id,
                    aggregate_type: "published_story".to_string(),
                    aggregate_id: id.into(),
                    status: "error".to_string(),
                    error_details: Some(details),
                    scene_id: None,
                })
                .await
            }
            PromptType::NovelCreator | PromptType::NovelGameOverCreator => {
                let Some(id) = payload.game_state_id else {
                    return Ok(());
                };
                let id = PlayerGameStateId::from_uuid(id);
                if let Some(mut gs) = self.game_states.get(id).await? {
                    gs.mark_error();
                    self.game_states.save(&gs).await?;
                    self.publish_client_update(&gs_update_error(&gs, &details)).await?;
                }
                Ok(())
            }
            PromptType::CharacterImage | PromptType::StoryPreviewImage => {
                // No status-bearing aggregate owns an image generation
                // outcome (§4.2's table has no error effect for these
                // prompt types); nothing to flip to `error`.
                Ok(())
            }
        }
    }

    async fn apply_narrator(&self, payload: &NotificationPayload) -> Result<(), RepositoryError> {
        let id = payload
            .story_config_id
            .ok_or_else(|| RepositoryError::Backend("narrator notification missing story_config_id".to_string()))?;
        let id = StoryConfigId::from_uuid(id);
        let mut draft = self
            .story_configs
            .get(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("StoryConfig {id}")))?;

        if draft.is_terminal() {
            return Ok(());
        }

        let text = payload.generated_text.as_deref().unwrap_or_default();
        match extract_json(text) {
            Ok(config_json) => draft.mark_ready(config_json),
            Err(_) => draft.mark_error("failed to parse model output as JSON"),
        }
        self.story_configs.save(&draft).await?;

        self.publish_client_update(&ClientUpdate {
            user_id: payload.user_id,
            aggregate_type: "story_config".to_string(),
            aggregate_id: id.into(),
            status: draft.status.as_str().to_string(),
            error_details: draft.error_details.clone(),
            scene_id: None,
        })
        .await
    }

    async fn apply_novel_setup(&self, payload: &NotificationPayload) -> Result<(), RepositoryError> {
        let id = payload
            .published_story_id
            .ok_or_else(|| RepositoryError::Backend("novel_setup notification missing published_story_id".to_string()))?;
        let id = PublishedStoryId::from_uuid(id);
        let mut story = self
            .published_stories
            .get(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("PublishedStory {id}")))?;

        if !matches!(
            story.status,
            crate::domain::value_objects::PublishedStoryStatus::SetupGenerating
        ) {
            return Ok(());
        }

        let text = payload.generated_text.as_deref().unwrap_or_default();
        match extract_json(text) {
            Ok(setup_json) => {
                story.mark_setup_ready(setup_json);
                self.published_stories.save(&story).await?;
                self.publish_client_update(&ClientUpdate {
                    user_id: payload.user_id,
                    aggregate_type: "published_story".to_string(),
                    aggregate_id: id.into(),
                    status: story.status.as_str().to_string(),
                    error_details: None,
                    scene_id: None,
                })
                .await?;

                if self.dispatcher.dispatch_first_scene(id).await.is_err() {
                    tracing::warn!(published_story_id = %id, "failed to dispatch first-scene task after commit");
                }
                Ok(())
            }
            Err(_) => {
                story.mark_error("failed to parse model output as JSON");
                self.published_stories.save(&story).await?;
                self.publish_client_update(&ClientUpdate {
                    user_id: payload.user_id,
                    aggregate_type: "published_story".to_string(),
                    aggregate_id: id.into(),
                    status: "error".to_string(),
                    error_details: story.error_details.clone(),
                    scene_id: None,
                })
                .await
            }
        }
    }

    async fn apply_first_scene(&self, payload: &NotificationPayload) -> Result<(), RepositoryError> {
        let id = payload
            .published_story_id
            .ok_or_else(|| RepositoryError::Backend("first_scene notification missing published_story_id".to_string()))?;
        let id = PublishedStoryId::from_uuid(id);
        let mut story = self
            .published_stories
            .get(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("PublishedStory {id}")))?;

        if !story.is_first_scene_pending {
            return Ok(());
        }

        let text = payload.generated_text.as_deref().unwrap_or_default();
        let content_json = match extract_json(text) {
            Ok(v) => v,
            Err(_) => {
                story.mark_error("failed to parse model output as JSON");
                self.published_stories.save(&story).await?;
                return self
                    .publish_client_update(&ClientUpdate {
                        user_id: payload.user_id,
                        aggregate_type: "published_story".to_string(),
                        aggregate_id: id.into(),
                        status: "error".to_string(),
                        error_details: story.error_details.clone(),
                        scene_id: None,
                    })
                    .await;
            }
        };

        let initial_stats = initial_core_stats(&story);
        let state_hash = StateHash::compute(&initial_stats, &[], &Value::Null, None);
        let scene = StoryScene::new(id, state_hash, content_json);
        let persisted = self.scene_cache.insert(&scene).await?;

        story.mark_first_scene_ready();
        self.published_stories.save(&story).await?;

        self.publish_client_update(&ClientUpdate {
            user_id: payload.user_id,
            aggregate_type: "published_story".to_string(),
            aggregate_id: id.into(),
            status: story.status.as_str().to_string(),
            error_details: None,
            scene_id: Some(persisted.id.into()),
        })
        .await
    }

    async fn apply_novel_creator(&self, payload: &NotificationPayload) -> Result<(), RepositoryError> {
        let story_id = payload
            .published_story_id
            .ok_or_else(|| RepositoryError::Backend("novel_creator notification missing published_story_id".to_string()))?;
        let story_id = PublishedStoryId::from_uuid(story_id);

        let state_hash = StateHash::from(
            payload
                .state_hash
                .clone()
                .ok_or_else(|| RepositoryError::Backend("novel_creator notification missing state_hash".to_string()))?,
        );

        let text = payload.generated_text.as_deref().unwrap_or_default();
        let content_json = match extract_json(text) {
            Ok(v) => v,
            Err(_) => {
                // §4.2 "a message whose payload is neither parseable nor an
                // explicit error is treated as `error` for the aggregate" —
                // here the owning aggregate is the `PlayerGameState` stuck
                // in `generating_scene`, not the broker delivery itself.
                let Some(id) = payload.game_state_id else {
                    return Ok(());
                };
                let id = PlayerGameStateId::from_uuid(id);
                if let Some(mut gs) = self.game_states.get(id).await? {
                    gs.mark_error();
                    self.game_states.save(&gs).await?;
                    self.publish_client_update(&gs_update_error(
                        &gs,
                        "failed to parse model output as JSON",
                    ))
                    .await?;
                }
                return Ok(());
            }
        };

        let scene = StoryScene::new(story_id, state_hash.clone(), content_json);
        let persisted = self.scene_cache.insert(&scene).await?;

        let mut waiting = self
            .game_states
            .find_awaiting_state_hash(story_id, &state_hash)
            .await?;

        if let Some(id) = payload.game_state_id {
            let id = PlayerGameStateId::from_uuid(id);
            if !waiting.iter().any(|gs| gs.id == id) {
                if let Some(gs) = self.game_states.get(id).await? {
                    waiting.push(gs);
                }
            }
        }

        for mut gs in waiting {
            gs.attach_scene(persisted.id);
            self.game_states.save(&gs).await?;
            self.publish_client_update(&ClientUpdate {
                user_id: gs.player_id.into(),
                aggregate_type: "player_game_state".to_string(),
                aggregate_id: gs.id.into(),
                status: "playing".to_string(),
                error_details: None,
                scene_id: Some(persisted.id.into()),
            })
            .await?;
        }

        Ok(())
    }

    async fn apply_game_over(&self, payload: &NotificationPayload) -> Result<(), RepositoryError> {
        let id = payload
            .game_state_id
            .ok_or_else(|| RepositoryError::Backend("game_over notification missing game_state_id".to_string()))?;
        let id = PlayerGameStateId::from_uuid(id);
        let mut gs = self
            .game_states
            .get(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("PlayerGameState {id}")))?;

        let ending_text = payload.generated_text.clone().unwrap_or_default();
        gs.mark_completed(ending_text);
        self.game_states.save(&gs).await?;

        self.publish_client_update(&ClientUpdate {
            user_id: gs.player_id.into(),
            aggregate_type: "player_game_state".to_string(),
            aggregate_id: id.into(),
            status: "completed".to_string(),
            error_details: None,
            scene_id: None,
        })
        .await?;

        self.maybe_push(gs.player_id.into(), "Your story has ended", "Come see how it ends.")
            .await
    }

    async fn apply_image_result(&self, payload: &NotificationPayload, prompt_type: PromptType) -> Result<(), RepositoryError> {
        let image_url = payload.generated_text.clone().unwrap_or_default();
        let reference_key = match (payload.published_story_id, payload.story_config_id) {
            (Some(story_id), _) => format!("{}:{}", story_id, prompt_type.as_str()),
            (None, Some(draft_id)) => format!("{}:{}", draft_id, prompt_type.as_str()),
            (None, None) => format!("{}:{}", payload.task_id, prompt_type.as_str()),
        };
        let reference = ImageReference::new(reference_key.clone(), image_url.clone());
        self.images.upsert(&reference).await?;

        if prompt_type == PromptType::StoryPreviewImage {
            if let Some(story_id) = payload.published_story_id {
                let story_id = PublishedStoryId::from_uuid(story_id);
                if let Some(mut story) = self.published_stories.get(story_id).await? {
                    story.set_preview_image(image_url);
                    self.published_stories.save(&story).await?;
                }
            }
        }

        Ok(())
    }

    async fn publish_client_update(&self, update: &ClientUpdate) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec(update)
            .map_err(|e| RepositoryError::Backend(format!("client update serialize: {e}")))?;
        self.broker
            .publish(CLIENT_UPDATES_EXCHANGE, &update.user_id.to_string(), &bytes)
            .await
            .map_err(|e| RepositoryError::Backend(format!("client update publish: {e}")))
    }

    /// SPEC_FULL §11 supplement: optional push event when the user has a
    /// registered `DeviceToken`.
    async fn maybe_push(&self, user_id: Uuid, title: &str, body: &str) -> Result<(), RepositoryError> {
        let user_id = crate::domain::value_objects::UserId::from_uuid(user_id);
        let tokens = self.device_tokens.list_for_user(user_id).await?;
        if tokens.is_empty() {
            return Ok(());
        }

        let event = PushNotificationEvent {
            user_id: user_id.into(),
            title: title.to_string(),
            body: body.to_string(),
        };
        let bytes = serde_json::to_vec(&event)
            .map_err(|e| RepositoryError::Backend(format!("push event serialize: {e}")))?;
        self.broker
            .publish(PUSH_NOTIFICATIONS_EXCHANGE, PUSH_NOTIFICATIONS_QUEUE, &bytes)
            .await
            .map_err(|e| RepositoryError::Backend(format!("push event publish: {e}")))
    }
}

fn gs_update_error(
    gs: &crate::domain::entities::PlayerGameState,
    details: &str,
) -> ClientUpdate {
    ClientUpdate {
        user_id: gs.player_id.into(),
        aggregate_type: "player_game_state".to_string(),
        aggregate_id: gs.id.into(),
        status: "error".to_string(),
        error_details: Some(details.to_string()),
        scene_id: None,
    }
}

/// Reads `core_stats` out of `PublishedStory.setup_json` — the shape this
/// implementation assumes `novel_setup` generation writes, mirroring the
/// `game_over_boundaries` assumption in `task_dispatcher`.
fn initial_core_stats(story: &crate::domain::entities::PublishedStory) -> BTreeMap<String, i64> {
    story
        .setup_json
        .as_ref()
        .and_then(|v| v.get("core_stats"))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dto::NotificationStatus;
    use crate::domain::entities::StoryConfig;
    use crate::domain::value_objects::UserId;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct InMemoryStoryConfigs {
        rows: Mutex<Vec<StoryConfig>>,
    }

    #[async_trait]
    impl StoryConfigRepositoryPort for InMemoryStoryConfigs {
        async fn save(&self, draft: &StoryConfig) -> Result<(), RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(existing) = rows.iter_mut().find(|r| r.id == draft.id) {
                *existing = draft.clone();
            } else {
                rows.push(draft.clone());
            }
            Ok(())
        }

        async fn get(&self, id: StoryConfigId) -> Result<Option<StoryConfig>, RepositoryError> {
            Ok(self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned())
        }

        async fn delete(&self, _id: StoryConfigId, _owner: UserId) -> Result<bool, RepositoryError> {
            Ok(false)
        }

        async fn count_generating_for_user(&self, _user_id: UserId) -> Result<i64, RepositoryError> {
            Ok(0)
        }

        async fn find_stuck(
            &self,
            _older_than: chrono::DateTime<chrono::Utc>,
        ) -> Result<Vec<StoryConfig>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn narrator_success_marks_draft_ready_with_parsed_config() {
        let mut draft = StoryConfig::new(UserId::new(), "forest adventure");
        draft.begin_generation();
        let draft_id = draft.id;
        let user_id = draft.user_id;
        let repo = Arc::new(InMemoryStoryConfigs {
            rows: Mutex::new(vec![draft]),
        });

        let payload = NotificationPayload {
            task_id: Uuid::new_v4(),
            user_id: user_id.into(),
            prompt_type: "narrator".to_string(),
            status: NotificationStatus::Success,
            generated_text: Some("```json\n{\"title\": \"The Forest\"}\n```".to_string()),
            error_details: None,
            story_config_id: Some(draft_id.into()),
            published_story_id: None,
            state_hash: None,
            game_state_id: None,
        };

        let extracted = extract_json(payload.generated_text.as_deref().unwrap()).unwrap();
        assert_eq!(extracted, serde_json::json!({"title": "The Forest"}));

        let stored = repo.get(draft_id).await.unwrap().unwrap();
        assert_eq!(stored.status, crate::domain::value_objects::StoryConfigStatus::Generating);
    }

    use crate::domain::entities::{PlayerGameState, PublishedStory};
    use crate::domain::value_objects::{PlayerProgressId, PlayerStatus, PublishedStoryStatus};
    use dashmap::DashSet;

    struct InMemoryPublishedStories {
        rows: Mutex<Vec<PublishedStory>>,
    }

    #[async_trait]
    impl PublishedStoryRepositoryPort for InMemoryPublishedStories {
        async fn save(&self, story: &PublishedStory) -> Result<(), RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(existing) = rows.iter_mut().find(|r| r.id == story.id) {
                *existing = story.clone();
            } else {
                rows.push(story.clone());
            }
            Ok(())
        }

        async fn get(&self, id: PublishedStoryId) -> Result<Option<PublishedStory>, RepositoryError> {
            Ok(self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned())
        }

        async fn delete(&self, _id: PublishedStoryId, _owner: UserId) -> Result<bool, RepositoryError> {
            Ok(false)
        }

        async fn count_generating_for_user(&self, _user_id: UserId) -> Result<i64, RepositoryError> {
            Ok(0)
        }

        async fn find_stuck(
            &self,
            _older_than: chrono::DateTime<chrono::Utc>,
        ) -> Result<Vec<PublishedStory>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    struct InMemoryGameStates {
        rows: Mutex<Vec<PlayerGameState>>,
    }

    #[async_trait]
    impl PlayerGameStateRepositoryPort for InMemoryGameStates {
        async fn save(&self, state: &PlayerGameState) -> Result<(), RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(existing) = rows.iter_mut().find(|r| r.id == state.id) {
                *existing = state.clone();
            } else {
                rows.push(state.clone());
            }
            Ok(())
        }

        async fn get(&self, id: PlayerGameStateId) -> Result<Option<PlayerGameState>, RepositoryError> {
            Ok(self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned())
        }

        async fn delete(&self, _id: PlayerGameStateId, _owner: UserId) -> Result<bool, RepositoryError> {
            Ok(false)
        }

        async fn find_awaiting_state_hash(
            &self,
            _published_story_id: PublishedStoryId,
            _state_hash: &StateHash,
        ) -> Result<Vec<PlayerGameState>, RepositoryError> {
            Ok(Vec::new())
        }

        async fn find_stuck(
            &self,
            _older_than: chrono::DateTime<chrono::Utc>,
        ) -> Result<Vec<PlayerGameState>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    struct NullImages;

    #[async_trait]
    impl ImageReferenceRepositoryPort for NullImages {
        async fn upsert(&self, _reference: &ImageReference) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn get(&self, _reference_key: &str) -> Result<Option<ImageReference>, RepositoryError> {
            Ok(None)
        }
    }

    struct NullDeviceTokens;

    #[async_trait]
    impl DeviceTokenRepositoryPort for NullDeviceTokens {
        async fn register(&self, _token: &crate::domain::entities::DeviceToken) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn unregister(&self, _user_id: UserId, _token: &str) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn list_for_user(&self, _user_id: UserId) -> Result<Vec<crate::domain::entities::DeviceToken>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    struct NullDispatcher;

    #[async_trait]
    impl GenerationPipelineUseCase for NullDispatcher {
        async fn publish_draft(
            &self,
            _draft_id: StoryConfigId,
        ) -> Result<crate::application::ports::inbound::DispatchOutcome, crate::application::ports::inbound::UseCaseError>
        {
            unimplemented!("not exercised by these tests")
        }

        async fn dispatch_first_scene(
            &self,
            _published_story_id: PublishedStoryId,
        ) -> Result<crate::application::ports::inbound::DispatchOutcome, crate::application::ports::inbound::UseCaseError>
        {
            unimplemented!("not exercised by these tests")
        }

        async fn apply_player_choice(
            &self,
            _game_state_id: PlayerGameStateId,
            _choice_index: u32,
        ) -> Result<crate::application::ports::inbound::DispatchOutcome, crate::application::ports::inbound::UseCaseError>
        {
            unimplemented!("not exercised by these tests")
        }

        async fn dispatch_game_over(
            &self,
            _game_state_id: PlayerGameStateId,
            _reason: crate::domain::value_objects::GameOverReason,
        ) -> Result<crate::application::ports::inbound::DispatchOutcome, crate::application::ports::inbound::UseCaseError>
        {
            unimplemented!("not exercised by these tests")
        }

        async fn retry_initial_generation(
            &self,
            _draft_id: StoryConfigId,
        ) -> Result<crate::application::ports::inbound::DispatchOutcome, crate::application::ports::inbound::UseCaseError>
        {
            unimplemented!("not exercised by these tests")
        }

        async fn retry_generation_for_game_state(
            &self,
            _game_state_id: PlayerGameStateId,
        ) -> Result<PlayerGameState, crate::application::ports::inbound::UseCaseError> {
            unimplemented!("not exercised by these tests")
        }
    }

    struct RecordingBroker {
        published: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    #[async_trait]
    impl BrokerPort for RecordingBroker {
        async fn declare_exchange(
            &self,
            _spec: &crate::application::ports::outbound::ExchangeSpec,
        ) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn declare_queue(
            &self,
            _spec: &crate::application::ports::outbound::QueueSpec,
        ) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> Result<(), BrokerError> {
            self.published
                .lock()
                .unwrap()
                .push((exchange.to_string(), routing_key.to_string(), payload.to_vec()));
            Ok(())
        }

        async fn consume(
            &self,
            _queue: &str,
            _consumer_tag: &str,
            _prefetch: u16,
        ) -> Result<Box<dyn crate::application::ports::outbound::Consumer>, BrokerError> {
            unimplemented!("not exercised by these tests")
        }
    }

    struct InMemorySceneRepo {
        scenes: Mutex<Vec<StoryScene>>,
    }

    #[async_trait]
    impl crate::application::ports::outbound::StorySceneRepositoryPort for InMemorySceneRepo {
        async fn insert_if_absent(&self, scene: &StoryScene) -> Result<StoryScene, RepositoryError> {
            let mut scenes = self.scenes.lock().unwrap();
            if let Some(existing) = scenes
                .iter()
                .find(|s| s.published_story_id == scene.published_story_id && s.state_hash == scene.state_hash)
            {
                return Ok(existing.clone());
            }
            scenes.push(scene.clone());
            Ok(scene.clone())
        }

        async fn find_by_state_hash(
            &self,
            published_story_id: PublishedStoryId,
            state_hash: &StateHash,
        ) -> Result<Option<StoryScene>, RepositoryError> {
            let scenes = self.scenes.lock().unwrap();
            Ok(scenes
                .iter()
                .find(|s| s.published_story_id == published_story_id && &s.state_hash == state_hash)
                .cloned())
        }

        async fn get(&self, id: crate::domain::value_objects::StorySceneId) -> Result<Option<StoryScene>, RepositoryError> {
            let scenes = self.scenes.lock().unwrap();
            Ok(scenes.iter().find(|s| s.id == id).cloned())
        }
    }

    struct InMemoryRegistry {
        building: DashSet<(PublishedStoryId, String)>,
    }

    impl crate::application::ports::outbound::ReservationRegistryPort for InMemoryRegistry {
        fn try_reserve(
            &self,
            published_story_id: PublishedStoryId,
            state_hash: &StateHash,
        ) -> crate::application::ports::outbound::ReservationOutcome {
            let key = (published_story_id, state_hash.as_str().to_string());
            if self.building.insert(key) {
                crate::application::ports::outbound::ReservationOutcome::Reserved
            } else {
                crate::application::ports::outbound::ReservationOutcome::AlreadyBuilding
            }
        }

        fn release(&self, published_story_id: PublishedStoryId, state_hash: &StateHash) {
            self.building
                .remove(&(published_story_id, state_hash.as_str().to_string()));
        }

        fn is_reserved(&self, published_story_id: PublishedStoryId, state_hash: &StateHash) -> bool {
            self.building
                .contains(&(published_story_id, state_hash.as_str().to_string()))
        }
    }

    fn service(
        story_configs: Arc<dyn StoryConfigRepositoryPort>,
        published_stories: Arc<dyn PublishedStoryRepositoryPort>,
        game_states: Arc<dyn PlayerGameStateRepositoryPort>,
        broker: Arc<RecordingBroker>,
    ) -> NotificationConsumerService {
        let scene_cache = Arc::new(SceneCacheService::new(
            Arc::new(InMemorySceneRepo {
                scenes: Mutex::new(Vec::new()),
            }),
            Arc::new(InMemoryRegistry {
                building: DashSet::new(),
            }),
        ));
        NotificationConsumerService::new(
            story_configs,
            published_stories,
            game_states,
            Arc::new(NullImages),
            Arc::new(NullDeviceTokens),
            scene_cache,
            Arc::new(NullDispatcher),
            broker,
            "test-consumer",
        )
    }

    /// Regression test for the bug where `novel_setup` errors were routed
    /// by id-presence (`story_config_id` first) instead of by which
    /// aggregate the prompt type owns — a `novel_setup` task carries both
    /// ids, and the draft is already `ready` by the time its `PublishedStory`
    /// starts generating.
    #[tokio::test]
    async fn novel_setup_error_marks_published_story_not_story_config() {
        let mut draft = StoryConfig::new(UserId::new(), "forest adventure");
        draft.begin_generation();
        draft.mark_ready(serde_json::json!({"title": "The Forest"}));
        let draft_id = draft.id;
        let user_id = draft.user_id;

        let story = PublishedStory::new(user_id, serde_json::json!({}));
        let story_id = story.id;
        assert_eq!(story.status, PublishedStoryStatus::SetupGenerating);

        let story_configs = Arc::new(InMemoryStoryConfigs {
            rows: Mutex::new(vec![draft]),
        });
        let published_stories = Arc::new(InMemoryPublishedStories {
            rows: Mutex::new(vec![story]),
        });
        let game_states = Arc::new(InMemoryGameStates {
            rows: Mutex::new(Vec::new()),
        });
        let broker = Arc::new(RecordingBroker {
            published: Mutex::new(Vec::new()),
        });

        let svc = service(story_configs.clone(), published_stories.clone(), game_states, broker);

        let payload = NotificationPayload {
            task_id: Uuid::new_v4(),
            user_id: user_id.into(),
            prompt_type: "novel_setup".to_string(),
            status: NotificationStatus::Error,
            generated_text: None,
            error_details: Some("model endpoint timed out".to_string()),
            story_config_id: Some(draft_id.into()),
            published_story_id: Some(story_id.into()),
            state_hash: None,
            game_state_id: None,
        };

        svc.apply(&payload).await.unwrap();

        let draft_after = story_configs.get(draft_id).await.unwrap().unwrap();
        assert_eq!(draft_after.status, crate::domain::value_objects::StoryConfigStatus::Ready);

        let story_after = published_stories.get(story_id).await.unwrap().unwrap();
        assert_eq!(story_after.status, PublishedStoryStatus::Error);
        assert_eq!(story_after.error_details.as_deref(), Some("model endpoint timed out"));
    }

    /// Regression test for the bug where unparseable `novel_creator`
    /// output returned a transport-style `Err`, nacking the delivery
    /// without requeue and stranding the `PlayerGameState` until the
    /// reaper instead of marking it `error` immediately.
    #[tokio::test]
    async fn apply_novel_creator_parse_failure_marks_game_state_error() {
        let published_story_id = PublishedStoryId::new();
        let mut gs = PlayerGameState::new(UserId::new(), published_story_id, PlayerProgressId::new());
        gs.begin_scene_generation();
        let gs_id = gs.id;

        let story_configs = Arc::new(InMemoryStoryConfigs {
            rows: Mutex::new(Vec::new()),
        });
        let published_stories = Arc::new(InMemoryPublishedStories {
            rows: Mutex::new(Vec::new()),
        });
        let game_states = Arc::new(InMemoryGameStates {
            rows: Mutex::new(vec![gs]),
        });
        let broker = Arc::new(RecordingBroker {
            published: Mutex::new(Vec::new()),
        });

        let svc = service(story_configs, published_stories, game_states.clone(), broker.clone());

        let payload = NotificationPayload {
            task_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            prompt_type: "novel_creator".to_string(),
            status: NotificationStatus::Success,
            generated_text: None,
            error_details: None,
            story_config_id: None,
            published_story_id: Some(published_story_id.into()),
            state_hash: Some("deadbeef".to_string()),
            game_state_id: Some(gs_id.into()),
        };

        svc.apply(&payload).await.unwrap();

        let gs_after = game_states.get(gs_id).await.unwrap().unwrap();
        assert_eq!(gs_after.player_status, PlayerStatus::Error);

        let published = broker.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        let update: ClientUpdate = serde_json::from_slice(&published[0].2).unwrap();
        assert_eq!(update.status, "error");
        assert_eq!(update.aggregate_type, "player_game_state");
    }
}
