//! DLQ maintenance consumer (§6 "DLQ messages are consumed by a
//! maintenance consumer that marks the owning aggregate `error`",
//! SPEC_FULL §11 supplement). Grounded on the teacher's queue-worker
//! consume-loop shape (`queue_workers.rs`), generalized to drain both
//! work-queue DLQs this crate declares (`story_generation_tasks.dlq`,
//! `internal_updates.dlq`).

use std::sync::Arc;

use crate::application::errors::BrokerError;
use crate::application::ports::outbound::{
    BrokerPort, PlayerGameStateRepositoryPort, PublishedStoryRepositoryPort,
    StoryConfigRepositoryPort,
};
use crate::application::topology::{GENERATION_TASKS_DLQ, INTERNAL_UPDATES_DLQ};
use crate::domain::value_objects::{PlayerGameStateId, PublishedStoryId, StoryConfigId};

/// Wire fields the DLQ maintenance consumer needs out of whichever
/// payload shape a dead-lettered message happens to carry
/// (`GenerationTaskPayload` or `NotificationPayload` both serialize a
/// subset of these under the same field names).
#[derive(Debug, Clone, serde::Deserialize)]
struct DeadLetterFields {
    #[serde(default, alias = "storyConfigId")]
    story_config_id: Option<uuid::Uuid>,
    #[serde(default, alias = "publishedStoryId")]
    published_story_id: Option<uuid::Uuid>,
    #[serde(default, alias = "gameStateId")]
    game_state_id: Option<uuid::Uuid>,
}

pub struct DlqMaintenanceConsumer {
    broker: Arc<dyn BrokerPort>,
    story_configs: Arc<dyn StoryConfigRepositoryPort>,
    published_stories: Arc<dyn PublishedStoryRepositoryPort>,
    game_states: Arc<dyn PlayerGameStateRepositoryPort>,
    consumer_tag: String,
}

impl DlqMaintenanceConsumer {
    pub fn new(
        broker: Arc<dyn BrokerPort>,
        story_configs: Arc<dyn StoryConfigRepositoryPort>,
        published_stories: Arc<dyn PublishedStoryRepositoryPort>,
        game_states: Arc<dyn PlayerGameStateRepositoryPort>,
        consumer_tag: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            story_configs,
            published_stories,
            game_states,
            consumer_tag: consumer_tag.into(),
        }
    }

    /// Drains both DLQs in sequence, one sweep at a time; the caller
    /// loops this on an interval the same way the reaper does.
    pub async fn drain_once(&self) -> Result<usize, BrokerError> {
        let mut handled = 0;
        handled += self.drain_queue(GENERATION_TASKS_DLQ).await?;
        handled += self.drain_queue(INTERNAL_UPDATES_DLQ).await?;
        Ok(handled)
    }

    async fn drain_queue(&self, queue: &str) -> Result<usize, BrokerError> {
        let mut consumer = self.broker.consume(queue, &self.consumer_tag, 1).await?;
        let mut handled = 0;

        // Drain whatever is currently queued, then stop — this is a
        // periodic sweep, not a long-lived consumer loop (unlike GW/NC).
        while let Ok(Some(delivery)) =
            tokio::time::timeout(std::time::Duration::from_millis(200), consumer.next()).await
        {
            let delivery = match delivery {
                Ok(d) => d,
                Err(e) => {
                    tracing::error!(error = %e, queue, "dlq delivery error");
                    continue;
                }
            };

            if let Err(e) = self.mark_error(&delivery.data).await {
                tracing::error!(error = %e, queue, "failed to mark aggregate error from dead letter");
            }
            let _ = delivery.ack().await;
            handled += 1;
        }

        Ok(handled)
    }

    async fn mark_error(
        &self,
        data: &[u8],
    ) -> Result<(), crate::application::errors::RepositoryError> {
        let fields: DeadLetterFields = match serde_json::from_slice(data) {
            Ok(f) => f,
            Err(_) => return Ok(()),
        };

        let reason = "dead-lettered: message exhausted retries or was unroutable";

        if let Some(id) = fields.story_config_id {
            let id = StoryConfigId::from_uuid(id);
            if let Some(mut draft) = self.story_configs.get(id).await? {
                if !draft.is_terminal() {
                    draft.mark_error(reason);
                    self.story_configs.save(&draft).await?;
                }
            }
        }

        if let Some(id) = fields.published_story_id {
            let id = PublishedStoryId::from_uuid(id);
            if let Some(mut story) = self.published_stories.get(id).await? {
                if story.status.is_generating() {
                    story.mark_error(reason);
                    self.published_stories.save(&story).await?;
                }
            }
        }

        if let Some(id) = fields.game_state_id {
            let id = PlayerGameStateId::from_uuid(id);
            if let Some(mut gs) = self.game_states.get(id).await? {
                if gs.is_generating() {
                    gs.mark_error();
                    self.game_states.save(&gs).await?;
                }
            }
        }

        Ok(())
    }
}
