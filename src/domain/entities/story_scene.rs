//! `StoryScene` — immutable generated content keyed by `(story_id,
//! state_hash)` (§3). Created once by NC, never mutated thereafter.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::value_objects::{PublishedStoryId, StateHash, StorySceneId};

#[derive(Debug, Clone)]
pub struct StoryScene {
    pub id: StorySceneId,
    pub published_story_id: PublishedStoryId,
    pub state_hash: StateHash,
    pub content_json: Value,
    pub created_at: DateTime<Utc>,
}

impl StoryScene {
    pub fn new(published_story_id: PublishedStoryId, state_hash: StateHash, content_json: Value) -> Self {
        Self {
            id: StorySceneId::new(),
            published_story_id,
            state_hash,
            content_json,
            created_at: Utc::now(),
        }
    }
}
