//! `PublishedStory` — a draft that a user has published (§3).

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::value_objects::{PublishedStoryId, PublishedStoryStatus, UserId};

#[derive(Debug, Clone)]
pub struct PublishedStory {
    pub id: PublishedStoryId,
    pub user_id: UserId,
    pub config_json: Value,
    pub setup_json: Option<Value>,
    pub status: PublishedStoryStatus,
    pub error_details: Option<String>,
    pub is_first_scene_pending: bool,
    pub are_images_pending: bool,
    pub is_public: bool,
    pub likes_count: i64,
    pub preview_image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublishedStory {
    pub fn new(user_id: UserId, config_json: Value) -> Self {
        let now = Utc::now();
        Self {
            id: PublishedStoryId::new(),
            user_id,
            config_json,
            setup_json: None,
            status: PublishedStoryStatus::SetupGenerating,
            error_details: None,
            is_first_scene_pending: false,
            are_images_pending: false,
            is_public: false,
            likes_count: 0,
            preview_image_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// §4.2 `novel_setup` success: write setup, advance to
    /// `first_scene_generating`, flip `is_first_scene_pending`.
    pub fn mark_setup_ready(&mut self, setup_json: Value) {
        self.setup_json = Some(setup_json);
        self.status = PublishedStoryStatus::FirstSceneGenerating;
        self.is_first_scene_pending = true;
        self.updated_at = Utc::now();
    }

    /// §4.2 `novel_first_scene_creator` success: clear the pending flag,
    /// reach the soft-terminal `ready` state.
    pub fn mark_first_scene_ready(&mut self) {
        self.is_first_scene_pending = false;
        self.status = PublishedStoryStatus::Ready;
        self.updated_at = Utc::now();
    }

    pub fn mark_error(&mut self, details: impl Into<String>) {
        self.status = PublishedStoryStatus::Error;
        self.error_details = Some(details.into());
        self.is_first_scene_pending = false;
        self.are_images_pending = false;
        self.updated_at = Utc::now();
    }

    /// §3 invariant: `likes_count ≥ 0`; decrement must clamp.
    pub fn add_like(&mut self) {
        self.likes_count += 1;
        self.updated_at = Utc::now();
    }

    pub fn remove_like(&mut self) {
        self.likes_count = (self.likes_count - 1).max(0);
        self.updated_at = Utc::now();
    }

    pub fn set_preview_image(&mut self, url: impl Into<String>) {
        self.preview_image_ref = Some(url.into());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn likes_count_clamps_at_zero() {
        let mut story = PublishedStory::new(UserId::new(), serde_json::json!({}));
        story.remove_like();
        story.remove_like();
        assert_eq!(story.likes_count, 0);
        story.add_like();
        story.remove_like();
        story.remove_like();
        assert_eq!(story.likes_count, 0);
    }

    #[test]
    fn setup_then_first_scene_transitions() {
        let mut story = PublishedStory::new(UserId::new(), serde_json::json!({}));
        assert_eq!(story.status, PublishedStoryStatus::SetupGenerating);
        story.mark_setup_ready(serde_json::json!({"characters": []}));
        assert_eq!(story.status, PublishedStoryStatus::FirstSceneGenerating);
        assert!(story.is_first_scene_pending);
        story.mark_first_scene_ready();
        assert_eq!(story.status, PublishedStoryStatus::Ready);
        assert!(!story.is_first_scene_pending);
    }
}
