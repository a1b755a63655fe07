//! Wire payloads exchanged over the broker (§6). Field names follow the
//! canonical JSON shapes given in the spec, including the deliberate
//! `camelCase`/`snake_case` mismatch between `GenerationTaskPayload` and
//! `NotificationPayload` — both are reproduced verbatim since external
//! producers/consumers already depend on them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTaskPayload {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub prompt_type: String,
    pub user_input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_config_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_story_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_state_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub prompt_type: String,
    pub status: NotificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_config_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_story_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "gameStateId")]
    pub game_state_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterImageTaskPayload {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub character_id: Uuid,
    pub prompt: String,
    pub negative_prompt: String,
    pub image_reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterImageResultPayload {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub character_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub image_reference: String,
}

/// §6 `config_update_exchange` payload, fanned out to ephemeral
/// per-consumer queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigUpdatePayload {
    pub key: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PromptEventType {
    Created,
    Updated,
    Deleted,
}

/// §6 `prompts_exchange` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptEvent {
    pub event_type: PromptEventType,
    pub key: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub id: Uuid,
}

/// §2 "pushes a `ClientUpdate`... on a per-user exchange", routed on
/// `client_updates` (§6) with the owning user id as routing key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientUpdate {
    pub user_id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<Uuid>,
}

/// SPEC_FULL §11 supplement: optionally emitted alongside a `ClientUpdate`
/// when the owning user has a registered `DeviceToken` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushNotificationEvent {
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_task_payload_uses_camel_case_wire_fields() {
        let payload = GenerationTaskPayload {
            task_id: Uuid::nil(),
            user_id: Uuid::nil(),
            prompt_type: "novel_setup".to_string(),
            user_input: "forest adventure".to_string(),
            story_config_id: None,
            published_story_id: Some(Uuid::nil()),
            state_hash: None,
            game_state_id: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["taskId"], serde_json::json!(Uuid::nil()));
        assert_eq!(json["publishedStoryId"], serde_json::json!(Uuid::nil()));
        assert!(json.get("storyConfigId").is_none());
    }

    #[test]
    fn notification_payload_round_trips_through_json() {
        let payload = NotificationPayload {
            task_id: Uuid::nil(),
            user_id: Uuid::nil(),
            prompt_type: "novel_creator".to_string(),
            status: NotificationStatus::Success,
            generated_text: Some("text".to_string()),
            error_details: None,
            story_config_id: None,
            published_story_id: Some(Uuid::nil()),
            state_hash: Some("abc".to_string()),
            game_state_id: Some(Uuid::nil()),
        };
        let json = serde_json::to_string(&payload).unwrap();
        let back: NotificationPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, NotificationStatus::Success);
        assert_eq!(back.state_hash.as_deref(), Some("abc"));
    }

    #[test]
    fn notification_payload_uses_camel_case_for_game_state_id_only() {
        let payload = NotificationPayload {
            task_id: Uuid::nil(),
            user_id: Uuid::nil(),
            prompt_type: "novel_creator".to_string(),
            status: NotificationStatus::Success,
            generated_text: None,
            error_details: None,
            story_config_id: None,
            published_story_id: None,
            state_hash: None,
            game_state_id: Some(Uuid::nil()),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["gameStateId"], serde_json::json!(Uuid::nil()));
        assert!(json.get("game_state_id").is_none());
        assert!(json.get("published_story_id").is_none());
    }
}
