//! `PlayerGameState` — one-per-save-slot session state (§3).

use chrono::{DateTime, Utc};

use crate::domain::value_objects::{
    PlayerGameStateId, PlayerProgressId, PlayerStatus, PublishedStoryId, StorySceneId, UserId,
};

#[derive(Debug, Clone)]
pub struct PlayerGameState {
    pub id: PlayerGameStateId,
    pub player_id: UserId,
    pub published_story_id: PublishedStoryId,
    pub current_scene_id: Option<StorySceneId>,
    pub player_progress_id: PlayerProgressId,
    pub player_status: PlayerStatus,
    pub ending_text: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PlayerGameState {
    pub fn new(
        player_id: UserId,
        published_story_id: PublishedStoryId,
        player_progress_id: PlayerProgressId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PlayerGameStateId::new(),
            player_id,
            published_story_id,
            current_scene_id: None,
            player_progress_id,
            player_status: PlayerStatus::Playing,
            ending_text: None,
            started_at: now,
            last_activity_at: now,
            completed_at: None,
        }
    }

    /// §4.3 dispatch for `player_choice`: about to await a `novel_creator`
    /// task for a cache miss.
    pub fn begin_scene_generation(&mut self) {
        self.player_status = PlayerStatus::GeneratingScene;
        self.last_activity_at = Utc::now();
    }

    /// §4.2 `novel_creator` success: attach the resolved scene (whether
    /// freshly generated or a cache hit) and return to `playing`.
    pub fn attach_scene(&mut self, scene_id: StorySceneId) {
        self.current_scene_id = Some(scene_id);
        self.player_status = PlayerStatus::Playing;
        self.last_activity_at = Utc::now();
    }

    /// §4.3 `game_over_detected`: a `novel_game_over_creator` task has
    /// been dispatched.
    pub fn begin_game_over(&mut self) {
        self.player_status = PlayerStatus::GameOverPending;
        self.last_activity_at = Utc::now();
    }

    /// §4.2 `novel_game_over_creator` success.
    pub fn mark_completed(&mut self, ending_text: impl Into<String>) {
        let now = Utc::now();
        self.ending_text = Some(ending_text.into());
        self.player_status = PlayerStatus::Completed;
        self.completed_at = Some(now);
        self.last_activity_at = now;
    }

    pub fn mark_error(&mut self) {
        self.player_status = PlayerStatus::Error;
        self.last_activity_at = Utc::now();
    }

    /// §3 invariant: `player_status = generating_scene` implies a live
    /// outbox/broker task; used by the reaper and by `ReserveOrLookup`.
    pub fn is_generating(&self) -> bool {
        self.player_status.is_generating()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_state() -> PlayerGameState {
        PlayerGameState::new(UserId::new(), PublishedStoryId::new(), PlayerProgressId::new())
    }

    #[test]
    fn scene_generation_round_trip() {
        let mut gs = new_state();
        gs.begin_scene_generation();
        assert_eq!(gs.player_status, PlayerStatus::GeneratingScene);
        let scene_id = StorySceneId::new();
        gs.attach_scene(scene_id);
        assert_eq!(gs.player_status, PlayerStatus::Playing);
        assert_eq!(gs.current_scene_id, Some(scene_id));
    }

    #[test]
    fn completion_sets_ending_and_timestamp() {
        let mut gs = new_state();
        gs.begin_game_over();
        assert!(gs.is_generating());
        gs.mark_completed("You walk into the sunset.");
        assert_eq!(gs.player_status, PlayerStatus::Completed);
        assert!(gs.completed_at.is_some());
        assert_eq!(gs.ending_text.as_deref(), Some("You walk into the sunset."));
    }
}
