//! Scene Cache (SC, §4.4): keyed store mapping `(published_story_id,
//! state_hash) → scene_content`, guaranteeing at-most-one concurrent build
//! per key. Grounded on the teacher's atomic-claim pattern for queue
//! dequeue (an `UPDATE ... WHERE id = (SELECT ...)` race-free claim),
//! applied here to scene-build reservation instead of queue-item claim.

use std::sync::Arc;

use crate::application::errors::RepositoryError;
use crate::application::ports::outbound::{
    ReservationOutcome, ReservationRegistryPort, StorySceneRepositoryPort,
};
use crate::domain::entities::StoryScene;
use crate::domain::value_objects::{PublishedStoryId, StateHash};

/// §4.4 contract: `Lookup`/`ReserveOrLookup`/`Insert`.
#[derive(Debug, Clone)]
pub enum SceneCacheOutcome {
    Hit(StoryScene),
    Reserved,
    Building,
}

pub struct SceneCacheService {
    scenes: Arc<dyn StorySceneRepositoryPort>,
    registry: Arc<dyn ReservationRegistryPort>,
}

impl SceneCacheService {
    pub fn new(
        scenes: Arc<dyn StorySceneRepositoryPort>,
        registry: Arc<dyn ReservationRegistryPort>,
    ) -> Self {
        Self { scenes, registry }
    }

    pub async fn lookup(
        &self,
        published_story_id: PublishedStoryId,
        state_hash: &StateHash,
    ) -> Result<Option<StoryScene>, RepositoryError> {
        self.scenes
            .find_by_state_hash(published_story_id, state_hash)
            .await
    }

    /// §4.4 `ReserveOrLookup`: a cache hit short-circuits straight to the
    /// existing scene; a miss either wins the in-memory reservation (the
    /// caller must dispatch a `novel_creator` task) or discovers another
    /// owner already building it (the caller subscribes instead of
    /// dispatching a duplicate, §4.3 "player_choice").
    pub async fn reserve_or_lookup(
        &self,
        published_story_id: PublishedStoryId,
        state_hash: &StateHash,
    ) -> Result<SceneCacheOutcome, RepositoryError> {
        if let Some(scene) = self.lookup(published_story_id, state_hash).await? {
            return Ok(SceneCacheOutcome::Hit(scene));
        }

        match self.registry.try_reserve(published_story_id, state_hash) {
            ReservationOutcome::Reserved => Ok(SceneCacheOutcome::Reserved),
            ReservationOutcome::AlreadyBuilding => Ok(SceneCacheOutcome::Building),
        }
    }

    /// §4.4 `Insert`: idempotent insert-if-absent, releasing the build
    /// reservation regardless of whether this call won the insert race
    /// (§8 invariant 2: "first writer wins, subsequent inserts no-op").
    pub async fn insert(&self, scene: &StoryScene) -> Result<StoryScene, RepositoryError> {
        let persisted = self.scenes.insert_if_absent(scene).await?;
        self.registry
            .release(scene.published_story_id, &scene.state_hash);
        Ok(persisted)
    }

    /// SPEC_FULL §11 supplement: reconstructs in-flight reservations from
    /// rows still in a `*_generating` status at startup, since the
    /// registry itself is not ground truth (§9).
    pub fn rebuild_from_pending<I>(&self, pending: I)
    where
        I: IntoIterator<Item = (PublishedStoryId, StateHash)>,
    {
        for (story_id, hash) in pending {
            self.registry.try_reserve(story_id, &hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dashmap::DashSet;
    use serde_json::json;
    use std::sync::Mutex;

    use crate::domain::value_objects::StorySceneId;

    struct InMemorySceneRepo {
        scenes: Mutex<Vec<StoryScene>>,
    }

    #[async_trait]
    impl StorySceneRepositoryPort for InMemorySceneRepo {
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

        async fn get(&self, id: StorySceneId) -> Result<Option<StoryScene>, RepositoryError> {
            let scenes = self.scenes.lock().unwrap();
            Ok(scenes.iter().find(|s| s.id == id).cloned())
        }
    }

    struct InMemoryRegistry {
        building: DashSet<(PublishedStoryId, String)>,
    }

    impl ReservationRegistryPort for InMemoryRegistry {
        fn try_reserve(
            &self,
            published_story_id: PublishedStoryId,
            state_hash: &StateHash,
        ) -> ReservationOutcome {
            let key = (published_story_id, state_hash.as_str().to_string());
            if self.building.insert(key) {
                ReservationOutcome::Reserved
            } else {
                ReservationOutcome::AlreadyBuilding
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

    fn service() -> SceneCacheService {
        SceneCacheService::new(
            Arc::new(InMemorySceneRepo {
                scenes: Mutex::new(Vec::new()),
            }),
            Arc::new(InMemoryRegistry {
                building: DashSet::new(),
            }),
        )
    }

    #[tokio::test]
    async fn second_reserve_sees_building_not_a_second_reservation() {
        let svc = service();
        let story_id = PublishedStoryId::new();
        let hash = StateHash::from("abc".to_string());

        let first = svc.reserve_or_lookup(story_id, &hash).await.unwrap();
        assert!(matches!(first, SceneCacheOutcome::Reserved));

        let second = svc.reserve_or_lookup(story_id, &hash).await.unwrap();
        assert!(matches!(second, SceneCacheOutcome::Building));
    }

    #[tokio::test]
    async fn insert_then_reserve_is_a_cache_hit() {
        let svc = service();
        let story_id = PublishedStoryId::new();
        let hash = StateHash::from("abc".to_string());

        let scene = StoryScene::new(story_id, hash.clone(), json!({"text": "..."}));
        svc.insert(&scene).await.unwrap();

        let outcome = svc.reserve_or_lookup(story_id, &hash).await.unwrap();
        assert!(matches!(outcome, SceneCacheOutcome::Hit(_)));
    }

    #[tokio::test]
    async fn inserting_twice_is_first_writer_wins() {
        let svc = service();
        let story_id = PublishedStoryId::new();
        let hash = StateHash::from("abc".to_string());

        let first = StoryScene::new(story_id, hash.clone(), json!({"text": "first"}));
        let second = StoryScene::new(story_id, hash.clone(), json!({"text": "second"}));

        let persisted_first = svc.insert(&first).await.unwrap();
        let persisted_second = svc.insert(&second).await.unwrap();
        assert_eq!(persisted_first.id, persisted_second.id);
        assert_eq!(persisted_second.content_json, json!({"text": "first"}));
    }
}
