//! In-memory scene-build reservation registry (§4.4, §9), grounded on
//! `dashmap` usage in the sibling workspace's `engine-adapters` crate for
//! concurrent in-memory state shared across the async runtime.

use dashmap::DashSet;

use crate::application::ports::outbound::{ReservationOutcome, ReservationRegistryPort};
use crate::domain::value_objects::{PublishedStoryId, StateHash};

#[derive(Default)]
pub struct DashMapReservationRegistry {
    building: DashSet<(PublishedStoryId, String)>,
}

impl DashMapReservationRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReservationRegistryPort for DashMapReservationRegistry {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservation_round_trips() {
        let registry = DashMapReservationRegistry::new();
        let story_id = PublishedStoryId::new();
        let hash = StateHash::from("abc".to_string());

        assert_eq!(registry.try_reserve(story_id, &hash), ReservationOutcome::Reserved);
        assert_eq!(
            registry.try_reserve(story_id, &hash),
            ReservationOutcome::AlreadyBuilding
        );
        assert!(registry.is_reserved(story_id, &hash));

        registry.release(story_id, &hash);
        assert!(!registry.is_reserved(story_id, &hash));
    }
}
