//! In-memory scene-build reservation registry port (§4.4, §9: "the only
//! in-memory shared structure is the scene-reservation registry; it is a
//! latency optimisation, not ground truth, and must be reconstructible
//! from DB on restart"). Synchronous — the registry never performs I/O —
//! so it stays a plain `Send + Sync` trait rather than `async_trait`.

use crate::domain::value_objects::{PublishedStoryId, StateHash};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationOutcome {
    Reserved,
    AlreadyBuilding,
}

pub trait ReservationRegistryPort: Send + Sync {
    /// Claims `(story_id, state_hash)` for an in-flight build if nothing
    /// else holds it; returns whether this caller now owns the build.
    fn try_reserve(
        &self,
        published_story_id: PublishedStoryId,
        state_hash: &StateHash,
    ) -> ReservationOutcome;

    /// Releases a reservation once the build completes (successfully or
    /// not) so a future request can retry.
    fn release(&self, published_story_id: PublishedStoryId, state_hash: &StateHash);

    fn is_reserved(&self, published_story_id: PublishedStoryId, state_hash: &StateHash) -> bool;
}
