//! `PlayerProgress` — the evolving player state a scene is generated
//! against (§3). Keyed per `(user_id, published_story_id)` (DESIGN.md
//! Open Question decision #2), upserted after each applied choice.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::value_objects::{PlayerProgressId, PublishedStoryId, StateHash, UserId};

/// One applied choice, appended to `choice_history` in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserChoice {
    pub choice_index: u32,
    pub choice_text: String,
    pub applied_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct PlayerProgress {
    pub id: PlayerProgressId,
    pub user_id: UserId,
    pub published_story_id: PublishedStoryId,
    pub core_stats: BTreeMap<String, i64>,
    pub global_flags: BTreeSet<String>,
    pub story_variables: Value,
    pub state_hash: StateHash,
    pub choice_history: Vec<UserChoice>,
}

impl PlayerProgress {
    pub fn new(
        user_id: UserId,
        published_story_id: PublishedStoryId,
        initial_stats: BTreeMap<String, i64>,
    ) -> Self {
        let state_hash =
            StateHash::compute(&initial_stats, &[], &Value::Object(Default::default()), None);
        Self {
            id: PlayerProgressId::new(),
            user_id,
            published_story_id,
            core_stats: initial_stats,
            global_flags: BTreeSet::new(),
            story_variables: Value::Object(Default::default()),
            state_hash,
            choice_history: Vec::new(),
        }
    }

    pub fn last_choice_index(&self) -> Option<u32> {
        self.choice_history.last().map(|c| c.choice_index)
    }

    /// Applies a choice's stat deltas and flags, appends to
    /// `choice_history`, and recomputes `state_hash` — the TD trigger
    /// `player_choice` consults the resulting hash against the Scene Cache
    /// (§4.3, §4.4).
    pub fn apply_choice(
        &mut self,
        choice_text: impl Into<String>,
        stat_deltas: &BTreeMap<String, i64>,
        new_flags: &[String],
    ) {
        for (stat, delta) in stat_deltas {
            *self.core_stats.entry(stat.clone()).or_insert(0) += delta;
        }
        for flag in new_flags {
            self.global_flags.insert(flag.clone());
        }

        let next_index = self.choice_history.len() as u32;
        self.choice_history.push(UserChoice {
            choice_index: next_index,
            choice_text: choice_text.into(),
            applied_at: chrono::Utc::now(),
        });

        self.recompute_state_hash();
    }

    fn recompute_state_hash(&mut self) {
        let flags: Vec<String> = self.global_flags.iter().cloned().collect();
        self.state_hash = StateHash::compute(
            &self.core_stats,
            &flags,
            &self.story_variables,
            self.last_choice_index(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn applying_a_choice_updates_stats_and_hash() {
        let mut progress =
            PlayerProgress::new(UserId::new(), PublishedStoryId::new(), stats(&[("health", 10)]));
        let before = progress.state_hash.clone();
        progress.apply_choice("fight the wolf", &stats(&[("health", -3)]), &["met_wolf".into()]);
        assert_eq!(progress.core_stats["health"], 7);
        assert!(progress.global_flags.contains("met_wolf"));
        assert_eq!(progress.last_choice_index(), Some(0));
        assert_ne!(progress.state_hash, before);
    }

    #[test]
    fn choice_index_increments_per_applied_choice() {
        let mut progress =
            PlayerProgress::new(UserId::new(), PublishedStoryId::new(), stats(&[]));
        progress.apply_choice("a", &BTreeMap::new(), &[]);
        progress.apply_choice("b", &BTreeMap::new(), &[]);
        assert_eq!(progress.last_choice_index(), Some(1));
        assert_eq!(progress.choice_history.len(), 2);
    }
}
