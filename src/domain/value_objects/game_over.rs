//! Game-over detection (§4.3 trigger `game_over_detected`, GLOSSARY
//! "Game over"): a terminal player status reached when a core stat crosses
//! a boundary configured in the story setup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One boundary rule from `PublishedStory.setup_json`: the game ends when
/// `stat_name`'s value goes at or below `min` or at or above `max`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameOverBoundary {
    pub stat_name: String,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

/// Emitted once a boundary fires; carried as `user_input` context into the
/// `novel_game_over_creator` task (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameOverReason {
    pub stat_name: String,
    pub value: i64,
    pub boundary: GameOverBoundary,
}

impl GameOverReason {
    pub fn describe(&self) -> String {
        format!(
            "{} reached {} (boundary min={:?}, max={:?})",
            self.stat_name, self.value, self.boundary.min, self.boundary.max
        )
    }
}

/// Checks `core_stats` against every configured boundary and returns the
/// first one that fires, or `None` if the player is still in bounds.
/// Boundaries are checked in the order given so a story with several
/// failing stats has a deterministic, reproducible reason.
pub fn detect_game_over(
    core_stats: &BTreeMap<String, i64>,
    boundaries: &[GameOverBoundary],
) -> Option<GameOverReason> {
    for boundary in boundaries {
        let Some(&value) = core_stats.get(&boundary.stat_name) else {
            continue;
        };
        let crosses_min = boundary.min.is_some_and(|min| value <= min);
        let crosses_max = boundary.max.is_some_and(|max| value >= max);
        if crosses_min || crosses_max {
            return Some(GameOverReason {
                stat_name: boundary.stat_name.clone(),
                value,
                boundary: boundary.clone(),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn fires_on_lower_boundary() {
        let boundaries = vec![GameOverBoundary {
            stat_name: "health".to_string(),
            min: Some(0),
            max: None,
        }];
        let reason = detect_game_over(&stats(&[("health", 0)]), &boundaries).unwrap();
        assert_eq!(reason.stat_name, "health");
    }

    #[test]
    fn does_not_fire_within_bounds() {
        let boundaries = vec![GameOverBoundary {
            stat_name: "health".to_string(),
            min: Some(0),
            max: Some(100),
        }];
        assert!(detect_game_over(&stats(&[("health", 50)]), &boundaries).is_none());
    }

    #[test]
    fn missing_stat_is_ignored() {
        let boundaries = vec![GameOverBoundary {
            stat_name: "sanity".to_string(),
            min: Some(0),
            max: None,
        }];
        assert!(detect_game_over(&stats(&[("health", 50)]), &boundaries).is_none());
    }
}
