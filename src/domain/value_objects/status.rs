//! Closed status enumerations for the three aggregates whose lifecycle
//! drives the generation pipeline (§3, §9: "tagged statuses... reject
//! unknown values at the persistence boundary").

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown status value: {0}")]
pub struct UnknownStatus(pub String);

/// `StoryConfig.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryConfigStatus {
    Pending,
    Generating,
    Ready,
    Error,
}

impl StoryConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    pub fn is_generating(&self) -> bool {
        matches!(self, Self::Generating)
    }
}

impl std::str::FromStr for StoryConfigStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "generating" => Ok(Self::Generating),
            "ready" => Ok(Self::Ready),
            "error" => Ok(Self::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// `PublishedStory.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishedStoryStatus {
    SetupGenerating,
    SetupReady,
    FirstSceneGenerating,
    Ready,
    Error,
}

impl PublishedStoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetupGenerating => "setup_generating",
            Self::SetupReady => "setup_ready",
            Self::FirstSceneGenerating => "first_scene_generating",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// §3 invariant: `status ∈ {setup_generating, first_scene_generating}`
    /// excludes the terminal states.
    pub fn is_generating(&self) -> bool {
        matches!(self, Self::SetupGenerating | Self::FirstSceneGenerating)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }
}

impl std::str::FromStr for PublishedStoryStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "setup_generating" => Ok(Self::SetupGenerating),
            "setup_ready" => Ok(Self::SetupReady),
            "first_scene_generating" => Ok(Self::FirstSceneGenerating),
            "ready" => Ok(Self::Ready),
            "error" => Ok(Self::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// `PlayerGameState.player_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Playing,
    GeneratingScene,
    GameOverPending,
    Completed,
    Error,
}

impl PlayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playing => "playing",
            Self::GeneratingScene => "generating_scene",
            Self::GameOverPending => "game_over_pending",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_generating(&self) -> bool {
        matches!(self, Self::GeneratingScene | Self::GameOverPending)
    }
}

impl std::str::FromStr for PlayerStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "playing" => Ok(Self::Playing),
            "generating_scene" => Ok(Self::GeneratingScene),
            "game_over_pending" => Ok(Self::GameOverPending),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trips_through_as_str() {
        for s in [
            StoryConfigStatus::Pending,
            StoryConfigStatus::Generating,
            StoryConfigStatus::Ready,
            StoryConfigStatus::Error,
        ] {
            assert_eq!(StoryConfigStatus::from_str(s.as_str()).unwrap(), s);
        }
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(PublishedStoryStatus::from_str("not_a_status").is_err());
    }

    #[test]
    fn published_story_generating_excludes_terminal() {
        assert!(PublishedStoryStatus::SetupGenerating.is_generating());
        assert!(!PublishedStoryStatus::Ready.is_generating());
        assert!(PublishedStoryStatus::Ready.is_terminal());
    }
}
