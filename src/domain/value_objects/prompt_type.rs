//! `PromptType` — the closed set of generation kinds routed by name
//! through the broker and dispatched on by the Notification Consumer
//! (§4.2's dispatch table).

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown prompt type: {0}")]
pub struct UnknownPromptType(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    Narrator,
    NarratorReviser,
    NovelSetup,
    NovelFirstSceneCreator,
    NovelCreator,
    NovelGameOverCreator,
    CharacterImage,
    StoryPreviewImage,
}

impl PromptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Narrator => "narrator",
            Self::NarratorReviser => "narrator_reviser",
            Self::NovelSetup => "novel_setup",
            Self::NovelFirstSceneCreator => "novel_first_scene_creator",
            Self::NovelCreator => "novel_creator",
            Self::NovelGameOverCreator => "novel_game_over_creator",
            Self::CharacterImage => "character_image",
            Self::StoryPreviewImage => "story_preview_image",
        }
    }

    /// Filename of the prompt template this type loads, relative to the
    /// configured prompts directory (§6 "Prompts directory path").
    pub fn template_file(&self) -> String {
        format!("{}.md", self.as_str())
    }

    /// Whether this prompt type's generation result is consumed by an
    /// image-reference flow rather than a text/JSON aggregate mutation.
    pub fn is_image_kind(&self) -> bool {
        matches!(self, Self::CharacterImage | Self::StoryPreviewImage)
    }
}

impl std::str::FromStr for PromptType {
    type Err = UnknownPromptType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "narrator" => Ok(Self::Narrator),
            "narrator_reviser" => Ok(Self::NarratorReviser),
            "novel_setup" => Ok(Self::NovelSetup),
            "novel_first_scene_creator" => Ok(Self::NovelFirstSceneCreator),
            "novel_creator" => Ok(Self::NovelCreator),
            "novel_game_over_creator" => Ok(Self::NovelGameOverCreator),
            "character_image" => Ok(Self::CharacterImage),
            "story_preview_image" => Ok(Self::StoryPreviewImage),
            other => Err(UnknownPromptType(other.to_string())),
        }
    }
}

impl std::fmt::Display for PromptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trips_every_variant() {
        for pt in [
            PromptType::Narrator,
            PromptType::NarratorReviser,
            PromptType::NovelSetup,
            PromptType::NovelFirstSceneCreator,
            PromptType::NovelCreator,
            PromptType::NovelGameOverCreator,
            PromptType::CharacterImage,
            PromptType::StoryPreviewImage,
        ] {
            assert_eq!(PromptType::from_str(pt.as_str()).unwrap(), pt);
        }
    }

    #[test]
    fn template_file_matches_as_str() {
        assert_eq!(PromptType::NovelSetup.template_file(), "novel_setup.md");
    }

    #[test]
    fn image_kinds_are_flagged() {
        assert!(PromptType::CharacterImage.is_image_kind());
        assert!(!PromptType::NovelCreator.is_image_kind());
    }
}
