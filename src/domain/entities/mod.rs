pub mod device_token;
pub mod generation_result;
pub mod image_reference;
pub mod player_game_state;
pub mod player_progress;
pub mod published_story;
pub mod story_config;
pub mod story_scene;

pub use device_token::{DeviceToken, Platform};
pub use generation_result::GenerationResult;
pub use image_reference::ImageReference;
pub use player_game_state::PlayerGameState;
pub use player_progress::{PlayerProgress, UserChoice};
pub use published_story::PublishedStory;
pub use story_config::StoryConfig;
pub use story_scene::StoryScene;
