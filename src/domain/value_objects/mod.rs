pub mod game_over;
pub mod ids;
pub mod prompt_type;
pub mod state_hash;
pub mod status;

pub use game_over::{detect_game_over, GameOverBoundary, GameOverReason};
pub use ids::{
    DeviceTokenId, PlayerGameStateId, PlayerProgressId, PublishedStoryId, StoryConfigId,
    StorySceneId, TaskId, UserId,
};
pub use prompt_type::PromptType;
pub use state_hash::StateHash;
pub use status::{PlayerStatus, PublishedStoryStatus, StoryConfigStatus};
