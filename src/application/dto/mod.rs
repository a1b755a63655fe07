pub mod payloads;

pub use payloads::{
    CharacterImageResultPayload, CharacterImageTaskPayload, ClientUpdate, ConfigUpdatePayload,
    GenerationTaskPayload, NotificationPayload, NotificationStatus, PromptEvent, PromptEventType,
    PushNotificationEvent,
};
