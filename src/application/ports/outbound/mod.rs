//! Outbound ports — interfaces the application requires from external
//! systems (broker, Postgres, LLM endpoint, prompt files), per §9
//! "interfaces over concrete types".

mod broker_port;
mod llm_port;
mod prompt_template_port;
mod repository_port;
mod reservation_registry_port;

pub use broker_port::{
    Acker, BrokerPort, Consumer, Delivery, ExchangeKind, ExchangeSpec, QueueSpec,
};

pub use llm_port::{AiClient, GenerationOutcome, GenerationParams, TokenUsage};

pub use prompt_template_port::{substitute_user_input, PromptTemplatePort};

pub use reservation_registry_port::{ReservationOutcome, ReservationRegistryPort};

pub use repository_port::{
    DeviceTokenRepositoryPort, GenerationResultRepositoryPort, ImageReferenceRepositoryPort,
    PlayerGameStateRepositoryPort, PlayerProgressRepositoryPort, PublishedStoryRepositoryPort,
    StoryConfigRepositoryPort, StorySceneRepositoryPort,
};
