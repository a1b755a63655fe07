pub mod generator_worker_service;
pub mod json_extract;
pub mod notification_consumer_service;
pub mod scene_cache_service;
pub mod stuck_task_reaper;
pub mod task_dispatcher;

pub use generator_worker_service::GeneratorWorkerService;
pub use notification_consumer_service::NotificationConsumerService;
pub use scene_cache_service::{SceneCacheOutcome, SceneCacheService};
pub use stuck_task_reaper::{ReaperReport, StuckTaskReaper};
pub use task_dispatcher::TaskDispatcher;
