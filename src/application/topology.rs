//! Broker topology constants (§6): exchange/queue names shared by every
//! binary that declares or addresses them, so GW/NC/TD/STR/the DLQ
//! maintenance consumer agree on the same wire names.

use crate::application::ports::outbound::{ExchangeKind, ExchangeSpec, QueueSpec};

pub const GENERATION_TASKS_EXCHANGE: &str = "generation_tasks";
pub const GENERATION_TASKS_QUEUE: &str = "story_generation_tasks";
pub const GENERATION_TASKS_DLX: &str = "generation_tasks.dlx";
pub const GENERATION_TASKS_DLQ: &str = "story_generation_tasks.dlq";

pub const INTERNAL_UPDATES_EXCHANGE: &str = "internal_updates";
pub const INTERNAL_UPDATES_QUEUE: &str = "internal_updates";
pub const INTERNAL_UPDATES_DLX: &str = "internal_updates.dlx";
pub const INTERNAL_UPDATES_DLQ: &str = "internal_updates.dlq";

pub const CLIENT_UPDATES_EXCHANGE: &str = "client_updates";

pub const PUSH_NOTIFICATIONS_EXCHANGE: &str = "push_notifications";
pub const PUSH_NOTIFICATIONS_QUEUE: &str = "push_notifications_queue";

pub const IMAGE_GENERATOR_TASKS_EXCHANGE: &str = "image_generator_tasks";
pub const IMAGE_GENERATOR_TASKS_QUEUE: &str = "image_generator_tasks";
pub const IMAGE_GENERATOR_RESULTS_EXCHANGE: &str = "image_generator_results";
pub const IMAGE_GENERATOR_RESULTS_QUEUE: &str = "image_generator_results";

pub const CONFIG_UPDATE_EXCHANGE: &str = "config_update_exchange";
pub const PROMPTS_EXCHANGE: &str = "prompts_exchange";

/// Every durable exchange named in §6, declared at startup by whichever
/// binary owns the connection.
pub fn all_exchanges() -> Vec<ExchangeSpec> {
    vec![
        ExchangeSpec {
            name: GENERATION_TASKS_EXCHANGE,
            kind: ExchangeKind::Direct,
            durable: true,
        },
        ExchangeSpec {
            name: GENERATION_TASKS_DLX,
            kind: ExchangeKind::Direct,
            durable: true,
        },
        ExchangeSpec {
            name: INTERNAL_UPDATES_EXCHANGE,
            kind: ExchangeKind::Direct,
            durable: true,
        },
        ExchangeSpec {
            name: INTERNAL_UPDATES_DLX,
            kind: ExchangeKind::Direct,
            durable: true,
        },
        ExchangeSpec {
            name: CLIENT_UPDATES_EXCHANGE,
            kind: ExchangeKind::Topic,
            durable: true,
        },
        ExchangeSpec {
            name: PUSH_NOTIFICATIONS_EXCHANGE,
            kind: ExchangeKind::Direct,
            durable: true,
        },
        ExchangeSpec {
            name: IMAGE_GENERATOR_TASKS_EXCHANGE,
            kind: ExchangeKind::Direct,
            durable: true,
        },
        ExchangeSpec {
            name: IMAGE_GENERATOR_RESULTS_EXCHANGE,
            kind: ExchangeKind::Direct,
            durable: true,
        },
        ExchangeSpec {
            name: CONFIG_UPDATE_EXCHANGE,
            kind: ExchangeKind::Fanout,
            durable: true,
        },
        ExchangeSpec {
            name: PROMPTS_EXCHANGE,
            kind: ExchangeKind::Fanout,
            durable: true,
        },
    ]
}

/// Work queues declare a dead-letter exchange (§6); `lazy` follows §6's
/// "direct, single queue `story_generation_tasks` (durable, lazy)".
pub fn all_queues() -> Vec<QueueSpec> {
    vec![
        QueueSpec {
            name: GENERATION_TASKS_QUEUE,
            durable: true,
            lazy: true,
            dead_letter_exchange: Some(GENERATION_TASKS_DLX),
            bind_exchange: Some(GENERATION_TASKS_EXCHANGE),
            routing_key: Some(GENERATION_TASKS_QUEUE),
        },
        QueueSpec {
            name: GENERATION_TASKS_DLQ,
            durable: true,
            lazy: false,
            dead_letter_exchange: None,
            bind_exchange: Some(GENERATION_TASKS_DLX),
            routing_key: Some(GENERATION_TASKS_QUEUE),
        },
        QueueSpec {
            name: INTERNAL_UPDATES_QUEUE,
            durable: true,
            lazy: false,
            dead_letter_exchange: Some(INTERNAL_UPDATES_DLX),
            bind_exchange: Some(INTERNAL_UPDATES_EXCHANGE),
            routing_key: Some(INTERNAL_UPDATES_QUEUE),
        },
        QueueSpec {
            name: INTERNAL_UPDATES_DLQ,
            durable: true,
            lazy: false,
            dead_letter_exchange: None,
            bind_exchange: Some(INTERNAL_UPDATES_DLX),
            routing_key: Some(INTERNAL_UPDATES_QUEUE),
        },
        QueueSpec {
            name: PUSH_NOTIFICATIONS_QUEUE,
            durable: true,
            lazy: false,
            dead_letter_exchange: None,
            bind_exchange: Some(PUSH_NOTIFICATIONS_EXCHANGE),
            routing_key: Some(PUSH_NOTIFICATIONS_QUEUE),
        },
        QueueSpec {
            name: IMAGE_GENERATOR_TASKS_QUEUE,
            durable: true,
            lazy: false,
            dead_letter_exchange: None,
            bind_exchange: Some(IMAGE_GENERATOR_TASKS_EXCHANGE),
            routing_key: Some(IMAGE_GENERATOR_TASKS_QUEUE),
        },
        QueueSpec {
            name: IMAGE_GENERATOR_RESULTS_QUEUE,
            durable: true,
            lazy: false,
            dead_letter_exchange: None,
            bind_exchange: Some(IMAGE_GENERATOR_RESULTS_EXCHANGE),
            routing_key: Some(IMAGE_GENERATOR_RESULTS_QUEUE),
        },
    ]
}
