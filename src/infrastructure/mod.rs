//! Adapters implementing the application's outbound ports (SPEC_FULL §0):
//! Postgres persistence, the AMQP broker (plus an in-memory double), the
//! LLM HTTP client, the filesystem prompt loader, config, metrics, the
//! scene-reservation registry, and the DLQ maintenance consumer.

pub mod broker;
pub mod config;
pub mod dlq_maintenance;
pub mod health;
pub mod llm;
pub mod metrics;
pub mod persistence;
pub mod scene_reservation_registry;
