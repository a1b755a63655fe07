//! Message broker port (§6): an AMQP-style topology abstracted behind a
//! trait so GW/NC/STR/TD can be tested against an in-memory double instead
//! of a running broker (§9 "interfaces over concrete types").

use async_trait::async_trait;
use std::sync::Arc;

use crate::application::errors::BrokerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Direct,
    Topic,
    Fanout,
}

/// Declares one durable exchange (§6 lists `generation_tasks`,
/// `internal_updates`, `client_updates`, `push_notifications`,
/// `image_generator_tasks`/`_results`, `config_update_exchange`,
/// `prompts_exchange`).
#[derive(Debug, Clone)]
pub struct ExchangeSpec {
    pub name: &'static str,
    pub kind: ExchangeKind,
    pub durable: bool,
}

/// Declares one queue, optionally bound to an exchange by routing key, and
/// optionally pointed at a dead-letter exchange (§6 "all work queues
/// declare a dead-letter exchange").
#[derive(Debug, Clone)]
pub struct QueueSpec {
    pub name: &'static str,
    pub durable: bool,
    pub lazy: bool,
    pub dead_letter_exchange: Option<&'static str>,
    pub bind_exchange: Option<&'static str>,
    pub routing_key: Option<&'static str>,
}

/// An (un)acknowledgement sink for one delivery, erased behind a trait
/// object so `Delivery` itself stays a plain, object-safe struct.
#[async_trait]
pub trait Acker: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;
    async fn nack(&self, requeue: bool) -> Result<(), BrokerError>;
}

/// One message handed to a consumer. GW and NC must call exactly one of
/// `ack`/`nack` per delivery (§4.1 "ack... only after both the DB write
/// and the notification publish succeed").
pub struct Delivery {
    pub data: Vec<u8>,
    pub delivery_tag: u64,
    pub(crate) acker: Arc<dyn Acker>,
}

impl Delivery {
    pub fn new(data: Vec<u8>, delivery_tag: u64, acker: Arc<dyn Acker>) -> Self {
        Self {
            data,
            delivery_tag,
            acker,
        }
    }

    pub async fn ack(&self) -> Result<(), BrokerError> {
        self.acker.ack().await
    }

    pub async fn nack(&self, requeue: bool) -> Result<(), BrokerError> {
        self.acker.nack(requeue).await
    }
}

/// A bound consumer handle that yields deliveries one at a time. Prefetch
/// is set by the implementation at `consume()` time (§4.1, §4.2: prefetch
/// = 1 throughout).
#[async_trait]
pub trait Consumer: Send {
    async fn next(&mut self) -> Option<Result<Delivery, BrokerError>>;
}

#[async_trait]
pub trait BrokerPort: Send + Sync {
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BrokerError>;
    async fn declare_queue(&self, spec: &QueueSpec) -> Result<(), BrokerError>;

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError>;

    /// `prefetch` sets the broker's QoS for the returned consumer (§4.1,
    /// §4.2: prefetch = 1).
    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        prefetch: u16,
    ) -> Result<Box<dyn Consumer>, BrokerError>;
}
