//! In-process `BrokerPort` double used by tests and, per DESIGN.md, as the
//! role the teacher's `InMemoryQueue` plays for the sibling workspace: a
//! topology-aware fake so services can be exercised without a running
//! broker.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use crate::application::errors::BrokerError;
use crate::application::ports::outbound::{Acker, BrokerPort, Consumer, Delivery, ExchangeKind, ExchangeSpec, QueueSpec};

struct QueueState {
    spec: QueueSpec,
    sender: mpsc::UnboundedSender<Vec<u8>>,
    receiver: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
}

#[derive(Default)]
struct Topology {
    exchanges: HashMap<String, ExchangeSpec>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<(String, String, String)>,
}

/// Single-process broker double. Routing mirrors AMQP direct/fanout/topic
/// semantics closely enough for the dispatch paths this crate exercises:
/// every queue bound to an exchange with a matching routing key receives a
/// copy of the published payload.
pub struct InMemoryBroker {
    topology: Mutex<Topology>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            topology: Mutex::new(Topology::default()),
        }
    }
}

#[async_trait]
impl BrokerPort for InMemoryBroker {
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BrokerError> {
        let mut topology = self.topology.lock().await;
        topology.exchanges.insert(spec.name.to_string(), spec.clone());
        Ok(())
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> Result<(), BrokerError> {
        let mut topology = self.topology.lock().await;
        let (sender, receiver) = mpsc::unbounded_channel();
        topology.queues.insert(
            spec.name.to_string(),
            QueueState {
                spec: spec.clone(),
                sender,
                receiver: Some(receiver),
            },
        );
        if let (Some(exchange), Some(routing_key)) = (spec.bind_exchange, spec.routing_key) {
            topology
                .bindings
                .push((exchange.to_string(), routing_key.to_string(), spec.name.to_string()));
        }
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        let topology = self.topology.lock().await;
        let kind = topology
            .exchanges
            .get(exchange)
            .map(|spec| spec.kind)
            .unwrap_or(ExchangeKind::Direct);

        for (bound_exchange, bound_key, queue_name) in &topology.bindings {
            if bound_exchange != exchange {
                continue;
            }
            let matches = match kind {
                ExchangeKind::Fanout => true,
                ExchangeKind::Direct | ExchangeKind::Topic => bound_key == routing_key,
            };
            if !matches {
                continue;
            }
            if let Some(queue) = topology.queues.get(queue_name) {
                let _ = queue.sender.send(payload.to_vec());
            }
        }
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        _consumer_tag: &str,
        _prefetch: u16,
    ) -> Result<Box<dyn Consumer>, BrokerError> {
        let mut topology = self.topology.lock().await;
        let state = topology
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::Consume(format!("unknown queue: {queue}")))?;
        let receiver = state
            .receiver
            .take()
            .ok_or_else(|| BrokerError::Consume(format!("queue {queue} already has a consumer")))?;
        let _ = &state.spec;
        Ok(Box::new(InMemoryConsumer { receiver }))
    }
}

struct InMemoryConsumer {
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
}

#[async_trait]
impl Consumer for InMemoryConsumer {
    async fn next(&mut self) -> Option<Result<Delivery, BrokerError>> {
        let data = self.receiver.recv().await?;
        Some(Ok(Delivery::new(data, 0, Arc::new(NoopAcker))))
    }
}

struct NoopAcker;

#[async_trait]
impl Acker for NoopAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn nack(&self, _requeue: bool) -> Result<(), BrokerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::topology;

    #[tokio::test]
    async fn publish_routes_to_bound_queue() {
        let broker = InMemoryBroker::new();
        let exchange = ExchangeSpec {
            name: "internal_updates",
            kind: ExchangeKind::Direct,
            durable: true,
        };
        let queue = QueueSpec {
            name: topology::INTERNAL_UPDATES_QUEUE,
            durable: true,
            lazy: false,
            dead_letter_exchange: None,
            bind_exchange: Some("internal_updates"),
            routing_key: Some(topology::INTERNAL_UPDATES_QUEUE),
        };

        broker.declare_exchange(&exchange).await.unwrap();
        broker.declare_queue(&queue).await.unwrap();

        broker
            .publish("internal_updates", topology::INTERNAL_UPDATES_QUEUE, b"hello")
            .await
            .unwrap();

        let mut consumer = broker
            .consume(topology::INTERNAL_UPDATES_QUEUE, "test-consumer", 1)
            .await
            .unwrap();
        let delivery = consumer.next().await.unwrap().unwrap();
        assert_eq!(delivery.data, b"hello");
        delivery.ack().await.unwrap();
    }
}
