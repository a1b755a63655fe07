//! `lapin`-backed `BrokerPort` (§6), grounded on the pack's AMQP worker
//! (`connect` → `create_channel` → `queue_declare`/`exchange_declare`)
//! adapted from `async-std` to the tokio executor this workspace already
//! depends on via `tokio-executor-trait`/`tokio-reactor-trait`.

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind as LapinExchangeKind};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::application::errors::BrokerError;
use crate::application::ports::outbound::{Acker, BrokerPort, Consumer, Delivery, ExchangeKind, ExchangeSpec, QueueSpec};

pub struct AmqpBroker {
    channel: Channel,
}

impl AmqpBroker {
    pub async fn connect(amqp_url: &str) -> Result<Self, BrokerError> {
        let properties = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);

        let connection = Connection::connect(amqp_url, properties)
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        Ok(Self { channel })
    }
}

fn lapin_exchange_kind(kind: ExchangeKind) -> LapinExchangeKind {
    match kind {
        ExchangeKind::Direct => LapinExchangeKind::Direct,
        ExchangeKind::Topic => LapinExchangeKind::Topic,
        ExchangeKind::Fanout => LapinExchangeKind::Fanout,
    }
}

#[async_trait]
impl BrokerPort for AmqpBroker {
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BrokerError> {
        self.channel
            .exchange_declare(
                spec.name,
                lapin_exchange_kind(spec.kind),
                ExchangeDeclareOptions {
                    durable: spec.durable,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> Result<(), BrokerError> {
        let mut args = FieldTable::default();
        if let Some(dlx) = spec.dead_letter_exchange {
            args.insert("x-dead-letter-exchange".into(), dlx.into());
        }
        if spec.lazy {
            args.insert("x-queue-mode".into(), "lazy".into());
        }

        self.channel
            .queue_declare(
                spec.name,
                QueueDeclareOptions {
                    durable: spec.durable,
                    ..QueueDeclareOptions::default()
                },
                args,
            )
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        if let (Some(exchange), Some(routing_key)) = (spec.bind_exchange, spec.routing_key) {
            self.channel
                .queue_bind(
                    spec.name,
                    exchange,
                    routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| BrokerError::Connection(e.to_string()))?;
        }

        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        self.channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        prefetch: u16,
    ) -> Result<Box<dyn Consumer>, BrokerError> {
        self.channel
            .basic_qos(prefetch, lapin::options::BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        Ok(Box::new(AmqpConsumer { inner: consumer }))
    }
}

struct AmqpConsumer {
    inner: lapin::Consumer,
}

#[async_trait]
impl Consumer for AmqpConsumer {
    async fn next(&mut self) -> Option<Result<Delivery, BrokerError>> {
        let delivery = self.inner.next().await?;
        match delivery {
            Ok(delivery) => {
                let delivery_tag = delivery.delivery_tag;
                let data = delivery.data.clone();
                let acker = Arc::new(LapinAcker {
                    delivery: Mutex::new(Some(delivery)),
                });
                Some(Ok(Delivery::new(data, delivery_tag, acker)))
            }
            Err(e) => Some(Err(BrokerError::Consume(e.to_string()))),
        }
    }
}

struct LapinAcker {
    delivery: Mutex<Option<lapin::message::Delivery>>,
}

#[async_trait]
impl Acker for LapinAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        let guard = self.delivery.lock().await;
        match guard.as_ref() {
            Some(delivery) => delivery
                .acker
                .ack(BasicAckOptions::default())
                .await
                .map_err(|e| BrokerError::Ack(e.to_string())),
            None => Ok(()),
        }
    }

    async fn nack(&self, requeue: bool) -> Result<(), BrokerError> {
        let guard = self.delivery.lock().await;
        match guard.as_ref() {
            Some(delivery) => delivery
                .acker
                .nack(BasicNackOptions {
                    requeue,
                    ..BasicNackOptions::default()
                })
                .await
                .map_err(|e| BrokerError::Ack(e.to_string())),
            None => Ok(()),
        }
    }
}
