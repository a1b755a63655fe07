pub mod amqp_broker;
pub mod in_memory_broker;

pub use amqp_broker::AmqpBroker;
pub use in_memory_broker::InMemoryBroker;
