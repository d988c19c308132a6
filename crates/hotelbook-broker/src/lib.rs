//! Hotelbook Broker — durable booking-event messaging.
//!
//! - [`topology`]: exchange/queue naming, TTLs, dead-letter wiring, prefetch.
//! - [`broker`]: the `MessageBroker` port and the `Delivery` handle.
//! - [`amqp`]: RabbitMQ implementation over a single connection and channel.
//! - [`in_memory`]: in-process implementation with the same topology rules.
//! - [`consumer`]: per-queue consume loop applying the retry/dead-letter policy.
//! - [`publisher`]: typed facade used by producing services.

pub mod amqp;
pub mod broker;
pub mod consumer;
pub mod error;
pub mod in_memory;
pub mod publisher;
pub mod retry;
pub mod topology;

pub use amqp::AmqpBroker;
pub use broker::{Delivery, DeliveryMetadata, DeliveryStream, MessageBroker, PublishOptions};
pub use consumer::{ConsumerRuntime, EventHandler, HandlerError, Outcome};
pub use error::BrokerError;
pub use in_memory::InMemoryBroker;
pub use publisher::BookingEventPublisher;
pub use retry::{Disposition, RetryPolicy};
pub use topology::{QueueOptions, QueueSpec};
