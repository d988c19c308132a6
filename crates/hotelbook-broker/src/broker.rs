//! Message broker port.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::BrokerError;
use crate::topology::QueueOptions;

/// Per-publish metadata. Every published message is persistent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Message id; the broker generates one when absent.
    pub message_id: Option<String>,
    /// Event type tag, carried as the message type property.
    pub message_type: Option<String>,
    /// Initial value of the retry counter header.
    pub retry_count: u32,
}

/// Transport metadata of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryMetadata {
    /// Queue the message was consumed from.
    pub queue: String,
    /// Routing key the message was published with.
    pub routing_key: String,
    /// Message id stamped at publish time.
    pub message_id: Option<String>,
    /// Message type property.
    pub message_type: Option<String>,
    /// Value of the retry counter header, 0 when absent.
    pub retry_count: u32,
    /// Whether the transport flagged this as a redelivery.
    pub redelivered: bool,
}

/// Settlement operations of one delivery, supplied by the broker
/// implementation.
#[async_trait]
pub trait Acker: Send + Sync {
    /// Remove the message from its queue.
    async fn ack(&self) -> Result<(), BrokerError>;

    /// Redeliver the message to its queue with the retry counter set to
    /// `next_retry_count`. If that fails, the original is requeued as-is
    /// so it does not hold a prefetch slot.
    async fn retry(
        &self,
        payload: &[u8],
        metadata: &DeliveryMetadata,
        next_retry_count: u32,
    ) -> Result<(), BrokerError>;

    /// Reject the message without requeue, handing it to the queue's
    /// dead-letter wiring.
    async fn dead_letter(&self) -> Result<(), BrokerError>;
}

/// A message handed to a consumer, settled exactly once.
pub struct Delivery {
    metadata: DeliveryMetadata,
    payload: Vec<u8>,
    acker: Box<dyn Acker>,
}

impl Delivery {
    /// Assembles a delivery.
    #[must_use]
    pub fn new(metadata: DeliveryMetadata, payload: Vec<u8>, acker: Box<dyn Acker>) -> Self {
        Self {
            metadata,
            payload,
            acker,
        }
    }

    /// Transport metadata.
    #[must_use]
    pub fn metadata(&self) -> &DeliveryMetadata {
        &self.metadata
    }

    /// Raw message body.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Acknowledge the delivery.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError` if the transport rejects the acknowledgement.
    pub async fn ack(self) -> Result<(), BrokerError> {
        self.acker.ack().await
    }

    /// Redeliver with an incremented retry counter.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError` if the redelivery could not be arranged. The
    /// original is then requeued unchanged, keeping its current retry
    /// counter.
    pub async fn retry(self, next_retry_count: u32) -> Result<(), BrokerError> {
        self.acker
            .retry(&self.payload, &self.metadata, next_retry_count)
            .await
    }

    /// Reject without requeue.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError` if the transport rejects the negative
    /// acknowledgement.
    pub async fn dead_letter(self) -> Result<(), BrokerError> {
        self.acker.dead_letter().await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("metadata", &self.metadata)
            .field("payload_len", &self.payload.len())
            .finish_non_exhaustive()
    }
}

/// Deliveries of one queue, in order. Ends when the broker is closed, the
/// connection is lost or the broker cancels the consumer.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, BrokerError>>;

/// A durable message broker: topology provisioning plus publish and consume
/// primitives over one process-wide connection.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Declare a durable queue. With dead-lettering requested, the paired
    /// dead-letter queue is declared and bound first.
    async fn declare_queue(&self, name: &str, options: &QueueOptions) -> Result<(), BrokerError>;

    /// Bind `queue` to `exchange` under `routing_key`. Idempotent.
    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError>;

    /// Publish a persistent message. Returns only once the transport has
    /// accepted it; any other outcome is `BrokerError::Publish` and the
    /// caller must not assume delivery.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        options: PublishOptions,
    ) -> Result<(), BrokerError>;

    /// Start consuming `queue`, holding at most `prefetch` unsettled
    /// deliveries.
    async fn consume(&self, queue: &str, prefetch: u16) -> Result<DeliveryStream, BrokerError>;

    /// Release the channel, then the connection. Idempotent.
    async fn close(&self) -> Result<(), BrokerError>;

    /// True only while both connection and channel are live.
    async fn is_connected(&self) -> bool;

    /// True once `close` has been called. A severed connection is
    /// disconnected but not closed.
    async fn is_closed(&self) -> bool;
}
