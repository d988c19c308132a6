//! Consumer runtime: provisions one queue, drains it one message at a time
//! and settles every delivery as ack, retry or dead-letter.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use hotelbook_core::event::EventEnvelope;
use tracing::{error, info, warn};

use crate::broker::{Delivery, MessageBroker};
use crate::error::BrokerError;
use crate::retry::{Disposition, RetryPolicy};
use crate::topology::QueueSpec;

/// Failure reported by an [`EventHandler`].
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Possibly transient; the delivery is retried within the retry budget.
    #[error("handler failed: {0}")]
    Failed(String),

    /// Retrying cannot help; the delivery is dead-lettered immediately.
    #[error("handler failed permanently: {0}")]
    Permanent(String),
}

/// Application callback invoked once per decoded delivery.
///
/// Handlers must be idempotent: the same event may arrive more than once.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles one event.
    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerError>;
}

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handled and acknowledged.
    Acked,
    /// Redelivered to the queue carrying retry counter `attempt`.
    Retried {
        /// Retry counter of the redelivered copy.
        attempt: u32,
    },
    /// Rejected into the dead-letter queue.
    DeadLettered,
}

/// Runs an [`EventHandler`] against one queue.
pub struct ConsumerRuntime {
    broker: Arc<dyn MessageBroker>,
    spec: QueueSpec,
    policy: RetryPolicy,
    handler: Arc<dyn EventHandler>,
}

impl ConsumerRuntime {
    /// Creates a runtime with the default retry budget.
    #[must_use]
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        spec: QueueSpec,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            broker,
            spec,
            policy: RetryPolicy::default(),
            handler,
        }
    }

    /// Overrides the retry budget.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The queue this runtime drains.
    #[must_use]
    pub fn spec(&self) -> &QueueSpec {
        &self.spec
    }

    /// Declares the queue with its dead-letter pair and binds it under every
    /// routing key. Safe to repeat.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Topology` if declaration or binding fails.
    pub async fn provision(&self) -> Result<(), BrokerError> {
        self.broker
            .declare_queue(&self.spec.name, &self.spec.options)
            .await?;
        for routing_key in &self.spec.routing_keys {
            self.broker
                .bind_queue(&self.spec.name, &self.spec.exchange, routing_key)
                .await?;
        }
        Ok(())
    }

    /// Provisions the queue, then consumes until the broker is closed.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError` if provisioning fails or the delivery stream
    /// breaks. A stream that ends without `close` is an error too:
    /// `BrokerError::Connection` when the connection was lost,
    /// `BrokerError::Consume` when the broker cancelled the consumer.
    pub async fn run(&self) -> Result<(), BrokerError> {
        self.provision().await?;

        let mut deliveries = self
            .broker
            .consume(&self.spec.name, self.spec.prefetch)
            .await?;

        info!(
            queue = %self.spec.name,
            prefetch = self.spec.prefetch,
            max_retries = self.policy.max_retries(),
            "consumer started"
        );

        while let Some(delivery) = deliveries.next().await {
            let delivery = delivery?;
            if let Err(e) = self.process(delivery).await {
                warn!(queue = %self.spec.name, error = %e, "failed to settle delivery");
            }
        }

        if self.broker.is_closed().await {
            info!(queue = %self.spec.name, "consumer stopped");
            return Ok(());
        }
        if !self.broker.is_connected().await {
            error!(queue = %self.spec.name, "broker connection lost");
            return Err(BrokerError::Connection(format!(
                "connection lost while consuming {}",
                self.spec.name
            )));
        }
        error!(queue = %self.spec.name, "consumer cancelled by the broker");
        Err(BrokerError::Consume(format!(
            "consumer of {} was cancelled by the broker",
            self.spec.name
        )))
    }

    /// Decodes, handles and settles one delivery.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError` if the settlement itself fails; the transport
    /// then redelivers the message.
    pub async fn process(&self, delivery: Delivery) -> Result<Outcome, BrokerError> {
        let metadata = delivery.metadata().clone();

        let envelope = match EventEnvelope::from_slice(delivery.payload()) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(
                    queue = %metadata.queue,
                    message_id = ?metadata.message_id,
                    error = %e,
                    "undecodable message, dead-lettering"
                );
                delivery.dead_letter().await?;
                return Ok(Outcome::DeadLettered);
            }
        };

        let result = self.handler.handle(&envelope).await;

        match result {
            Ok(()) => {
                delivery.ack().await?;
                info!(
                    queue = %metadata.queue,
                    event_id = %envelope.id,
                    event_type = envelope.event_type(),
                    "event handled"
                );
                Ok(Outcome::Acked)
            }
            Err(HandlerError::Permanent(reason)) => {
                error!(
                    queue = %metadata.queue,
                    event_id = %envelope.id,
                    reason = %reason,
                    "permanent handler failure, dead-lettering"
                );
                delivery.dead_letter().await?;
                Ok(Outcome::DeadLettered)
            }
            Err(HandlerError::Failed(reason)) => match self.policy.decide(metadata.retry_count) {
                Disposition::Retry { next_retry_count } => {
                    warn!(
                        queue = %metadata.queue,
                        event_id = %envelope.id,
                        retry_count = metadata.retry_count,
                        next_retry_count,
                        reason = %reason,
                        "handler failed, retrying"
                    );
                    delivery.retry(next_retry_count).await?;
                    Ok(Outcome::Retried {
                        attempt: next_retry_count,
                    })
                }
                Disposition::DeadLetter => {
                    error!(
                        queue = %metadata.queue,
                        event_id = %envelope.id,
                        retry_count = metadata.retry_count,
                        reason = %reason,
                        "retries exhausted, dead-lettering"
                    );
                    delivery.dead_letter().await?;
                    Ok(Outcome::DeadLettered)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use chrono::{NaiveDate, Utc};
    use hotelbook_core::event::{BookingCreated, DomainEvent};
    use uuid::Uuid;

    use super::*;
    use crate::broker::{DeliveryStream, PublishOptions};
    use crate::in_memory::InMemoryBroker;
    use crate::topology::{DOMAIN_EVENTS_EXCHANGE, QueueOptions};

    /// A broker whose delivery stream ends at once without `close`.
    struct EndedStreamBroker {
        connected: bool,
    }

    #[async_trait]
    impl MessageBroker for EndedStreamBroker {
        async fn declare_queue(&self, _name: &str, _options: &QueueOptions) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn bind_queue(
            &self,
            _queue: &str,
            _exchange: &str,
            _routing_key: &str,
        ) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn publish(
            &self,
            _exchange: &str,
            _routing_key: &str,
            _payload: &[u8],
            _options: PublishOptions,
        ) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn consume(&self, _queue: &str, _prefetch: u16) -> Result<DeliveryStream, BrokerError> {
            Ok(futures::stream::empty::<Result<Delivery, BrokerError>>().boxed())
        }

        async fn close(&self) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn is_connected(&self) -> bool {
            self.connected
        }

        async fn is_closed(&self) -> bool {
            false
        }
    }

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyHandler {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyHandler {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventHandler for FlakyHandler {
        async fn handle(&self, _envelope: &EventEnvelope) -> Result<(), HandlerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(HandlerError::Failed(format!("failure {}", call + 1)))
            } else {
                Ok(())
            }
        }
    }

    struct PermanentFailure;

    #[async_trait]
    impl EventHandler for PermanentFailure {
        async fn handle(&self, _envelope: &EventEnvelope) -> Result<(), HandlerError> {
            Err(HandlerError::Permanent("malformed booking".into()))
        }
    }

    fn envelope() -> EventEnvelope {
        EventEnvelope::new(
            Uuid::new_v4(),
            Utc::now(),
            DomainEvent::BookingCreated(BookingCreated {
                booking_id: Uuid::new_v4(),
                user_id: "U1".into(),
                hotel_id: "H1".into(),
                user_email: "guest@example.com".into(),
                hotel_name: "Galle Face".into(),
                hotel_city: "Colombo".into(),
                hotel_country: "Sri Lanka".into(),
                check_in: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                check_out: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
                adult_count: 2,
                child_count: 0,
                total_cost: 30_000.0,
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
            }),
        )
    }

    async fn publish(broker: &InMemoryBroker, payload: &[u8]) {
        broker
            .publish(
                DOMAIN_EVENTS_EXCHANGE,
                "booking_created",
                payload,
                PublishOptions::default(),
            )
            .await
            .unwrap();
    }

    async fn settle_all(runtime: &ConsumerRuntime, broker: &InMemoryBroker) -> Vec<Outcome> {
        let mut deliveries = broker.consume(&runtime.spec().name, 1).await.unwrap();
        let mut outcomes = Vec::new();
        while broker.queue_len(&runtime.spec().name) > 0 {
            let delivery = deliveries.next().await.unwrap().unwrap();
            outcomes.push(runtime.process(delivery).await.unwrap());
        }
        outcomes
    }

    fn runtime(broker: &InMemoryBroker, handler: Arc<dyn EventHandler>) -> ConsumerRuntime {
        ConsumerRuntime::new(
            Arc::new(broker.clone()),
            QueueSpec::created("booking", "BOOKING_CREATED"),
            handler,
        )
    }

    #[tokio::test]
    async fn test_transient_failures_below_budget_end_in_one_ack() {
        // Arrange
        let broker = InMemoryBroker::new();
        let handler = Arc::new(FlakyHandler::new(2));
        let runtime = runtime(&broker, handler.clone());
        runtime.provision().await.unwrap();
        publish(&broker, &envelope().to_bytes().unwrap()).await;

        // Act
        let outcomes = settle_all(&runtime, &broker).await;

        // Assert
        assert_eq!(
            outcomes,
            vec![
                Outcome::Retried { attempt: 1 },
                Outcome::Retried { attempt: 2 },
                Outcome::Acked,
            ]
        );
        assert_eq!(handler.calls(), 3);
        assert_eq!(broker.queue_len("booking.created.dlq"), 0);
    }

    #[tokio::test]
    async fn test_persistent_failure_dead_letters_after_budget() {
        // Arrange
        let broker = InMemoryBroker::new();
        let handler = Arc::new(FlakyHandler::new(u32::MAX));
        let runtime = runtime(&broker, handler.clone());
        runtime.provision().await.unwrap();
        let payload = envelope().to_bytes().unwrap();
        publish(&broker, &payload).await;

        // Act
        let outcomes = settle_all(&runtime, &broker).await;

        // Assert
        assert_eq!(
            outcomes,
            vec![
                Outcome::Retried { attempt: 1 },
                Outcome::Retried { attempt: 2 },
                Outcome::Retried { attempt: 3 },
                Outcome::DeadLettered,
            ]
        );
        assert_eq!(handler.calls(), 4);
        let dead = broker.queued_messages("booking.created.dlq");
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].payload, payload);
        assert_eq!(dead[0].retry_count, 3);
    }

    #[tokio::test]
    async fn test_undecodable_message_is_dead_lettered_without_handling() {
        // Arrange
        let broker = InMemoryBroker::new();
        let handler = Arc::new(FlakyHandler::new(0));
        let runtime = runtime(&broker, handler.clone());
        runtime.provision().await.unwrap();
        publish(&broker, br#"{"type":"USER_REGISTERED","id":"x","data":{}}"#).await;

        // Act
        let outcomes = settle_all(&runtime, &broker).await;

        // Assert
        assert_eq!(outcomes, vec![Outcome::DeadLettered]);
        assert_eq!(handler.calls(), 0);
        assert_eq!(broker.queue_len("booking.created.dlq"), 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_skips_retries() {
        let broker = InMemoryBroker::new();
        let runtime = runtime(&broker, Arc::new(PermanentFailure));
        runtime.provision().await.unwrap();
        publish(&broker, &envelope().to_bytes().unwrap()).await;

        let outcomes = settle_all(&runtime, &broker).await;

        assert_eq!(outcomes, vec![Outcome::DeadLettered]);
        assert_eq!(broker.queue_len("booking.created.dlq"), 1);
    }

    #[tokio::test]
    async fn test_custom_budget_changes_retry_count() {
        let broker = InMemoryBroker::new();
        let runtime = runtime(&broker, Arc::new(FlakyHandler::new(u32::MAX)))
            .with_retry_policy(RetryPolicy::new(1));
        runtime.provision().await.unwrap();
        publish(&broker, &envelope().to_bytes().unwrap()).await;

        let outcomes = settle_all(&runtime, &broker).await;

        assert_eq!(
            outcomes,
            vec![Outcome::Retried { attempt: 1 }, Outcome::DeadLettered]
        );
    }

    #[tokio::test]
    async fn test_run_drains_queue_until_broker_closes() {
        // Arrange
        let broker = InMemoryBroker::new();
        let handler = Arc::new(FlakyHandler::new(1));
        let runtime = Arc::new(runtime(&broker, handler.clone()));
        runtime.provision().await.unwrap();
        let task = {
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move { runtime.run().await })
        };

        // Act
        publish(&broker, &envelope().to_bytes().unwrap()).await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while handler.calls() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        broker.close().await.unwrap();

        // Assert
        let result = tokio::time::timeout(Duration::from_secs(5), task).await.unwrap();
        assert!(result.unwrap().is_ok());
        assert_eq!(handler.calls(), 2);
        assert_eq!(broker.queue_len("booking.created.dlq"), 0);
    }

    #[tokio::test]
    async fn test_run_fails_when_connection_is_lost() {
        // Arrange
        let runtime = ConsumerRuntime::new(
            Arc::new(EndedStreamBroker { connected: false }),
            QueueSpec::created("booking", "BOOKING_CREATED"),
            Arc::new(FlakyHandler::new(0)),
        );

        // Act
        let result = runtime.run().await;

        // Assert
        assert!(matches!(result, Err(BrokerError::Connection(_))));
    }

    #[tokio::test]
    async fn test_run_fails_when_broker_cancels_consumer() {
        let runtime = ConsumerRuntime::new(
            Arc::new(EndedStreamBroker { connected: true }),
            QueueSpec::created("booking", "BOOKING_CREATED"),
            Arc::new(FlakyHandler::new(0)),
        );

        let result = runtime.run().await;

        assert!(matches!(result, Err(BrokerError::Consume(_))));
    }

    #[tokio::test]
    async fn test_failed_retry_requeues_original_unchanged() {
        // Arrange
        let broker = InMemoryBroker::new();
        let runtime = runtime(&broker, Arc::new(FlakyHandler::new(1)));
        runtime.provision().await.unwrap();
        let payload = envelope().to_bytes().unwrap();
        publish(&broker, &payload).await;
        let mut deliveries = broker.consume(&runtime.spec().name, 1).await.unwrap();
        broker.set_fail_on_publish(true);

        // Act
        let delivery = deliveries.next().await.unwrap().unwrap();
        let result = runtime.process(delivery).await;

        // Assert
        assert!(matches!(result, Err(BrokerError::Publish(_))));
        let queued = broker.queued_messages("booking.created");
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].payload, payload);
        assert_eq!(queued[0].retry_count, 0);
        assert!(queued[0].redelivered);

        // The prefetch slot is free again: the requeued copy is delivered
        // and handled.
        broker.set_fail_on_publish(false);
        let redelivered = tokio::time::timeout(Duration::from_secs(5), deliveries.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(runtime.process(redelivered).await.unwrap(), Outcome::Acked);
        assert_eq!(broker.queue_len("booking.created"), 0);
    }
}
