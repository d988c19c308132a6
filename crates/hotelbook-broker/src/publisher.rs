//! Typed publishing facade used by producing services.

use std::sync::Arc;

use hotelbook_core::clock::Clock;
use hotelbook_core::event::{BookingCreated, DomainEvent, EventEnvelope};
use hotelbook_core::id::IdGenerator;
use tracing::info;

use crate::broker::{MessageBroker, PublishOptions};
use crate::error::BrokerError;
use crate::topology::{routing_key_for, DOMAIN_EVENTS_EXCHANGE};

/// Wraps domain events in envelopes and publishes them to the domain-events
/// exchange under the routing key derived from their type tag.
#[derive(Clone)]
pub struct BookingEventPublisher {
    broker: Arc<dyn MessageBroker>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl BookingEventPublisher {
    /// Creates a publisher.
    #[must_use]
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self { broker, clock, ids }
    }

    /// Publishes a `BOOKING_CREATED` event and returns the envelope sent.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Publish` if the broker did not accept the
    /// message.
    pub async fn publish_booking_created(
        &self,
        event: BookingCreated,
    ) -> Result<EventEnvelope, BrokerError> {
        let envelope = EventEnvelope::new(
            self.ids.next_id(),
            self.clock.now(),
            DomainEvent::BookingCreated(event),
        );
        self.publish(&envelope).await?;
        Ok(envelope)
    }

    /// Publishes an already wrapped event.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Publish` if the envelope cannot be serialized
    /// or the broker did not accept the message.
    pub async fn publish(&self, envelope: &EventEnvelope) -> Result<(), BrokerError> {
        let payload = envelope
            .to_bytes()
            .map_err(|e| BrokerError::Publish(format!("failed to serialize event: {e}")))?;
        let routing_key = routing_key_for(envelope.event_type());

        self.broker
            .publish(
                DOMAIN_EVENTS_EXCHANGE,
                &routing_key,
                &payload,
                PublishOptions {
                    message_id: Some(envelope.id.to_string()),
                    message_type: Some(envelope.event_type().to_owned()),
                    retry_count: 0,
                },
            )
            .await?;

        info!(
            event_id = %envelope.id,
            event_type = envelope.event_type(),
            routing_key = %routing_key,
            "published domain event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use hotelbook_core::clock::SystemClock;
    use hotelbook_core::id::RandomIdGenerator;
    use uuid::Uuid;

    use super::*;
    use crate::in_memory::InMemoryBroker;

    fn event(booking_id: Uuid) -> BookingCreated {
        BookingCreated {
            booking_id,
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
        }
    }

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> chrono::DateTime<Utc> {
            Utc.with_ymd_and_hms(2025, 5, 20, 9, 30, 0).unwrap()
        }
    }

    #[tokio::test]
    async fn test_publish_booking_created_stamps_envelope_and_properties() {
        // Arrange
        let broker = InMemoryBroker::new();
        let publisher = BookingEventPublisher::new(
            Arc::new(broker.clone()),
            Arc::new(FixedClock),
            Arc::new(RandomIdGenerator),
        );
        let booking_id = Uuid::new_v4();

        // Act
        let envelope = publisher
            .publish_booking_created(event(booking_id))
            .await
            .unwrap();

        // Assert
        assert_eq!(envelope.timestamp, FixedClock.now());
        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].exchange, "domain.events");
        assert_eq!(published[0].routing_key, "booking_created");
        assert_eq!(
            published[0].options.message_id.as_deref(),
            Some(envelope.id.to_string().as_str())
        );
        assert_eq!(
            published[0].options.message_type.as_deref(),
            Some("BOOKING_CREATED")
        );
        assert_eq!(published[0].options.retry_count, 0);

        let decoded = EventEnvelope::from_slice(&published[0].payload).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[tokio::test]
    async fn test_publish_failure_is_reported() {
        let broker = InMemoryBroker::new();
        broker.set_fail_on_publish(true);
        let publisher = BookingEventPublisher::new(
            Arc::new(broker.clone()),
            Arc::new(SystemClock),
            Arc::new(RandomIdGenerator),
        );

        let result = publisher.publish_booking_created(event(Uuid::new_v4())).await;

        assert!(matches!(result, Err(BrokerError::Publish(_))));
        assert!(broker.published().is_empty());
    }
}
