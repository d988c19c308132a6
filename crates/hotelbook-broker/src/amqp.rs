//! AMQP (RabbitMQ) broker implementation.
//!
//! One connection and one channel per process, opened by [`AmqpBroker::connect`]
//! and held behind a mutex so channel operations are serialized. Publisher
//! confirms are enabled on the channel: `publish` returns only after the
//! broker has acknowledged the message.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use lapin::acker::Acker as LapinAcker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    BasicQosOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broker::{Acker, Delivery, DeliveryMetadata, DeliveryStream, MessageBroker, PublishOptions};
use crate::error::BrokerError;
use crate::retry::RETRY_COUNT_HEADER;
use crate::topology::{provisioned_exchanges, QueueOptions};

const REPLY_SUCCESS: u16 = 200;

/// Live transport handles.
struct Link {
    connection: Connection,
    channel: Channel,
}

impl Link {
    fn is_live(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }
}

type SharedLink = Arc<Mutex<Option<Link>>>;

/// Returns the channel of a live link, failing fast once the connection has
/// been lost or closed.
fn live_channel(link: &Option<Link>) -> Result<&Channel, BrokerError> {
    match link {
        Some(link) if link.is_live() => Ok(&link.channel),
        Some(_) => Err(BrokerError::Connection(
            "AMQP connection or channel was lost".into(),
        )),
        None => Err(BrokerError::Closed),
    }
}

/// RabbitMQ-backed [`MessageBroker`].
pub struct AmqpBroker {
    link: SharedLink,
}

impl AmqpBroker {
    /// Opens the connection and its channel, enables publisher confirms and
    /// declares the durable topic exchanges with their dead-letter exchanges.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Connection` if the transport cannot be reached
    /// and `BrokerError::Topology` if an exchange cannot be declared.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        info!(url = %redact(url), "connecting to AMQP broker");

        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| {
                BrokerError::Connection(format!("failed to connect to {}: {e}", redact(url)))
            })?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Connection(format!("failed to create channel: {e}")))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| BrokerError::Connection(format!("failed to enable confirms: {e}")))?;

        for exchange in provisioned_exchanges() {
            channel
                .exchange_declare(
                    &exchange,
                    ExchangeKind::Topic,
                    ExchangeDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| {
                    BrokerError::Topology(format!("failed to declare exchange {exchange}: {e}"))
                })?;
            debug!(exchange = %exchange, "declared exchange");
        }

        info!(url = %redact(url), "AMQP broker connected and configured");

        Ok(Self {
            link: Arc::new(Mutex::new(Some(Link {
                connection,
                channel,
            }))),
        })
    }
}

#[async_trait]
impl MessageBroker for AmqpBroker {
    async fn declare_queue(&self, name: &str, options: &QueueOptions) -> Result<(), BrokerError> {
        let guard = self.link.lock().await;
        let channel = live_channel(&guard)?;

        let mut arguments = FieldTable::default();
        if let Some(ttl) = options.message_ttl {
            arguments.insert("x-message-ttl".into(), millis(ttl));
        }

        if let Some(policy) = &options.dead_letter {
            let mut dlq_arguments = FieldTable::default();
            dlq_arguments.insert("x-message-ttl".into(), millis(policy.queue_ttl));
            channel
                .queue_declare(
                    &policy.queue,
                    QueueDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    dlq_arguments,
                )
                .await
                .map_err(|e| {
                    BrokerError::Topology(format!("failed to declare queue {}: {e}", policy.queue))
                })?;
            channel
                .queue_bind(
                    &policy.queue,
                    &policy.exchange,
                    &policy.routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| {
                    BrokerError::Topology(format!("failed to bind queue {}: {e}", policy.queue))
                })?;

            arguments.insert(
                "x-dead-letter-exchange".into(),
                AMQPValue::LongString(policy.exchange.clone().into()),
            );
            arguments.insert(
                "x-dead-letter-routing-key".into(),
                AMQPValue::LongString(policy.routing_key.clone().into()),
            );
        }

        channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: options.durable,
                    ..Default::default()
                },
                arguments,
            )
            .await
            .map_err(|e| BrokerError::Topology(format!("failed to declare queue {name}: {e}")))?;

        info!(queue = %name, dead_letter = options.dead_letter.is_some(), "declared queue");
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        let guard = self.link.lock().await;
        let channel = live_channel(&guard)?;

        channel
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                BrokerError::Topology(format!("failed to bind {queue} to {exchange}: {e}"))
            })?;

        info!(queue = %queue, exchange = %exchange, routing_key = %routing_key, "bound queue");
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        options: PublishOptions,
    ) -> Result<(), BrokerError> {
        let guard = self.link.lock().await;
        let channel = live_channel(&guard)?;

        let message_id = options
            .message_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut headers = FieldTable::default();
        headers.insert(RETRY_COUNT_HEADER.into(), count_value(options.retry_count));

        let mut properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2) // persistent
            .with_message_id(message_id.clone().into())
            .with_timestamp(u64::try_from(Utc::now().timestamp()).unwrap_or_default())
            .with_headers(headers);
        if let Some(kind) = options.message_type {
            properties = properties.with_type(kind.into());
        }

        confirm_publish(channel, exchange, routing_key, payload, properties).await?;

        debug!(
            exchange = %exchange,
            routing_key = %routing_key,
            message_id = %message_id,
            "published message"
        );
        Ok(())
    }

    async fn consume(&self, queue: &str, prefetch: u16) -> Result<DeliveryStream, BrokerError> {
        let guard = self.link.lock().await;
        let channel = live_channel(&guard)?;

        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::Consume(format!("failed to set prefetch: {e}")))?;

        let consumer_tag = format!("hotelbook-{queue}-{}", Uuid::new_v4());
        let consumer = channel
            .basic_consume(
                queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume(format!("failed to consume {queue}: {e}")))?;

        info!(queue = %queue, prefetch, consumer_tag = %consumer_tag, "consuming queue");

        let link = Arc::clone(&self.link);
        let queue = queue.to_owned();
        let stream = consumer.map(move |delivery| match delivery {
            Ok(delivery) => Ok(wrap_delivery(delivery, &queue, &link)),
            Err(e) => Err(BrokerError::Connection(format!(
                "delivery stream of {queue} failed: {e}"
            ))),
        });

        Ok(stream.boxed())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        let mut guard = self.link.lock().await;
        let Some(link) = guard.take() else {
            return Ok(());
        };

        if link.channel.status().connected() {
            if let Err(e) = link.channel.close(REPLY_SUCCESS, "OK").await {
                warn!(error = %e, "channel was already closing");
            }
        }
        info!("AMQP channel closed");

        if link.connection.status().connected() {
            if let Err(e) = link.connection.close(REPLY_SUCCESS, "OK").await {
                warn!(error = %e, "connection was already closing");
            }
        }
        info!("AMQP connection closed");

        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.link.lock().await.as_ref().is_some_and(Link::is_live)
    }

    async fn is_closed(&self) -> bool {
        self.link.lock().await.is_none()
    }
}

async fn confirm_publish(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    payload: &[u8],
    properties: BasicProperties,
) -> Result<(), BrokerError> {
    let confirmation = channel
        .basic_publish(
            exchange,
            routing_key,
            BasicPublishOptions::default(),
            payload,
            properties,
        )
        .await
        .map_err(|e| BrokerError::Publish(format!("failed to publish to {exchange}: {e}")))?
        .await
        .map_err(|e| BrokerError::Publish(format!("publish confirmation failed: {e}")))?;

    if confirmation.is_nack() {
        return Err(BrokerError::Publish(format!(
            "broker refused message for {exchange}/{routing_key}"
        )));
    }
    Ok(())
}

fn wrap_delivery(mut delivery: lapin::message::Delivery, queue: &str, link: &SharedLink) -> Delivery {
    let properties = delivery.properties.clone();
    let metadata = DeliveryMetadata {
        queue: queue.to_owned(),
        routing_key: delivery.routing_key.as_str().to_owned(),
        message_id: properties.message_id().as_ref().map(|id| id.as_str().to_owned()),
        message_type: properties.kind().as_ref().map(|kind| kind.as_str().to_owned()),
        retry_count: retry_count(&properties),
        redelivered: delivery.redelivered,
    };
    let payload = std::mem::take(&mut delivery.data);

    Delivery::new(
        metadata,
        payload,
        Box::new(AmqpAcker {
            acker: delivery.acker,
            properties,
            link: Arc::clone(link),
        }),
    )
}

/// Settles lapin deliveries.
///
/// AMQP requeue does not allow headers to change, so a retry re-publishes a
/// copy carrying the incremented counter to the same queue through the
/// default exchange, and acks the original once the copy is confirmed.
struct AmqpAcker {
    acker: LapinAcker,
    properties: BasicProperties,
    link: SharedLink,
}

impl AmqpAcker {
    async fn republish(
        &self,
        payload: &[u8],
        metadata: &DeliveryMetadata,
        next_retry_count: u32,
    ) -> Result<(), BrokerError> {
        let guard = self.link.lock().await;
        let channel = live_channel(&guard)?;

        let mut headers = self.properties.headers().clone().unwrap_or_default();
        headers.insert(RETRY_COUNT_HEADER.into(), count_value(next_retry_count));
        let properties = self.properties.clone().with_headers(headers);

        confirm_publish(channel, "", &metadata.queue, payload, properties).await
    }

    async fn requeue(&self) -> Result<(), BrokerError> {
        self.acker
            .nack(BasicNackOptions {
                multiple: false,
                requeue: true,
            })
            .await
            .map_err(|e| BrokerError::Consume(format!("failed to requeue: {e}")))
    }
}

#[async_trait]
impl Acker for AmqpAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| BrokerError::Consume(format!("failed to ack: {e}")))
    }

    async fn retry(
        &self,
        payload: &[u8],
        metadata: &DeliveryMetadata,
        next_retry_count: u32,
    ) -> Result<(), BrokerError> {
        if let Err(e) = self.republish(payload, metadata, next_retry_count).await {
            // The original still holds a prefetch slot until it is settled.
            warn!(
                queue = %metadata.queue,
                message_id = ?metadata.message_id,
                error = %e,
                "retry republish failed, requeueing original"
            );
            self.requeue().await?;
            return Err(e);
        }

        self.ack().await
    }

    async fn dead_letter(&self) -> Result<(), BrokerError> {
        self.acker
            .nack(BasicNackOptions {
                multiple: false,
                requeue: false,
            })
            .await
            .map_err(|e| BrokerError::Consume(format!("failed to nack: {e}")))
    }
}

fn millis(duration: std::time::Duration) -> AMQPValue {
    AMQPValue::LongInt(i32::try_from(duration.as_millis()).unwrap_or(i32::MAX))
}

fn count_value(count: u32) -> AMQPValue {
    AMQPValue::LongInt(i32::try_from(count).unwrap_or(i32::MAX))
}

/// Reads the retry counter header, tolerating any integer encoding.
fn retry_count(properties: &BasicProperties) -> u32 {
    properties
        .headers()
        .as_ref()
        .and_then(|headers| headers.inner().get(RETRY_COUNT_HEADER))
        .and_then(|value| {
            let count = match value {
                AMQPValue::ShortShortInt(v) => i64::from(*v),
                AMQPValue::ShortShortUInt(v) => i64::from(*v),
                AMQPValue::ShortInt(v) => i64::from(*v),
                AMQPValue::ShortUInt(v) => i64::from(*v),
                AMQPValue::LongInt(v) => i64::from(*v),
                AMQPValue::LongUInt(v) => i64::from(*v),
                AMQPValue::LongLongInt(v) => *v,
                _ => return None,
            };
            u32::try_from(count).ok()
        })
        .unwrap_or(0)
}

/// Hides credentials of an AMQP URL for logging.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_owned(),
    }
}
