//! In-process broker with the routing, prefetch, TTL and dead-letter
//! behavior of the AMQP topology. Used by tests and by the `memory://`
//! broker URL.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::broker::{Acker, Delivery, DeliveryMetadata, DeliveryStream, MessageBroker, PublishOptions};
use crate::error::BrokerError;
use crate::topology::{provisioned_exchanges, topic_matches, QueueOptions};

/// A message sitting in a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    /// Routing key the message currently carries.
    pub routing_key: String,
    /// Raw body.
    pub payload: Vec<u8>,
    /// Message id property.
    pub message_id: Option<String>,
    /// Message type property.
    pub message_type: Option<String>,
    /// Retry counter header.
    pub retry_count: u32,
    /// Set once the message has been handed out before.
    pub redelivered: bool,
}

/// A message accepted by [`MessageBroker::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Target exchange.
    pub exchange: String,
    /// Routing key.
    pub routing_key: String,
    /// Raw body.
    pub payload: Vec<u8>,
    /// Publish options as given.
    pub options: PublishOptions,
}

#[derive(Debug)]
struct StoredMessage {
    message: QueuedMessage,
    enqueued_at: Instant,
}

#[derive(Debug)]
struct QueueState {
    options: QueueOptions,
    messages: VecDeque<StoredMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    queue: String,
    pattern: String,
}

#[derive(Debug, Default)]
struct State {
    exchanges: HashMap<String, Vec<Binding>>,
    queues: HashMap<String, QueueState>,
    published: Vec<PublishedMessage>,
}

impl State {
    /// Routes a message through `exchange`. The default exchange `""`
    /// delivers to the queue named by the routing key. Unroutable messages
    /// are dropped.
    fn route(&mut self, exchange: &str, message: &QueuedMessage) -> Result<usize, BrokerError> {
        let targets: Vec<String> = if exchange.is_empty() {
            vec![message.routing_key.clone()]
        } else {
            let bindings = self.exchanges.get(exchange).ok_or_else(|| {
                BrokerError::Publish(format!("exchange {exchange} does not exist"))
            })?;
            let mut targets: Vec<String> = bindings
                .iter()
                .filter(|binding| topic_matches(&binding.pattern, &message.routing_key))
                .map(|binding| binding.queue.clone())
                .collect();
            targets.dedup();
            targets
        };

        let now = Instant::now();
        let mut delivered = 0;
        for target in targets {
            if let Some(queue) = self.queues.get_mut(&target) {
                queue.messages.push_back(StoredMessage {
                    message: message.clone(),
                    enqueued_at: now,
                });
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Hands a message rejected by `queue` to that queue's dead-letter
    /// wiring, or drops it when the queue has none.
    fn dead_letter(&mut self, queue: &str, mut message: QueuedMessage) {
        let Some(policy) = self
            .queues
            .get(queue)
            .and_then(|state| state.options.dead_letter.clone())
        else {
            debug!(queue = %queue, "dropping rejected message without dead-letter wiring");
            return;
        };

        message.routing_key = policy.routing_key;
        message.redelivered = false;
        if let Err(e) = self.route(&policy.exchange, &message) {
            debug!(queue = %queue, error = %e, "dead-letter routing failed");
        }
    }

    /// Takes the next live message of `queue`, dead-lettering expired ones
    /// on the way.
    fn pop(&mut self, queue: &str) -> Option<QueuedMessage> {
        loop {
            let state = self.queues.get_mut(queue)?;
            let stored = state.messages.pop_front()?;
            let expired = state
                .options
                .message_ttl
                .is_some_and(|ttl| stored.enqueued_at.elapsed() >= ttl);
            if !expired {
                return Some(stored.message);
            }
            debug!(queue = %queue, "message expired");
            self.dead_letter(queue, stored.message);
        }
    }

    fn declare(&mut self, name: &str, options: QueueOptions) {
        self.queues.entry(name.to_owned()).or_insert(QueueState {
            options,
            messages: VecDeque::new(),
        });
    }

    fn bind(&mut self, queue: &str, exchange: &str, pattern: &str) -> Result<(), BrokerError> {
        if !self.queues.contains_key(queue) {
            return Err(BrokerError::Topology(format!("queue {queue} does not exist")));
        }
        let bindings = self
            .exchanges
            .get_mut(exchange)
            .ok_or_else(|| BrokerError::Topology(format!("exchange {exchange} does not exist")))?;
        let binding = Binding {
            queue: queue.to_owned(),
            pattern: pattern.to_owned(),
        };
        if !bindings.contains(&binding) {
            bindings.push(binding);
        }
        Ok(())
    }
}

struct Inner {
    state: Mutex<State>,
    notify: Notify,
    connected: AtomicBool,
    fail_on_publish: AtomicBool,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_connected(&self) -> Result<(), BrokerError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::Closed)
        }
    }
}

/// In-memory [`MessageBroker`]. Cloning shares the same broker.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl InMemoryBroker {
    /// A connected broker with the standard exchanges declared.
    #[must_use]
    pub fn new() -> Self {
        let state = State {
            exchanges: provisioned_exchanges()
                .into_iter()
                .map(|exchange| (exchange, Vec::new()))
                .collect(),
            ..State::default()
        };
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                notify: Notify::new(),
                connected: AtomicBool::new(true),
                fail_on_publish: AtomicBool::new(false),
            }),
        }
    }

    /// Makes subsequent publishes, retry republishes included, fail with
    /// `BrokerError::Publish`.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.inner.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    /// Ready messages in `queue`, 0 if it does not exist.
    #[must_use]
    pub fn queue_len(&self, queue: &str) -> usize {
        self.inner
            .state()
            .queues
            .get(queue)
            .map_or(0, |state| state.messages.len())
    }

    /// Snapshot of the ready messages in `queue`, head first.
    #[must_use]
    pub fn queued_messages(&self, queue: &str) -> Vec<QueuedMessage> {
        self.inner
            .state()
            .queues
            .get(queue)
            .map(|state| state.messages.iter().map(|s| s.message.clone()).collect())
            .unwrap_or_default()
    }

    /// Every message accepted by `publish`, in order.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.inner.state().published.clone()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn declare_queue(&self, name: &str, options: &QueueOptions) -> Result<(), BrokerError> {
        self.inner.ensure_connected()?;
        let mut state = self.inner.state();

        if let Some(policy) = &options.dead_letter {
            state.declare(
                &policy.queue,
                QueueOptions {
                    durable: true,
                    message_ttl: Some(policy.queue_ttl),
                    dead_letter: None,
                },
            );
            state.bind(&policy.queue, &policy.exchange, &policy.routing_key)?;
        }
        state.declare(name, options.clone());
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.inner.ensure_connected()?;
        self.inner.state().bind(queue, exchange, routing_key)
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        options: PublishOptions,
    ) -> Result<(), BrokerError> {
        self.inner.ensure_connected()?;
        if self.inner.fail_on_publish.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish("simulated publish failure".into()));
        }

        let message = QueuedMessage {
            routing_key: routing_key.to_owned(),
            payload: payload.to_vec(),
            message_id: Some(
                options
                    .message_id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
            ),
            message_type: options.message_type.clone(),
            retry_count: options.retry_count,
            redelivered: false,
        };

        {
            let mut state = self.inner.state();
            let delivered = state.route(exchange, &message)?;
            debug!(exchange = %exchange, routing_key = %routing_key, delivered, "published message");
            state.published.push(PublishedMessage {
                exchange: exchange.to_owned(),
                routing_key: routing_key.to_owned(),
                payload: payload.to_vec(),
                options,
            });
        }
        self.inner.notify.notify_waiters();
        Ok(())
    }

    async fn consume(&self, queue: &str, prefetch: u16) -> Result<DeliveryStream, BrokerError> {
        self.inner.ensure_connected()?;
        if !self.inner.state().queues.contains_key(queue) {
            return Err(BrokerError::Consume(format!("queue {queue} does not exist")));
        }

        let window = if prefetch == 0 {
            Semaphore::MAX_PERMITS
        } else {
            usize::from(prefetch)
        };
        let consumer = Consumer {
            inner: Arc::clone(&self.inner),
            queue: queue.to_owned(),
            window: Arc::new(Semaphore::new(window)),
        };

        let deliveries = stream::unfold(consumer, |consumer| async move {
            let delivery = consumer.next_delivery().await?;
            Some((Ok(delivery), consumer))
        });
        Ok(deliveries.boxed())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn is_closed(&self) -> bool {
        !self.inner.connected.load(Ordering::SeqCst)
    }
}

struct Consumer {
    inner: Arc<Inner>,
    queue: String,
    window: Arc<Semaphore>,
}

impl Consumer {
    /// Waits for a free prefetch slot and a ready message. `None` once the
    /// broker is closed.
    async fn next_delivery(&self) -> Option<Delivery> {
        let permit = Arc::clone(&self.window).acquire_owned().await.ok()?;
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.inner.connected.load(Ordering::SeqCst) {
                return None;
            }
            let next = self.inner.state().pop(&self.queue);
            if let Some(message) = next {
                let metadata = DeliveryMetadata {
                    queue: self.queue.clone(),
                    routing_key: message.routing_key.clone(),
                    message_id: message.message_id.clone(),
                    message_type: message.message_type.clone(),
                    retry_count: message.retry_count,
                    redelivered: message.redelivered,
                };
                let payload = message.payload.clone();
                let acker = InMemoryAcker {
                    inner: Arc::clone(&self.inner),
                    queue: self.queue.clone(),
                    message,
                    settled: AtomicBool::new(false),
                    _permit: permit,
                };
                return Some(Delivery::new(metadata, payload, Box::new(acker)));
            }

            notified.await;
        }
    }
}

/// Settles one in-memory delivery. Dropped unsettled, the message goes back
/// to the head of its queue.
struct InMemoryAcker {
    inner: Arc<Inner>,
    queue: String,
    message: QueuedMessage,
    settled: AtomicBool,
    _permit: OwnedSemaphorePermit,
}

impl InMemoryAcker {
    fn settle(&self) -> Result<(), BrokerError> {
        self.inner.ensure_connected()?;
        self.settled.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Puts the original back at the head of its queue.
    fn requeue(&self) {
        let mut state = self.inner.state();
        if let Some(queue) = state.queues.get_mut(&self.queue) {
            queue.messages.push_front(StoredMessage {
                message: QueuedMessage {
                    redelivered: true,
                    ..self.message.clone()
                },
                enqueued_at: Instant::now(),
            });
        }
        drop(state);
        self.inner.notify.notify_waiters();
    }
}

#[async_trait]
impl Acker for InMemoryAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.settle()
    }

    async fn retry(
        &self,
        payload: &[u8],
        metadata: &DeliveryMetadata,
        next_retry_count: u32,
    ) -> Result<(), BrokerError> {
        self.settle()?;
        if self.inner.fail_on_publish.load(Ordering::SeqCst) {
            self.requeue();
            return Err(BrokerError::Publish("simulated publish failure".into()));
        }
        let message = QueuedMessage {
            payload: payload.to_vec(),
            retry_count: next_retry_count,
            redelivered: true,
            ..self.message.clone()
        };
        {
            let mut state = self.inner.state();
            state.route("", &QueuedMessage {
                routing_key: metadata.queue.clone(),
                ..message
            })?;
        }
        self.inner.notify.notify_waiters();
        Ok(())
    }

    async fn dead_letter(&self) -> Result<(), BrokerError> {
        self.settle()?;
        self.inner
            .state()
            .dead_letter(&self.queue, self.message.clone());
        self.inner.notify.notify_waiters();
        Ok(())
    }
}

impl Drop for InMemoryAcker {
    fn drop(&mut self) {
        if !self.settled.load(Ordering::SeqCst) {
            self.requeue();
        }
    }
}
