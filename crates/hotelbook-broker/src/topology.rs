//! Topology policy: exchange and queue naming, TTLs, dead-letter wiring and
//! prefetch. Pure configuration, no I/O.

use std::time::Duration;

/// Topic exchange carrying domain events.
pub const DOMAIN_EVENTS_EXCHANGE: &str = "domain.events";

/// Topic exchange carrying notification requests.
pub const NOTIFICATIONS_EXCHANGE: &str = "notifications";

/// Suffix appended to an exchange name to form its dead-letter exchange.
pub const DEAD_LETTER_EXCHANGE_SUFFIX: &str = ".dlx";

/// Suffix appended to a queue name to form its dead-letter queue.
pub const DEAD_LETTER_QUEUE_SUFFIX: &str = ".dlq";

/// Routing key stamped on dead-lettered messages and used to bind
/// dead-letter queues.
pub const DEAD_LETTER_ROUTING_KEY: &str = "#";

/// How long a message may wait in a live queue before it is dead-lettered.
pub const LIVE_QUEUE_MESSAGE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// How long a dead-lettered message is retained.
pub const DEAD_LETTER_QUEUE_MESSAGE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Unacknowledged deliveries a consumer may hold per queue.
pub const PREFETCH: u16 = 1;

/// Exchanges declared when a connection is opened: each topic exchange and
/// its dead-letter exchange.
#[must_use]
pub fn provisioned_exchanges() -> Vec<String> {
    [DOMAIN_EVENTS_EXCHANGE, NOTIFICATIONS_EXCHANGE]
        .into_iter()
        .flat_map(|exchange| [exchange.to_owned(), dead_letter_exchange(exchange)])
        .collect()
}

/// Name of the dead-letter exchange paired with `exchange`.
#[must_use]
pub fn dead_letter_exchange(exchange: &str) -> String {
    format!("{exchange}{DEAD_LETTER_EXCHANGE_SUFFIX}")
}

/// Name of the dead-letter queue paired with `queue`.
#[must_use]
pub fn dead_letter_queue(queue: &str) -> String {
    format!("{queue}{DEAD_LETTER_QUEUE_SUFFIX}")
}

/// Derives a routing key from an event type tag: lower-cased, with every
/// character outside `[a-z0-9._-]` replaced by `.`.
#[must_use]
pub fn routing_key_for(event_type: &str) -> String {
    event_type
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '.'
            }
        })
        .collect()
}

/// AMQP topic matching: words are separated by `.`, `*` matches exactly one
/// word and `#` matches zero or more words.
#[must_use]
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches_words(&pattern, &key)
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| matches_words(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((&head, tail)) => (word == "*" || word == head) && matches_words(rest, tail),
            None => false,
        },
    }
}

/// Dead-letter wiring of a live queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterPolicy {
    /// Exchange rejected or expired messages are routed to.
    pub exchange: String,
    /// Routing key stamped on dead-lettered messages.
    pub routing_key: String,
    /// Queue retaining the dead-lettered messages.
    pub queue: String,
    /// Retention of the dead-letter queue.
    pub queue_ttl: Duration,
}

/// Arguments applied when a queue is first declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueOptions {
    /// Survive broker restarts.
    pub durable: bool,
    /// Per-message time-to-live in the queue.
    pub message_ttl: Option<Duration>,
    /// Dead-letter wiring; when set, the paired queue is declared first.
    pub dead_letter: Option<DeadLetterPolicy>,
}

impl QueueOptions {
    /// The standard consumer-queue policy: 24 hour message TTL, dead-lettered
    /// to the dead-letter exchange of `exchange` into `<queue>.dlq`, which
    /// retains messages for 7 days.
    #[must_use]
    pub fn with_dead_letter(queue: &str, exchange: &str) -> Self {
        Self {
            durable: true,
            message_ttl: Some(LIVE_QUEUE_MESSAGE_TTL),
            dead_letter: Some(DeadLetterPolicy {
                exchange: dead_letter_exchange(exchange),
                routing_key: DEAD_LETTER_ROUTING_KEY.to_owned(),
                queue: dead_letter_queue(queue),
                queue_ttl: DEAD_LETTER_QUEUE_MESSAGE_TTL,
            }),
        }
    }
}

/// Everything a consumer needs to provision and drain one queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    /// Live queue name.
    pub name: String,
    /// Exchange the queue is bound to.
    pub exchange: String,
    /// Binding patterns.
    pub routing_keys: Vec<String>,
    /// Declaration arguments.
    pub options: QueueOptions,
    /// Flow-control window.
    pub prefetch: u16,
}

impl QueueSpec {
    /// `<domain>.created`, bound to the domain-events exchange under the
    /// routing key derived from `event_type`, with the standard policy.
    #[must_use]
    pub fn created(domain: &str, event_type: &str) -> Self {
        let name = format!("{domain}.created");
        Self {
            options: QueueOptions::with_dead_letter(&name, DOMAIN_EVENTS_EXCHANGE),
            name,
            exchange: DOMAIN_EVENTS_EXCHANGE.to_owned(),
            routing_keys: vec![routing_key_for(event_type)],
            prefetch: PREFETCH,
        }
    }

    /// Name of the paired dead-letter queue, if any.
    #[must_use]
    pub fn dead_letter_queue(&self) -> Option<&str> {
        self.options
            .dead_letter
            .as_ref()
            .map(|policy| policy.queue.as_str())
    }
}
