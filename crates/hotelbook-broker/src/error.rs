//! Broker error types.

use thiserror::Error;

/// Errors raised by broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The transport is unreachable or was severed. Fatal for the process.
    #[error("connection error: {0}")]
    Connection(String),

    /// The transport did not accept a published message.
    #[error("publish error: {0}")]
    Publish(String),

    /// An exchange, queue or binding could not be declared.
    #[error("topology error: {0}")]
    Topology(String),

    /// Consuming or settling a delivery failed.
    #[error("consume error: {0}")]
    Consume(String),

    /// The broker was closed by its owner.
    #[error("broker connection is closed")]
    Closed,
}
