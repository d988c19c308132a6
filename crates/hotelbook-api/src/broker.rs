//! Broker selection from the configured URL.

use std::sync::Arc;

use hotelbook_broker::{AmqpBroker, BrokerError, InMemoryBroker, MessageBroker};
use tracing::{info, warn};

/// URL scheme selecting the in-process broker.
pub const MEMORY_SCHEME: &str = "memory://";

/// Opens the process-wide broker: the in-process one for `memory://`, AMQP
/// otherwise.
///
/// # Errors
///
/// Returns `BrokerError::Connection` if the AMQP broker cannot be reached.
pub async fn connect(url: &str) -> Result<Arc<dyn MessageBroker>, BrokerError> {
    if url.starts_with(MEMORY_SCHEME) {
        warn!("using the in-process broker; events do not leave this process");
        return Ok(Arc::new(InMemoryBroker::new()));
    }
    let broker = AmqpBroker::connect(url).await?;
    info!("message broker ready");
    Ok(Arc::new(broker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_url_selects_in_process_broker() {
        let broker = connect("memory://").await.unwrap();

        assert!(broker.is_connected().await);
    }
}
