//! Traits for broker channels.

use async_trait::async_trait;
use futures_util::Stream;
use serde::Serialize;
use std::pin::Pin;

use crate::error::MessagingError;
use crate::message::Delivery;

/// A lazy, unbounded stream of deliveries from one queue.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, MessagingError>> + Send>>;

/// Trait for message broker channels.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Publish raw bytes to an exchange.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), MessagingError>;

    /// Start consuming a queue. Deliveries must be settled by the caller.
    async fn consume(&self, queue: &str) -> Result<DeliveryStream, MessagingError>;

    /// Close the channel.
    async fn close(&self) -> Result<(), MessagingError>;
}

/// Extension trait for publishing serializable messages.
#[async_trait]
pub trait BrokerChannelExt: BrokerChannel {
    /// Publish a value as JSON.
    async fn publish_json<T: Serialize + Send + Sync>(
        &self,
        exchange: &str,
        routing_key: &str,
        message: &T,
    ) -> Result<(), MessagingError> {
        let bytes = serde_json::to_vec(message)
            .map_err(|e| MessagingError::Serialization(e.to_string()))?;
        self.publish(exchange, routing_key, &bytes).await
    }
}

// Implement BrokerChannelExt for all BrokerChannel implementations
impl<T: BrokerChannel + ?Sized> BrokerChannelExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::memory::InMemoryChannel;

    // Verify traits are object-safe
    fn _assert_object_safe(_: &dyn BrokerChannel) {}

    #[test]
    fn test_publish_json_serializes_payload() {
        let channel = InMemoryChannel::new();
        tokio_test::block_on(async {
            channel.declare_queue("numbers").await.unwrap();
            channel
                .publish_json("", "numbers", &vec![1, 2, 3])
                .await
                .unwrap();
            assert_eq!(channel.unacked_count().await, 1);
        });
    }
}
