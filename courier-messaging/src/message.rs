//! Received deliveries and their acknowledgement

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

use crate::error::MessagingError;

/// Settles deliveries with the broker they came from.
#[async_trait]
pub trait Acknowledger: Send + Sync + 'static {
    /// Acknowledge a delivery
    async fn ack(&self, delivery_tag: u64) -> Result<(), MessagingError>;

    /// Reject a delivery, optionally asking the broker to redeliver it
    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), MessagingError>;
}

/// A message received from a queue.
///
/// Every delivery has to be settled with [`ack`](Self::ack) or
/// [`reject`](Self::reject) once processed; both consume the delivery.
pub struct Delivery {
    /// Broker-assigned tag, unique per channel
    pub delivery_tag: u64,
    /// Exchange the message was published to
    pub exchange: String,
    /// Routing key the message was published with
    pub routing_key: String,
    /// Raw message body
    pub body: Vec<u8>,
    /// Whether the broker delivered this message before
    pub redelivered: bool,
    /// When the delivery was received
    pub received_at: DateTime<Utc>,
    acker: Arc<dyn Acknowledger>,
}

impl Delivery {
    /// Create a delivery settled through `acker`
    pub fn new(
        delivery_tag: u64,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
        body: impl Into<Vec<u8>>,
        acker: Arc<dyn Acknowledger>,
    ) -> Self {
        Self {
            delivery_tag,
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            body: body.into(),
            redelivered: false,
            received_at: Utc::now(),
            acker,
        }
    }

    /// Mark the delivery as redelivered
    pub fn with_redelivered(mut self, redelivered: bool) -> Self {
        self.redelivered = redelivered;
        self
    }

    /// Get the body as a UTF-8 string
    pub fn body_str(&self) -> Result<&str, MessagingError> {
        std::str::from_utf8(&self.body).map_err(|e| MessagingError::Deserialization(e.to_string()))
    }

    /// Parse the body as JSON
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, MessagingError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| MessagingError::Deserialization(e.to_string()))
    }

    /// Acknowledge the delivery
    pub async fn ack(self) -> Result<(), MessagingError> {
        self.acker.ack(self.delivery_tag).await
    }

    /// Reject the delivery
    pub async fn reject(self, requeue: bool) -> Result<(), MessagingError> {
        self.acker.reject(self.delivery_tag, requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("delivery_tag", &self.delivery_tag)
            .field("exchange", &self.exchange)
            .field("routing_key", &self.routing_key)
            .field("size", &self.body.len())
            .field("redelivered", &self.redelivered)
            .finish()
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Delivery {{ tag: {}, routing_key: {}, size: {} bytes }}",
            self.delivery_tag,
            self.routing_key,
            self.body.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingAcker {
        settled: Mutex<Vec<(u64, &'static str)>>,
    }

    #[async_trait]
    impl Acknowledger for RecordingAcker {
        async fn ack(&self, delivery_tag: u64) -> Result<(), MessagingError> {
            self.settled.lock().await.push((delivery_tag, "ack"));
            Ok(())
        }

        async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), MessagingError> {
            let kind = if requeue { "requeue" } else { "reject" };
            self.settled.lock().await.push((delivery_tag, kind));
            Ok(())
        }
    }

    #[test]
    fn test_body_accessors() {
        let acker = Arc::new(RecordingAcker::default());
        let delivery = Delivery::new(1, "amq.direct", "orders", r#"{"id":"42"}"#, acker);

        assert_eq!(delivery.body_str().unwrap(), r#"{"id":"42"}"#);
        let value: serde_json::Value = delivery.parse_json().unwrap();
        assert_eq!(value["id"], "42");
        assert!(format!("{delivery}").contains("orders"));
    }

    #[test]
    fn test_invalid_utf8_body() {
        let acker = Arc::new(RecordingAcker::default());
        let delivery = Delivery::new(1, "", "q", vec![0xff, 0xfe], acker);

        assert!(matches!(
            delivery.body_str(),
            Err(MessagingError::Deserialization(_))
        ));
    }

    #[tokio::test]
    async fn test_settling_goes_through_acker() {
        let acker = Arc::new(RecordingAcker::default());

        Delivery::new(7, "", "q", "a", acker.clone())
            .ack()
            .await
            .unwrap();
        Delivery::new(8, "", "q", "b", acker.clone())
            .reject(true)
            .await
            .unwrap();
        Delivery::new(9, "", "q", "c", acker.clone())
            .reject(false)
            .await
            .unwrap();

        assert_eq!(
            *acker.settled.lock().await,
            vec![(7, "ack"), (8, "requeue"), (9, "reject")]
        );
    }
}
