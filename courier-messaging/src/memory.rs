//! Process-local broker channel
//!
//! Routes messages the way an AMQP broker would for the common cases: the
//! default exchange (`""`) delivers to the queue named by the routing key,
//! any other exchange delivers to queues bound with a matching routing key.
//! Unroutable messages are dropped. Each queue accepts a single consumer.

use async_trait::async_trait;
use futures_util::stream;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::debug;

use crate::error::MessagingError;
use crate::message::{Acknowledger, Delivery};
use crate::traits::{BrokerChannel, DeliveryStream};

/// In-memory broker channel
#[derive(Clone, Default)]
pub struct InMemoryChannel {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    queues: RwLock<HashMap<String, QueueState>>,
    bindings: RwLock<Vec<Binding>>,
    unacked: Mutex<HashMap<u64, Unacked>>,
    acked: Mutex<Vec<u64>>,
    rejected: Mutex<Vec<(u64, bool)>>,
    next_tag: AtomicU64,
    closed: AtomicBool,
}

struct QueueState {
    sender: mpsc::UnboundedSender<Delivery>,
    receiver: Option<mpsc::UnboundedReceiver<Delivery>>,
}

impl QueueState {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    queue: String,
    exchange: String,
    routing_key: String,
}

struct Unacked {
    queue: String,
    exchange: String,
    routing_key: String,
    body: Vec<u8>,
}

impl InMemoryChannel {
    /// Create an empty channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a queue. Declaring an existing queue is a no-op.
    pub async fn declare_queue(&self, queue: &str) -> Result<(), MessagingError> {
        self.ensure_open()?;
        self.inner
            .queues
            .write()
            .await
            .entry(queue.to_string())
            .or_insert_with(QueueState::new);
        debug!(queue = queue, "Queue declared");
        Ok(())
    }

    /// Bind a queue to an exchange, declaring the queue if needed
    pub async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), MessagingError> {
        self.declare_queue(queue).await?;

        let binding = Binding {
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
        };
        let mut bindings = self.inner.bindings.write().await;
        if !bindings.contains(&binding) {
            bindings.push(binding);
        }
        debug!(
            queue = queue,
            exchange = exchange,
            routing_key = routing_key,
            "Queue bound to exchange"
        );
        Ok(())
    }

    /// Delivery tags acknowledged so far, in order
    pub async fn acked(&self) -> Vec<u64> {
        self.inner.acked.lock().await.clone()
    }

    /// Delivery tags rejected so far with their requeue flag, in order
    pub async fn rejected(&self) -> Vec<(u64, bool)> {
        self.inner.rejected.lock().await.clone()
    }

    /// Number of deliveries handed out and not yet settled
    pub async fn unacked_count(&self) -> usize {
        self.inner.unacked.lock().await.len()
    }

    /// Whether the channel has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), MessagingError> {
        if self.is_closed() {
            return Err(MessagingError::ChannelClosed(
                "in-memory channel is closed".to_string(),
            ));
        }
        Ok(())
    }
}

impl Inner {
    async fn route(&self, exchange: &str, routing_key: &str) -> Vec<String> {
        if exchange.is_empty() {
            return vec![routing_key.to_string()];
        }

        self.bindings
            .read()
            .await
            .iter()
            .filter(|b| b.exchange == exchange && b.routing_key == routing_key)
            .map(|b| b.queue.clone())
            .collect()
    }
}

impl InMemoryChannel {
    async fn enqueue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
        redelivered: bool,
    ) -> bool {
        let queues = self.inner.queues.read().await;
        let Some(state) = queues.get(queue) else {
            return false;
        };

        let delivery_tag = self.inner.next_tag.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.unacked.lock().await.insert(
            delivery_tag,
            Unacked {
                queue: queue.to_string(),
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                body: body.clone(),
            },
        );

        let acker: Arc<dyn Acknowledger> = Arc::new(self.clone());
        let delivery = Delivery::new(delivery_tag, exchange, routing_key, body, acker)
            .with_redelivered(redelivered);

        // Fails once the queue's consumer stream has been dropped.
        if state.sender.send(delivery).is_err() {
            self.inner.unacked.lock().await.remove(&delivery_tag);
            debug!(queue = queue, delivery_tag, "Consumer gone, message dropped");
            return false;
        }
        true
    }
}

#[async_trait]
impl Acknowledger for InMemoryChannel {
    async fn ack(&self, delivery_tag: u64) -> Result<(), MessagingError> {
        if self.inner.unacked.lock().await.remove(&delivery_tag).is_none() {
            return Err(MessagingError::Acknowledge(format!(
                "unknown delivery tag {delivery_tag}"
            )));
        }
        self.inner.acked.lock().await.push(delivery_tag);
        Ok(())
    }

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), MessagingError> {
        let unacked = self
            .inner
            .unacked
            .lock()
            .await
            .remove(&delivery_tag)
            .ok_or_else(|| {
                MessagingError::Acknowledge(format!("unknown delivery tag {delivery_tag}"))
            })?;
        self.inner.rejected.lock().await.push((delivery_tag, requeue));

        if requeue && !self.is_closed() {
            // Redelivered under a fresh tag, as a broker would.
            self.enqueue(
                &unacked.queue,
                &unacked.exchange,
                &unacked.routing_key,
                unacked.body,
                true,
            )
            .await;
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerChannel for InMemoryChannel {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), MessagingError> {
        self.ensure_open()?;

        let queues = self.inner.route(exchange, routing_key).await;
        let mut delivered = 0;
        for queue in &queues {
            if self
                .enqueue(queue, exchange, routing_key, payload.to_vec(), false)
                .await
            {
                delivered += 1;
            }
        }

        debug!(
            exchange = exchange,
            routing_key = routing_key,
            queues = delivered,
            "Published message"
        );
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, MessagingError> {
        self.ensure_open()?;
        self.declare_queue(queue).await?;

        let receiver = self
            .inner
            .queues
            .write()
            .await
            .get_mut(queue)
            .and_then(|state| state.receiver.take())
            .ok_or_else(|| {
                MessagingError::Consume(format!("queue '{queue}' already has a consumer"))
            })?;

        let deliveries = stream::unfold(receiver, |mut receiver| async move {
            receiver
                .recv()
                .await
                .map(|delivery| (Ok::<_, MessagingError>(delivery), receiver))
        });

        Ok(Box::pin(deliveries))
    }

    async fn close(&self) -> Result<(), MessagingError> {
        self.inner.closed.store(true, Ordering::SeqCst);
        // Dropping the senders ends every consumer stream once drained.
        self.inner.queues.write().await.clear();
        debug!("In-memory channel closed");
        Ok(())
    }
}
