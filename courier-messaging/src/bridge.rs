//! Glue between a broker channel and an [`EventDispatcher`]
//!
//! [`EventBridge`] turns consumed deliveries into events and dispatches them.
//! [`PublishingHandler`] goes the other way: registered on a dispatcher, it
//! publishes every event it receives to an exchange.

use async_trait::async_trait;
use courier_events::{
    Completion, Envelope, Event, EventDispatcher, EventHandler, EventHandlerError,
};
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::MessagingError;
use crate::message::Delivery;
use crate::traits::{BrokerChannel, DeliveryStream};

/// Turns a delivery into an event.
pub type DeliveryDecoder<E> = Arc<dyn Fn(&Delivery) -> Result<E, MessagingError> + Send + Sync>;

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Dispatched successfully and acknowledged
    Acked,
    /// Could not be decoded; rejected without requeue
    Rejected,
    /// Dispatch failed; rejected with requeue
    Requeued,
}

/// Counters for one [`EventBridge::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub received: u64,
    pub acked: u64,
    pub rejected: u64,
    pub requeued: u64,
}

impl BridgeStats {
    fn record(&mut self, outcome: DeliveryOutcome) {
        self.received += 1;
        match outcome {
            DeliveryOutcome::Acked => self.acked += 1,
            DeliveryOutcome::Rejected => self.rejected += 1,
            DeliveryOutcome::Requeued => self.requeued += 1,
        }
    }
}

/// Feeds consumed deliveries into a dispatcher.
pub struct EventBridge<E: Event> {
    dispatcher: EventDispatcher<E>,
    decoder: DeliveryDecoder<E>,
}

impl<E: Event> EventBridge<E> {
    /// Create a bridge with a custom decoder
    pub fn new<F>(dispatcher: EventDispatcher<E>, decoder: F) -> Self
    where
        F: Fn(&Delivery) -> Result<E, MessagingError> + Send + Sync + 'static,
    {
        Self {
            dispatcher,
            decoder: Arc::new(decoder),
        }
    }

    /// The dispatcher deliveries are fed into
    pub fn dispatcher(&self) -> &EventDispatcher<E> {
        &self.dispatcher
    }

    /// Decode, dispatch and settle a single delivery.
    ///
    /// Errors are returned only when settling the delivery with the broker fails.
    pub async fn process(&self, delivery: Delivery) -> Result<DeliveryOutcome, MessagingError> {
        let event = match (self.decoder)(&delivery) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    delivery_tag = delivery.delivery_tag,
                    routing_key = %delivery.routing_key,
                    error = %e,
                    "Rejecting undecodable delivery"
                );
                delivery.reject(false).await?;
                return Ok(DeliveryOutcome::Rejected);
            }
        };

        match self.dispatcher.dispatch(event).await {
            Ok(()) => {
                delivery.ack().await?;
                Ok(DeliveryOutcome::Acked)
            }
            Err(e) => {
                error!(
                    delivery_tag = delivery.delivery_tag,
                    error = %e,
                    "Dispatch failed, requeueing delivery"
                );
                delivery.reject(true).await?;
                Ok(DeliveryOutcome::Requeued)
            }
        }
    }

    /// Process deliveries until the stream ends.
    ///
    /// Deliveries are handled one at a time, in arrival order.
    pub async fn run(&self, mut deliveries: DeliveryStream) -> Result<BridgeStats, MessagingError> {
        let mut stats = BridgeStats::default();

        while let Some(item) = deliveries.next().await {
            let delivery = item?;
            let outcome = self.process(delivery).await?;
            stats.record(outcome);
        }

        info!(
            received = stats.received,
            acked = stats.acked,
            rejected = stats.rejected,
            requeued = stats.requeued,
            "Delivery stream ended"
        );
        Ok(stats)
    }
}

impl EventBridge<Envelope<Value>> {
    /// Create a bridge that decodes JSON bodies with [`decode_json`]
    pub fn json(dispatcher: EventDispatcher<Envelope<Value>>) -> Self {
        Self::new(dispatcher, decode_json)
    }
}

impl EventBridge<Envelope<String>> {
    /// Create a bridge that decodes UTF-8 bodies with [`decode_text`]
    pub fn text(dispatcher: EventDispatcher<Envelope<String>>) -> Self {
        Self::new(dispatcher, decode_text)
    }
}

/// Decode a JSON body.
///
/// Bodies produced by [`PublishingHandler`] are restored as the original
/// envelope. Any other JSON document becomes the payload of a new envelope
/// named after the routing key.
pub fn decode_json(delivery: &Delivery) -> Result<Envelope<Value>, MessagingError> {
    let value: Value = delivery.parse_json()?;

    let is_envelope = value
        .as_object()
        .map(|o| o.contains_key("id") && o.contains_key("name") && o.contains_key("payload"))
        .unwrap_or(false);
    if is_envelope {
        if let Ok(envelope) = serde_json::from_value::<Envelope<Value>>(value.clone()) {
            return Ok(envelope);
        }
    }

    Ok(Envelope::new(delivery.routing_key.clone(), value))
}

/// Decode a UTF-8 body into an envelope named after the routing key.
pub fn decode_text(delivery: &Delivery) -> Result<Envelope<String>, MessagingError> {
    Ok(Envelope::new(
        delivery.routing_key.clone(),
        delivery.body_str()?.to_string(),
    ))
}

/// Handler that publishes every event it receives.
///
/// The event is serialized as JSON and published to `exchange` with the
/// event name as routing key.
pub struct PublishingHandler<C: ?Sized> {
    channel: Arc<C>,
    exchange: String,
}

impl<C: BrokerChannel + ?Sized> PublishingHandler<C> {
    /// Create a handler publishing through `channel` to `exchange`
    pub fn new(channel: Arc<C>, exchange: impl Into<String>) -> Self {
        Self {
            channel,
            exchange: exchange.into(),
        }
    }

    /// Exchange events are published to
    pub fn exchange(&self) -> &str {
        &self.exchange
    }
}

#[async_trait]
impl<E, C> EventHandler<E> for PublishingHandler<C>
where
    E: Event + Serialize,
    C: BrokerChannel + ?Sized + 'static,
{
    async fn handle(&self, event: Arc<E>, done: Completion) {
        let body = match serde_json::to_vec(&*event) {
            Ok(body) => body,
            Err(e) => {
                done.fail(EventHandlerError::ProcessingError(e.to_string()));
                return;
            }
        };

        let result = self
            .channel
            .publish(&self.exchange, event.name(), &body)
            .await
            .map_err(|e| EventHandlerError::HandlerFailed(e.to_string()));

        if result.is_ok() {
            debug!(exchange = %self.exchange, event = event.name(), "Event externalized");
        }
        done.finish(result);
    }
}
