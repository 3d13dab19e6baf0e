//! Integration tests for courier-messaging

use courier_events::{Completion, Envelope, Event, EventDispatcher, SharedHandler, handler_fn};
use courier_messaging::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::Mutex;

#[tokio::test]
async fn test_publish_consume_dispatch_round_trip() {
    let broker = Arc::new(InMemoryChannel::new());
    broker
        .bind_queue("orders", "amq.direct", "order.created")
        .await
        .unwrap();

    // Local producer side: events for "order.created" are externalized.
    let outbound: EventDispatcher<Envelope<Value>> = EventDispatcher::new();
    let publisher: SharedHandler<Envelope<Value>> =
        Arc::new(PublishingHandler::new(broker.clone(), "amq.direct"));
    outbound.register("order.created", publisher).unwrap();
    outbound
        .dispatch(Envelope::new("order.created", json!({"id": "42"})))
        .await
        .unwrap();

    // Consumer side: deliveries are turned back into events.
    let inbound: EventDispatcher<Envelope<Value>> = EventDispatcher::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    inbound
        .register(
            "order.created",
            handler_fn(move |event: Arc<Envelope<Value>>, done: Completion| {
                let sink = sink.clone();
                async move {
                    sink.lock()
                        .unwrap()
                        .push((event.name().to_string(), event.payload().clone()));
                    done.complete();
                }
            }),
        )
        .unwrap();

    let bridge = EventBridge::json(inbound);
    let mut deliveries = broker.consume("orders").await.unwrap();
    let delivery = futures_util::StreamExt::next(&mut deliveries)
        .await
        .unwrap()
        .unwrap();
    let tag = delivery.delivery_tag;

    assert_eq!(
        bridge.process(delivery).await.unwrap(),
        DeliveryOutcome::Acked
    );
    assert_eq!(broker.acked().await, vec![tag]);
    assert_eq!(
        *received.lock().unwrap(),
        vec![("order.created".to_string(), json!({"id": "42"}))]
    );
}

#[tokio::test]
async fn test_publish_json_extension() {
    let broker = InMemoryChannel::new();
    broker.declare_queue("greetings").await.unwrap();

    broker
        .publish_json("", "greetings", &json!({"text": "Hello World"}))
        .await
        .unwrap();

    let bridge = EventBridge::text(EventDispatcher::new());
    let mut deliveries = broker.consume("greetings").await.unwrap();
    let delivery = futures_util::StreamExt::next(&mut deliveries)
        .await
        .unwrap()
        .unwrap();

    // No handlers for "greetings": dispatch is a no-op and the delivery is acked.
    assert_eq!(
        bridge.process(delivery).await.unwrap(),
        DeliveryOutcome::Acked
    );
    assert!(bridge.dispatcher().is_empty());
}

#[test]
fn test_config_round_trips_through_serde() {
    let config = BrokerConfig::default().with_prefetch(4);
    let json = serde_json::to_string(&config).unwrap();
    let back: BrokerConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}
