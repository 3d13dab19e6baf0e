//! Integration tests for courier-events

use async_trait::async_trait;
use courier_events::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

type OrderEvent = Envelope<Value>;

/// Records what it saw, then signals completion after an optional delay.
struct RecordingHandler {
    label: &'static str,
    delay: Duration,
    seen: Arc<Mutex<Vec<(&'static str, String, String)>>>,
}

#[async_trait]
impl EventHandler<OrderEvent> for RecordingHandler {
    async fn handle(&self, event: Arc<OrderEvent>, done: Completion) {
        tokio::time::sleep(self.delay).await;
        let id = event.payload()["id"].as_str().unwrap_or_default().to_string();
        self.seen
            .lock()
            .unwrap()
            .push((self.label, event.name().to_string(), id));
        done.complete();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_order_created_reaches_every_handler() {
    let dispatcher: EventDispatcher<OrderEvent> = EventDispatcher::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let a: SharedHandler<OrderEvent> = Arc::new(RecordingHandler {
        label: "a",
        delay: Duration::from_millis(40),
        seen: seen.clone(),
    });
    let b: SharedHandler<OrderEvent> = Arc::new(RecordingHandler {
        label: "b",
        delay: Duration::from_millis(5),
        seen: seen.clone(),
    });

    dispatcher.register("order.created", a.clone()).unwrap();
    dispatcher.register("order.created", b.clone()).unwrap();

    dispatcher
        .dispatch(Envelope::new("order.created", json!({"id": "42"})))
        .await
        .unwrap();

    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("a", "order.created".to_string(), "42".to_string()),
            ("b", "order.created".to_string(), "42".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_registry_lifecycle() {
    let dispatcher: EventDispatcher<OrderEvent> = DispatcherBuilder::new().build();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler: SharedHandler<OrderEvent> = Arc::new(RecordingHandler {
        label: "only",
        delay: Duration::ZERO,
        seen: seen.clone(),
    });

    dispatcher.register("order.created", handler.clone()).unwrap();
    assert!(dispatcher.has("order.created", &handler));
    assert!(matches!(
        dispatcher.register("order.created", handler.clone()),
        Err(DispatcherError::HandlerAlreadyExists { .. })
    ));

    dispatcher.remove("order.created", &handler);
    assert!(!dispatcher.has("order.created", &handler));

    dispatcher
        .dispatch(Envelope::new("order.created", json!({"id": "1"})))
        .await
        .unwrap();
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_many_concurrent_dispatches() {
    let dispatcher: EventDispatcher<OrderEvent> = DispatcherBuilder::new()
        .enable_logging(false)
        .build();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for label in ["x", "y"] {
        let handler: SharedHandler<OrderEvent> = Arc::new(RecordingHandler {
            label,
            delay: Duration::from_millis(1),
            seen: seen.clone(),
        });
        dispatcher.register("order.created", handler).unwrap();
    }

    let dispatches = (0..10).map(|i| {
        let dispatcher = dispatcher.clone();
        async move {
            dispatcher
                .dispatch(Envelope::new("order.created", json!({"id": i.to_string()})))
                .await
        }
    });

    for result in futures::future::join_all(dispatches).await {
        result.unwrap();
    }

    assert_eq!(seen.lock().unwrap().len(), 20);
}
