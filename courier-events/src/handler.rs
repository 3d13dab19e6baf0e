//! Event handlers and the completion signal

use crate::event::Event;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Event handler trait
///
/// A handler is invoked once per dispatch of a matching event name, on its own
/// task. It must hand back `done` through [`Completion::complete`],
/// [`Completion::fail`] or [`Completion::finish`]; the dispatch that invoked it
/// does not return until it has.
///
/// Handlers registered for the same name run concurrently with each other.
/// Shared state touched by a handler has to be synchronized by the handler.
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync + 'static {
    /// Handle the event
    async fn handle(&self, event: Arc<E>, done: Completion);
}

/// Shared, identity-compared handler reference.
pub type SharedHandler<E> = Arc<dyn EventHandler<E>>;

/// Returns true when both references point at the same handler instance.
///
/// Only the data address is compared, so two handlers with identical
/// behavior but separate allocations are distinct.
pub fn same_handler<E: Event>(a: &SharedHandler<E>, b: &SharedHandler<E>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Event handler error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventHandlerError {
    #[error("Handler failed: {0}")]
    HandlerFailed(String),

    #[error("Event processing error: {0}")]
    ProcessingError(String),

    #[error("Handler released its completion signal without signaling")]
    Abandoned,
}

/// What a single handler reported back to the dispatch that invoked it.
#[derive(Debug)]
pub(crate) struct HandlerOutcome {
    pub(crate) position: usize,
    pub(crate) result: Result<(), EventHandlerError>,
}

/// Completion signal handed to every handler invocation.
///
/// Signaling consumes the value, so a handler can signal at most once. A
/// signal dropped without being used still counts toward the join, reported
/// as [`EventHandlerError::Abandoned`]; this also covers handlers that panic.
#[derive(Debug)]
pub struct Completion {
    position: usize,
    signal: Option<mpsc::Sender<HandlerOutcome>>,
}

impl Completion {
    pub(crate) fn new(position: usize, signal: mpsc::Sender<HandlerOutcome>) -> Self {
        Self {
            position,
            signal: Some(signal),
        }
    }

    /// Position of the handler in its event's registration order
    pub fn position(&self) -> usize {
        self.position
    }

    /// Signal successful completion
    pub fn complete(self) {
        self.finish(Ok(()));
    }

    /// Signal completion with an error
    pub fn fail(self, error: EventHandlerError) {
        self.finish(Err(error));
    }

    /// Signal completion with the given result
    pub fn finish(mut self, result: Result<(), EventHandlerError>) {
        self.send(result);
    }

    fn send(&mut self, result: Result<(), EventHandlerError>) {
        if let Some(signal) = self.signal.take() {
            // The channel is sized to the number of invoked handlers, so it is
            // never full. It is closed only if the dispatching future was dropped.
            let _ = signal.try_send(HandlerOutcome {
                position: self.position,
                result,
            });
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.send(Err(EventHandlerError::Abandoned));
    }
}

/// Handler backed by a closure. Build one with [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<E, F, Fut> EventHandler<E> for FnHandler<F>
where
    E: Event,
    F: Fn(Arc<E>, Completion) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, event: Arc<E>, done: Completion) {
        (self.f)(event, done).await
    }
}

/// Wrap a closure as a shared handler.
///
/// # Examples
///
/// ```rust,ignore
/// let handler = handler_fn(|event: Arc<Envelope<String>>, done| async move {
///     println!("{}", event.payload());
///     done.complete();
/// });
/// dispatcher.register("greeting", handler.clone())?;
/// ```
pub fn handler_fn<E, F, Fut>(f: F) -> SharedHandler<E>
where
    E: Event,
    F: Fn(Arc<E>, Completion) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Envelope;

    type TestEvent = Envelope<String>;

    struct NoopHandler;

    #[async_trait]
    impl EventHandler<TestEvent> for NoopHandler {
        async fn handle(&self, _event: Arc<TestEvent>, done: Completion) {
            done.complete();
        }
    }

    #[test]
    fn test_same_handler_is_identity_based() {
        let a: SharedHandler<TestEvent> = Arc::new(NoopHandler);
        let b: SharedHandler<TestEvent> = Arc::new(NoopHandler);
        let a2 = a.clone();

        assert!(same_handler(&a, &a2));
        assert!(!same_handler(&a, &b));
    }

    #[test]
    fn test_completion_signals_once() {
        let (tx, mut rx) = mpsc::channel(1);
        let done = Completion::new(3, tx);
        assert_eq!(done.position(), 3);

        done.complete();

        let outcome = rx.try_recv().unwrap();
        assert_eq!(outcome.position, 3);
        assert_eq!(outcome.result, Ok(()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_completion_carries_error() {
        let (tx, mut rx) = mpsc::channel(1);
        Completion::new(0, tx).fail(EventHandlerError::HandlerFailed("boom".into()));

        let outcome = rx.try_recv().unwrap();
        assert_eq!(
            outcome.result,
            Err(EventHandlerError::HandlerFailed("boom".into()))
        );
    }

    #[test]
    fn test_dropped_completion_reports_abandoned() {
        let (tx, mut rx) = mpsc::channel(1);
        drop(Completion::new(1, tx));

        let outcome = rx.try_recv().unwrap();
        assert_eq!(outcome.result, Err(EventHandlerError::Abandoned));
    }

    #[test]
    fn test_signal_after_dispatch_dropped_is_ignored() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        Completion::new(0, tx).complete();
    }

    #[tokio::test]
    async fn test_handler_fn_invokes_closure() {
        let handler = handler_fn(|event: Arc<TestEvent>, done: Completion| async move {
            if event.payload() == "ok" {
                done.complete();
            } else {
                done.fail(EventHandlerError::ProcessingError(event.payload().clone()));
            }
        });

        let (tx, mut rx) = mpsc::channel(2);
        handler
            .handle(Arc::new(Envelope::new("t", "ok".to_string())), Completion::new(0, tx.clone()))
            .await;
        handler
            .handle(Arc::new(Envelope::new("t", "bad".to_string())), Completion::new(1, tx))
            .await;

        assert_eq!(rx.recv().await.unwrap().result, Ok(()));
        assert_eq!(
            rx.recv().await.unwrap().result,
            Err(EventHandlerError::ProcessingError("bad".into()))
        );
    }
}
