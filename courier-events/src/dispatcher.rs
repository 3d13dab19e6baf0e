//! Event dispatcher implementation

use crate::config::DispatcherConfig;
use crate::error::{DispatcherError, HandlerFailure, Result};
use crate::event::Event;
use crate::handler::{Completion, SharedHandler, same_handler};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Dispatcher contract
#[async_trait]
pub trait Dispatcher<E: Event>: Send + Sync {
    /// Append a handler to the sequence for `event_name`
    fn register(&self, event_name: &str, handler: SharedHandler<E>) -> Result<()>;

    /// Remove a handler from the sequence for `event_name`, if present
    fn remove(&self, event_name: &str, handler: &SharedHandler<E>);

    /// Check whether `handler` is registered for `event_name`
    fn has(&self, event_name: &str, handler: &SharedHandler<E>) -> bool;

    /// Drop every registration
    fn clear(&self);

    /// Invoke every handler registered for the event's name and wait for all of them
    async fn dispatch(&self, event: Arc<E>) -> Result<()>;
}

/// In-process event dispatcher
///
/// Maps event names to ordered handler sequences. Registration order is kept
/// and a handler instance appears at most once per name.
///
/// Each name's sequence sits behind a shard lock of the underlying map, so
/// register, remove and dispatch may be called from any task. Dispatch works on
/// a snapshot of the sequence taken before fan-out; registrations made while a
/// dispatch is in flight apply to the next dispatch. [`clear`](Self::clear) is
/// not atomic with respect to concurrent registrations.
///
/// Cloning is cheap and clones share the same registry.
pub struct EventDispatcher<E: Event> {
    /// Handlers registered for each event name
    handlers: Arc<DashMap<String, Vec<SharedHandler<E>>>>,

    /// Configuration
    config: Arc<DispatcherConfig>,
}

/// Result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Name of the dispatched event
    pub event_name: String,

    /// Number of handlers that signaled completion
    pub handled: usize,

    /// Failures signaled by handlers, in registration order
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    fn empty(event_name: String) -> Self {
        Self {
            event_name,
            handled: 0,
            failures: Vec::new(),
        }
    }

    /// True when no handler reported a failure
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<E: Event> EventDispatcher<E> {
    /// Create new event dispatcher
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    /// Create event dispatcher with custom config
    pub fn with_config(config: DispatcherConfig) -> Self {
        Self {
            handlers: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    /// Get the dispatcher configuration
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Register a handler for an event name
    ///
    /// Fails with [`DispatcherError::HandlerAlreadyExists`] if this exact
    /// handler instance is already registered for the name; the registry is
    /// left unchanged in that case.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let dispatcher = EventDispatcher::new();
    /// let handler: SharedHandler<OrderEvent> = Arc::new(SendReceipt::new());
    /// dispatcher.register("order.created", handler.clone())?;
    /// ```
    pub fn register(&self, event_name: impl Into<String>, handler: SharedHandler<E>) -> Result<()> {
        let event_name = event_name.into();
        let mut handlers = self.handlers.entry(event_name.clone()).or_default();

        if handlers.iter().any(|existing| same_handler(existing, &handler)) {
            return Err(DispatcherError::HandlerAlreadyExists { event_name });
        }

        handlers.push(handler);
        let count = handlers.len();
        drop(handlers);

        if self.config.enable_logging {
            debug!(event = %event_name, handlers = count, "Registered handler");
        }

        Ok(())
    }

    /// Remove a handler from an event name
    ///
    /// Unknown names and unregistered handlers are ignored.
    pub fn remove(&self, event_name: &str, handler: &SharedHandler<E>) {
        let removed = match self.handlers.get_mut(event_name) {
            Some(mut handlers) => {
                match handlers
                    .iter()
                    .position(|existing| same_handler(existing, handler))
                {
                    Some(index) => {
                        handlers.remove(index);
                        true
                    }
                    None => false,
                }
            }
            None => false,
        };

        if removed {
            self.handlers
                .remove_if(event_name, |_, handlers| handlers.is_empty());

            if self.config.enable_logging {
                debug!(event = %event_name, "Removed handler");
            }
        }
    }

    /// Check whether a handler is registered for an event name
    pub fn has(&self, event_name: &str, handler: &SharedHandler<E>) -> bool {
        self.handlers
            .get(event_name)
            .map(|handlers| {
                handlers
                    .iter()
                    .any(|existing| same_handler(existing, handler))
            })
            .unwrap_or(false)
    }

    /// Clear all handlers
    pub fn clear(&self) {
        self.handlers.clear();
        if self.config.enable_logging {
            info!("Cleared all event handlers");
        }
    }

    /// Remove every handler registered for an event name
    ///
    /// Returns the number of handlers removed.
    pub fn remove_all(&self, event_name: &str) -> usize {
        let removed = self
            .handlers
            .remove(event_name)
            .map(|(_, handlers)| handlers.len())
            .unwrap_or(0);

        if removed > 0 && self.config.enable_logging {
            debug!(event = %event_name, handlers = removed, "Removed all handlers for event");
        }

        removed
    }

    /// Get handler count for an event name
    pub fn handler_count(&self, event_name: &str) -> usize {
        self.handlers
            .get(event_name)
            .map(|h| h.len())
            .unwrap_or(0)
    }

    /// Snapshot of the handlers registered for an event name, in registration order
    pub fn handlers(&self, event_name: &str) -> Vec<SharedHandler<E>> {
        self.handlers
            .get(event_name)
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Names that currently have at least one handler
    pub fn event_names(&self) -> Vec<String> {
        self.handlers
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// True when no handler is registered under any name
    pub fn is_empty(&self) -> bool {
        self.handlers.iter().all(|entry| entry.value().is_empty())
    }

    /// Dispatch an event
    ///
    /// Every handler registered for the event's name is invoked on its own task
    /// with a shared reference to the event. Returns once every invoked handler
    /// has signaled completion. An event nobody listens to is a silent no-op.
    ///
    /// Handler failures are logged; they are returned as
    /// [`DispatcherError::HandlersFailed`] only when the dispatcher was built
    /// with `fail_on_handler_error`.
    pub async fn dispatch(&self, event: impl Into<Arc<E>>) -> Result<()> {
        let report = self.dispatch_with_report(event).await?;

        if self.config.fail_on_handler_error && !report.is_success() {
            return Err(DispatcherError::HandlersFailed {
                event_name: report.event_name,
                failures: report.failures,
            });
        }

        Ok(())
    }

    /// Dispatch an event and return what every handler reported
    pub async fn dispatch_with_report(&self, event: impl Into<Arc<E>>) -> Result<DispatchReport> {
        let event: Arc<E> = event.into();
        let event_name = event.name().to_string();

        let handlers = match self.handlers.get(&event_name) {
            Some(handlers) if !handlers.is_empty() => handlers.clone(),
            _ => {
                if self.config.enable_logging {
                    debug!(event = %event_name, "No handlers registered for event");
                }
                return Ok(DispatchReport::empty(event_name));
            }
        };

        // Checked before spawning anything so a failure never leaves handlers unjoined.
        let runtime = Handle::try_current()
            .map_err(|e| DispatcherError::RuntimeUnavailable(e.to_string()))?;

        if self.config.enable_logging {
            info!(event = %event_name, handlers = handlers.len(), "Dispatching event");
        }

        // One slot per handler; each Completion sends exactly one outcome and
        // the channel closes once the last of them is gone.
        let (signal, mut outcomes) = mpsc::channel(handlers.len());
        for (position, handler) in handlers.into_iter().enumerate() {
            let event = event.clone();
            let done = Completion::new(position, signal.clone());
            runtime.spawn(async move {
                handler.handle(event, done).await;
            });
        }
        drop(signal);

        let mut report = DispatchReport::empty(event_name);
        while let Some(outcome) = outcomes.recv().await {
            report.handled += 1;
            if let Err(error) = outcome.result {
                if self.config.enable_logging {
                    warn!(
                        event = %report.event_name,
                        position = outcome.position,
                        error = %error,
                        "Handler reported failure"
                    );
                }
                report.failures.push(HandlerFailure {
                    position: outcome.position,
                    error,
                });
            }
        }
        report.failures.sort_by_key(|failure| failure.position);

        if self.config.enable_logging {
            debug!(
                event = %report.event_name,
                handled = report.handled,
                failed = report.failures.len(),
                "Event dispatched"
            );
        }

        Ok(report)
    }
}

impl<E: Event> Clone for EventDispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
            config: self.config.clone(),
        }
    }
}

impl<E: Event> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Event> Dispatcher<E> for EventDispatcher<E> {
    fn register(&self, event_name: &str, handler: SharedHandler<E>) -> Result<()> {
        EventDispatcher::register(self, event_name, handler)
    }

    fn remove(&self, event_name: &str, handler: &SharedHandler<E>) {
        EventDispatcher::remove(self, event_name, handler)
    }

    fn has(&self, event_name: &str, handler: &SharedHandler<E>) -> bool {
        EventDispatcher::has(self, event_name, handler)
    }

    fn clear(&self) {
        EventDispatcher::clear(self)
    }

    async fn dispatch(&self, event: Arc<E>) -> Result<()> {
        EventDispatcher::dispatch(self, event).await
    }
}
