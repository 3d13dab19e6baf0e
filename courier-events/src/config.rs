//! Dispatcher configuration

use crate::dispatcher::EventDispatcher;
use crate::event::Event;

/// Event dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Return an error from dispatch when any handler signals a failure.
    ///
    /// Every handler is still joined before the error is returned.
    pub fail_on_handler_error: bool,

    /// Enable event logging
    pub enable_logging: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            fail_on_handler_error: false,
            enable_logging: true,
        }
    }
}

/// Event dispatcher builder
///
/// ```rust,ignore
/// let dispatcher = DispatcherBuilder::new()
///     .fail_on_handler_error(true)
///     .enable_logging(false)
///     .build::<Envelope<OrderCreated>>();
/// ```
#[derive(Debug, Default)]
pub struct DispatcherBuilder {
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    /// Create new dispatcher builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable/disable surfacing handler failures from dispatch
    pub fn fail_on_handler_error(mut self, enabled: bool) -> Self {
        self.config.fail_on_handler_error = enabled;
        self
    }

    /// Enable/disable logging
    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.config.enable_logging = enabled;
        self
    }

    /// Get the configuration built so far
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Build the dispatcher
    pub fn build<E: Event>(self) -> EventDispatcher<E> {
        EventDispatcher::with_config(self.config)
    }
}
