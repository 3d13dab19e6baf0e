// Courier - in-process event dispatching for Rust
//
// Handlers are registered per event name and run concurrently when an event
// is dispatched. The dispatch call returns once every handler has signalled
// completion. A broker adapter for RabbitMQ lives behind the `messaging` and
// `rabbitmq` features.

// Re-export the dispatcher
pub use courier_events::*;

// Re-export optional crates
#[cfg(feature = "messaging")]
pub use courier_messaging as messaging;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Completion, Dispatcher, DispatcherBuilder, DispatcherConfig, DispatcherError, Envelope,
        Event, EventDispatcher, EventHandler, EventHandlerError, SharedHandler, handler_fn,
    };

    #[cfg(feature = "messaging")]
    pub use crate::messaging::{BrokerChannel, BrokerConfig, EventBridge, PublishingHandler};
}
