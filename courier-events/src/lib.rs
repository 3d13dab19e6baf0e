//! In-process event dispatching for Courier
//!
//! This crate maps event names to ordered lists of handlers and dispatches
//! events to every matching handler concurrently.
//!
//! ## Features
//!
//! - **Named routing** - Handlers are registered against event names
//! - **Identity dedup** - A handler instance is registered at most once per name
//! - **Fan-out / join** - Each handler runs on its own task; dispatch waits for all of them
//! - **Opaque payloads** - The payload type is chosen by the producer
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier_events::*;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct OrderCreated {
//!     id: String,
//! }
//!
//! struct SendReceipt;
//!
//! #[async_trait]
//! impl EventHandler<Envelope<OrderCreated>> for SendReceipt {
//!     async fn handle(&self, event: Arc<Envelope<OrderCreated>>, done: Completion) {
//!         println!("Sending receipt for order {}", event.payload().id);
//!         done.complete();
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = EventDispatcher::new();
//!     let receipts: SharedHandler<_> = Arc::new(SendReceipt);
//!
//!     dispatcher.register("order.created", receipts.clone())?;
//!
//!     let event = Envelope::new("order.created", OrderCreated { id: "42".into() });
//!     dispatcher.dispatch(event).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Completion
//!
//! Every handler receives a [`Completion`] and must consume it exactly once.
//! Dispatch returns only after all of them have been consumed. A completion
//! that is dropped unused is reported as [`EventHandlerError::Abandoned`].
//!
//! ## Error Handling
//!
//! ```rust,ignore
//! let dispatcher = DispatcherBuilder::new()
//!     .fail_on_handler_error(true)
//!     .build();
//!
//! match dispatcher.dispatch(event).await {
//!     Ok(()) => println!("All handlers succeeded"),
//!     Err(DispatcherError::HandlersFailed { failures, .. }) => {
//!         eprintln!("Some handlers failed: {:?}", failures);
//!     }
//!     Err(e) => eprintln!("Dispatch error: {}", e),
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handler;

pub use config::{DispatcherBuilder, DispatcherConfig};
pub use dispatcher::{DispatchReport, Dispatcher, EventDispatcher};
pub use error::{DispatcherError, HandlerFailure, Result};
pub use event::{Envelope, Event, EventMetadata};
pub use handler::{
    Completion, EventHandler, EventHandlerError, FnHandler, SharedHandler, handler_fn,
    same_handler,
};
