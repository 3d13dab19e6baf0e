//! # Courier Messaging
//!
//! Broker adapter for Courier.
//!
//! The dispatcher in `courier-events` never talks to a broker. This crate sits
//! next to it and provides:
//! - **Channels** - [`BrokerChannel`]: publish bytes to an exchange, consume a queue
//! - **RabbitMQ** - [`rabbitmq::open_channel`] (feature `rabbitmq`)
//! - **In-memory** - [`InMemoryChannel`], for tests and local wiring
//! - **Bridge** - [`EventBridge`] turns deliveries into dispatched events,
//!   [`PublishingHandler`] publishes local events
//!
//! ## Features
//!
//! - `rabbitmq` - RabbitMQ/AMQP support via `lapin`
//!
//! ## Example
//!
//! ```rust,ignore
//! use courier_events::{Envelope, EventDispatcher};
//! use courier_messaging::{BrokerChannel, BrokerConfig, EventBridge, rabbitmq};
//!
//! async fn consume() -> Result<(), MessagingError> {
//!     let config = BrokerConfig::from_env()?;
//!     let channel = rabbitmq::open_channel(&config).await?;
//!
//!     let dispatcher = EventDispatcher::new();
//!     // dispatcher.register(...)
//!
//!     let deliveries = channel.consume(&config.queue).await?;
//!     EventBridge::json(dispatcher).run(deliveries).await?;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod memory;
pub mod message;
pub mod traits;

#[cfg(feature = "rabbitmq")]
pub mod rabbitmq;

pub use bridge::{
    BridgeStats, DeliveryDecoder, DeliveryOutcome, EventBridge, PublishingHandler, decode_json,
    decode_text,
};
pub use config::BrokerConfig;
pub use error::MessagingError;
pub use memory::InMemoryChannel;
pub use message::{Acknowledger, Delivery};
pub use traits::{BrokerChannel, BrokerChannelExt, DeliveryStream};
