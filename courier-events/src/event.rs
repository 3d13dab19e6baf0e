//! Event definitions and traits

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use uuid::Uuid;

/// Event trait
///
/// Anything routed through an [`EventDispatcher`](crate::EventDispatcher) implements
/// this trait. The name is the routing key; the payload is carried through
/// untouched and never inspected by the dispatcher.
pub trait Event: Send + Sync + Debug + 'static {
    /// Payload type, chosen by the producer
    type Payload: Send + Sync;

    /// Get event name
    fn name(&self) -> &str;

    /// Get event timestamp
    fn timestamp(&self) -> DateTime<Utc>;

    /// Get event payload
    fn payload(&self) -> &Self::Payload;
}

/// Base event metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event ID
    pub id: Uuid,

    /// Event name (routing key)
    pub name: String,

    /// Timestamp when event was created
    pub timestamp: DateTime<Utc>,

    /// Optional correlation ID for tracing
    pub correlation_id: Option<Uuid>,

    /// Optional causation ID (ID of the event that caused this event)
    pub causation_id: Option<Uuid>,
}

impl EventMetadata {
    /// Create new event metadata
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            causation_id: None,
        }
    }

    /// Set correlation ID
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Set causation ID
    pub fn with_causation_id(mut self, id: Uuid) -> Self {
        self.causation_id = Some(id);
        self
    }
}

/// General purpose event: metadata plus an opaque payload.
///
/// ```rust,ignore
/// let event = Envelope::new("order.created", json!({"id": "42"}));
/// assert_eq!(event.name(), "order.created");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<P> {
    /// Event metadata
    #[serde(flatten)]
    pub metadata: EventMetadata,

    /// Event payload
    pub payload: P,
}

impl<P> Envelope<P> {
    /// Create a new envelope stamped with the current time
    pub fn new(name: impl Into<String>, payload: P) -> Self {
        Self {
            metadata: EventMetadata::new(name),
            payload,
        }
    }

    /// Create an envelope from existing metadata
    pub fn with_metadata(metadata: EventMetadata, payload: P) -> Self {
        Self { metadata, payload }
    }

    /// Get event ID
    pub fn id(&self) -> Uuid {
        self.metadata.id
    }

    /// Consume the envelope, returning the payload
    pub fn into_payload(self) -> P {
        self.payload
    }
}

impl<P> Event for Envelope<P>
where
    P: Send + Sync + Debug + 'static,
{
    type Payload = P;

    fn name(&self) -> &str {
        &self.metadata.name
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.metadata.timestamp
    }

    fn payload(&self) -> &P {
        &self.payload
    }
}
