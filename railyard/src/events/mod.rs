//! Event broadcasting for observability.
//!
//! Lifecycle events flow through a typed [`EventBus`] (a tokio broadcast
//! channel of [`PipelineEvent`]); publishing never blocks and never
//! fails the orchestrator. [`EventSink`]s provide a push interface for
//! logging and test collection on top of the bus.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::core::PipelineEvent;

/// Default buffer size for the broadcast channel.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// A typed publish/subscribe channel for lifecycle events.
///
/// Cloning the bus is cheap; all clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
    sink: Arc<dyn EventSink>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl EventBus {
    /// Creates a bus with the given channel capacity and a no-op sink.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Creates a bus that also forwards every event to the given sink.
    #[must_use]
    pub fn with_sink(capacity: usize, sink: Arc<dyn EventSink>) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, sink }
    }

    /// Subscribes to the event stream.
    ///
    /// Slow subscribers that lag behind the channel capacity miss
    /// events rather than applying backpressure to the orchestrator.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event.
    ///
    /// A send error only means there are no subscribers; it is ignored.
    pub fn publish(&self, event: PipelineEvent) {
        self.sink.try_emit(event.event_type(), Some(event.to_json()));
        if self.tx.send(event.clone()).is_err() {
            debug!(event_type = %event.event_type(), "no event subscribers");
        }
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
