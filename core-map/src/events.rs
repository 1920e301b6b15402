//! # Handle Event Bus
//!
//! Session notifications published by [`Handles`](crate::Handles) over
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Streams carry the data of a session (positions, nearby lists). Everything
//! else a host may want to react to, such as a peer's trip status or the end
//! of a peer session, is published here as a [`HandleEvent`]:
//!
//! ```text
//! ┌──────────────────┐   publish   ┌───────────┐   subscribe   ┌────────────┐
//! │ peer_direction / ├────────────>│           ├──────────────>│ Subscriber │
//! │ navigation       │             │ EventBus  │               └────────────┘
//! └──────────────────┘             │ (broadcast│
//! ┌──────────────────┐   publish   │  channel) │   subscribe   ┌────────────┐
//! │ nearby controls  ├────────────>│           ├──────────────>│ Subscriber │
//! └──────────────────┘             └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_map::events::{EventBus, EventStream, HandleEvent};
//! use core_map::NavigationStatus;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut peer_events = EventStream::new(bus.subscribe()).filter(HandleEvent::is_peer_event);
//!
//! bus.emit(HandleEvent::PeerStatus { status: NavigationStatus::Arrived }).ok();
//!
//! let event = peer_events.recv().await.unwrap();
//! assert_eq!(event, HandleEvent::PeerStatus { status: NavigationStatus::Arrived });
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Non-fatal.
//! - **`RecvError::Closed`**: the bus was dropped together with its handles.

use crate::types::{NavigationStatus, NearbyAction, PickedLocation};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tracing::trace;

pub use core_runtime::config::DEFAULT_EVENT_BUFFER_SIZE;
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Notification published by the handles layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandleEvent {
    /// Peer trip status changed
    PeerStatus { status: NavigationStatus },
    /// Peer stopped sharing its navigation; the stream was closed
    PeerClosed,
    /// A nearby mutation was acknowledged by the renderer
    Nearby {
        action: NearbyAction,
        entity_id: Option<String>,
    },
    /// The user picked a location on the map
    LocationPicked { location: PickedLocation },
}

impl HandleEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &'static str {
        match self {
            HandleEvent::PeerStatus { .. } => "Peer status changed",
            HandleEvent::PeerClosed => "Peer session closed",
            HandleEvent::Nearby { .. } => "Nearby list changed",
            HandleEvent::LocationPicked { .. } => "Location picked",
        }
    }

    /// Whether the event concerns the peer session.
    pub fn is_peer_event(&self) -> bool {
        matches!(
            self,
            HandleEvent::PeerStatus { .. } | HandleEvent::PeerClosed
        )
    }
}

/// Broadcast channel for [`HandleEvent`]s.
///
/// Cloning yields another publisher on the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<HandleEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per
    /// subscriber. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when nobody is subscribed.
    pub fn emit(&self, event: HandleEvent) -> Result<usize, SendError<HandleEvent>> {
        self.sender.send(event)
    }

    /// Publishes an event, ignoring the absence of subscribers.
    pub(crate) fn publish(&self, event: HandleEvent) {
        if let Err(SendError(event)) = self.emit(event) {
            trace!(event = event.description(), "No subscriber for handle event");
        }
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<HandleEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&HandleEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
pub struct EventStream {
    receiver: Receiver<HandleEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<HandleEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&HandleEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<HandleEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<HandleEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    fn matches(&self, event: &HandleEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
