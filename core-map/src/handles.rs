//! # Map Handles
//!
//! Builds the streams through which live map sessions reach the host.
//!
//! ## Stream roles
//!
//! | Handle | Role | Host side |
//! |--------|------|-----------|
//! | [`my_location`](Handles::my_location) | source | pipe it into a tap |
//! | [`peer_location`](Handles::peer_location) | tap | pipe a feeder into it |
//! | [`nearby`](Handles::nearby) | source | pipe it into a tap |
//! | [`peer_direction`](Handles::peer_direction) | tap | pipe a feeder into it |
//! | [`navigation`](Handles::navigation) | both | feed positions in, pipe frames out |
//!
//! Renderer events are routed to the streams by channel handlers registered
//! here; closing a stream detaches them again.

use crate::controls::Controls;
use crate::error::{MapError, Result};
use crate::events::{EventBus, EventStream, HandleEvent};
use crate::nearby::NearbySession;
use crate::types::{
    Caption, Coordinates, DirectionFrame, Entity, GpsLocation, Journey, MapWaypoint,
    NavigationStatus, PeerPosition, PickedLocation, RouteId, RouteOptions,
};
use bridge_traits::BridgeChannel;
use core_runtime::config::MapConfig;
use core_stream::{Stream, StreamError};
use serde_json::{json, Value};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

const LOCATION_EVENTS: [&str; 4] = [
    "current:location",
    "live:location:start",
    "live:location:update",
    "live:location:end",
];
const LOCATION_ERROR_EVENT: &str = "current:location:error";
const NAVIGATION_DIRECTION_EVENT: &str = "navigation:direction";

const PEER_ID: &str = "peer";
const MAIN_ROUTE: &str = "main";
const PEER_DIRECTION_ROUTE: &str = "peer-direction";

const INVALID_DATA: &str = "Invalid Data";

/// Entry point of the map SDK on the host side.
pub struct Handles {
    channel: Rc<dyn BridgeChannel>,
    controls: Controls,
    events: EventBus,
    nearby_ack_timeout: Duration,
    default_user_type: String,
}

impl Handles {
    pub fn new(config: &MapConfig) -> Self {
        Self {
            channel: Rc::clone(&config.channel),
            controls: Controls::from_config(config),
            events: EventBus::new(config.event_buffer_size),
            nearby_ack_timeout: config.nearby_ack_timeout,
            default_user_type: config.default_user_type.clone(),
        }
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// New subscriber to handle events.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    /// Calls `f` whenever the user picks a location on the map.
    ///
    /// Each pick is also published as [`HandleEvent::LocationPicked`].
    pub fn on_pick_location<F>(&self, f: F) -> Result<()>
    where
        F: Fn(&PickedLocation) + 'static,
    {
        let events = self.events.clone();
        self.channel.on(
            "pick:location",
            Box::new(move |payload: &Value| {
                match serde_json::from_value::<PickedLocation>(payload.clone()) {
                    Ok(location) => {
                        f(&location);
                        events.publish(HandleEvent::LocationPicked { location });
                    }
                    Err(err) => warn!(error = %err, "Ignoring malformed picked location"),
                }
            }),
        )?;
        Ok(())
    }

    /// Pins the user's position and streams every fix the renderer reports.
    ///
    /// The returned stream is a source: pipe it into a stream of your own to
    /// receive the locations. Closing it detaches the renderer listeners.
    pub fn my_location(&self, user_type: Option<&str>) -> Result<Stream<GpsLocation>> {
        let user_type = user_type.unwrap_or(self.default_user_type.as_str());
        self.channel.emit("pin:current:location", json!(user_type))?;

        let stream: Stream<GpsLocation> = Stream::new();
        log_errors(&stream);

        for event in LOCATION_EVENTS {
            let source = stream.clone();
            self.channel.on(
                event,
                Box::new(move |payload: &Value| {
                    match serde_json::from_value::<GpsLocation>(payload.clone()) {
                        Ok(location) => source.sync(&location),
                        Err(err) => {
                            source.error(format!("Invalid location from '{}': {}", event, err));
                        }
                    }
                }),
            )?;
        }

        let source = stream.clone();
        self.channel.on(
            LOCATION_ERROR_EVENT,
            Box::new(move |payload: &Value| {
                let message = payload
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| payload.to_string());
                source.error(message);
            }),
        )?;

        let channel = Rc::clone(&self.channel);
        let id = stream.id();
        stream.on_close(move || {
            debug!(stream_id = id, "Detaching location listeners");
            for event in LOCATION_EVENTS.into_iter().chain([LOCATION_ERROR_EVENT]) {
                if let Err(err) = channel.off(event) {
                    warn!(stream_id = id, event, error = %err, "Failed to detach listener");
                }
            }
        });

        debug!(stream_id = id, user_type, "Live location stream opened");
        Ok(stream)
    }

    /// Pins the peer at `position` and returns a tap for later updates.
    ///
    /// Every value reaching the stream moves the pin; a value without a
    /// position raises `Invalid Data` on the stream. Closing it unpins the
    /// peer.
    pub fn peer_location(
        &self,
        position: GpsLocation,
        caption: Option<Caption>,
    ) -> Result<Stream<PeerPosition>> {
        self.channel.emit(
            "pin:peer:location",
            json!({ "id": PEER_ID, "position": position, "caption": caption }),
        )?;

        let stream: Stream<PeerPosition> = Stream::new();
        log_errors(&stream);

        let channel = Rc::clone(&self.channel);
        let weak = stream.downgrade();
        stream.on_data(move |update: &PeerPosition| {
            let Some(position) = update.position else {
                if let Some(stream) = weak.upgrade() {
                    stream.error(INVALID_DATA);
                }
                return;
            };

            let payload = json!({ "id": PEER_ID, "position": position, "caption": update.caption });
            if let Err(err) = channel.emit("pin:peer:location", payload) {
                warn!(error = %err, "Failed to move peer pin");
            }
        })?;

        let channel = Rc::clone(&self.channel);
        stream.on_close(move || {
            if let Err(err) = channel.emit("unpin:peer:location", json!(PEER_ID)) {
                warn!(error = %err, "Failed to unpin peer");
            }
        });

        Ok(stream)
    }

    /// Shows `list` around the user and opens a live session on it.
    pub fn nearby(&self, list: Vec<Entity>) -> Result<NearbySession> {
        NearbySession::open(
            Rc::clone(&self.channel),
            self.events.clone(),
            self.nearby_ack_timeout,
            list,
        )
    }

    /// Sets the pickup point of the main route.
    ///
    /// The caption label defaults to `Pickup point`.
    pub async fn pickup_point(&self, location: Coordinates, caption: Option<Caption>) -> Result<()> {
        let point =
            MapWaypoint::new(location).with_caption(Caption::or_label(caption, "Pickup point"));
        self.controls
            .set_route_origin(&RouteId::from(MAIN_ROUTE), &point)
            .await
    }

    /// Sets the dropoff point of the main route.
    ///
    /// The caption label defaults to `Destination point`.
    pub async fn dropoff_point(
        &self,
        location: Coordinates,
        caption: Option<Caption>,
    ) -> Result<()> {
        let point = MapWaypoint::new(location)
            .with_caption(Caption::or_label(caption, "Destination point"));
        self.controls
            .set_route_destination(&RouteId::from(MAIN_ROUTE), &point)
            .await
    }

    /// Returns a tap that draws a peer's navigation on this user's map.
    ///
    /// Frames need both a direction and a position, otherwise `Invalid Data`
    /// is raised on the stream. Statuses are published on the event bus;
    /// [`NavigationStatus::Unavailable`] closes the stream.
    pub fn peer_direction(&self, options: Option<RouteOptions>) -> Result<Stream<DirectionFrame>> {
        let stream: Stream<DirectionFrame> = Stream::new();
        log_errors(&stream);

        let controls = self.controls.clone();
        let events = self.events.clone();
        let weak = stream.downgrade();
        let route_id = RouteId::from(PEER_DIRECTION_ROUTE);
        stream.on_data(move |frame: &DirectionFrame| {
            let Some(stream) = weak.upgrade() else {
                return;
            };
            let (Some(direction), Some(position)) = (&frame.direction, &frame.position) else {
                stream.error(INVALID_DATA);
                return;
            };

            if let Err(err) = controls.casting(&route_id, direction, Some(position), options.as_ref())
            {
                warn!(stream_id = stream.id(), error = %err, "Failed to cast peer direction");
            }
            handle_status(&events, &stream, frame.status);
        })?;

        Ok(stream)
    }

    /// Starts turn-by-turn navigation along `journey`.
    ///
    /// Draws the route, resolves the start position (the journey origin, or
    /// the user's current location), mounts navigation and returns a stream
    /// playing both roles: renderer frames are synced downstream, and
    /// positions piped into it move the navigation cursor. Closing the stream
    /// unmounts navigation.
    ///
    /// # Errors
    ///
    /// Any failed or timed out request; [`MapError::Unavailable`] when no start
    /// position can be resolved.
    #[instrument(skip(self, journey), fields(route_id = %journey.route_id))]
    pub async fn navigation(&self, journey: Journey) -> Result<Stream<DirectionFrame>> {
        self.controls.set_route(&journey).await?;

        let position = match &journey.origin {
            Some(origin) => GpsLocation::from(origin.coords),
            None => self.controls.current_location().await?.ok_or_else(|| {
                MapError::Unavailable("Unable to get current location".to_string())
            })?,
        };

        let stream = self.navigation_stream()?;

        let mounted = async {
            self.controls.mount_navigation(&journey.route_id).await?;
            self.controls
                .set_initial_navigation_position(&position)
                .await
        }
        .await;
        if let Err(err) = mounted {
            stream.close();
            return Err(err);
        }

        debug!(stream_id = stream.id(), "Navigation started");
        Ok(stream)
    }

    fn navigation_stream(&self) -> Result<Stream<DirectionFrame>> {
        let stream: Stream<DirectionFrame> = Stream::new();
        log_errors(&stream);

        let source = stream.clone();
        let events = self.events.clone();
        self.channel.on(
            NAVIGATION_DIRECTION_EVENT,
            Box::new(move |payload: &Value| {
                match serde_json::from_value::<DirectionFrame>(payload.clone()) {
                    Ok(frame) => {
                        source.sync(&frame);
                        handle_status(&events, &source, frame.status);
                    }
                    Err(err) => {
                        source.error(format!("Invalid navigation frame: {}", err));
                    }
                }
            }),
        )?;

        let controls = self.controls.clone();
        let weak = stream.downgrade();
        stream.on_data(move |frame: &DirectionFrame| {
            let Some(position) = frame.position else {
                if let Some(stream) = weak.upgrade() {
                    stream.error(INVALID_DATA);
                }
                return;
            };
            if let Err(err) = controls.navigate(&position) {
                warn!(error = %err, "Failed to move navigation cursor");
            }
        })?;

        let channel = Rc::clone(&self.channel);
        let controls = self.controls.clone();
        let id = stream.id();
        stream.on_close(move || {
            debug!(stream_id = id, "Navigation stream closed, unmounting");
            if let Err(err) = channel.off(NAVIGATION_DIRECTION_EVENT) {
                warn!(stream_id = id, error = %err, "Failed to detach navigation listener");
            }
            if let Err(err) = controls.detach_navigation() {
                warn!(stream_id = id, error = %err, "Failed to unmount navigation");
            }
        });

        Ok(stream)
    }
}

impl std::fmt::Debug for Handles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handles")
            .field("controls", &self.controls)
            .field("events", &self.events)
            .field("nearby_ack_timeout", &self.nearby_ack_timeout)
            .field("default_user_type", &self.default_user_type)
            .finish()
    }
}

/// Installs the default error hook: log and carry on.
fn log_errors<T: 'static>(stream: &Stream<T>) {
    let id = stream.id();
    stream.on_error(move |err: &StreamError| {
        error!(stream_id = id, error = %err, "[Stream Error]");
    });
}

/// Publishes a peer trip status. `Unavailable` ends the session.
fn handle_status<T: 'static>(
    events: &EventBus,
    stream: &Stream<T>,
    status: Option<NavigationStatus>,
) {
    match status {
        Some(NavigationStatus::Unavailable) => {
            events.publish(HandleEvent::PeerClosed);
            if stream.is_active() {
                stream.close();
            }
        }
        Some(NavigationStatus::Unknown) | None => {}
        Some(status) => events.publish(HandleEvent::PeerStatus { status }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_status_publishes_known_statuses() {
        let events = EventBus::new(8);
        let mut receiver = events.subscribe();
        let stream: Stream<u8> = Stream::new();

        handle_status(&events, &stream, Some(NavigationStatus::LowTraffic));
        handle_status(&events, &stream, Some(NavigationStatus::Unknown));
        handle_status(&events, &stream, None);

        assert_eq!(
            receiver.try_recv().unwrap(),
            HandleEvent::PeerStatus {
                status: NavigationStatus::LowTraffic
            }
        );
        assert!(receiver.try_recv().is_err());
        assert!(stream.is_active());
    }

    #[test]
    fn test_handle_status_unavailable_closes() {
        let events = EventBus::new(8);
        let mut receiver = EventStream::new(events.subscribe());
        let stream: Stream<u8> = Stream::new();

        handle_status(&events, &stream, Some(NavigationStatus::Unavailable));
        handle_status(&events, &stream, Some(NavigationStatus::Unavailable));

        assert!(!stream.is_active());
        assert_eq!(receiver.try_recv().unwrap().unwrap(), HandleEvent::PeerClosed);
        // published once per frame, the stream closes only once
        assert_eq!(receiver.try_recv().unwrap().unwrap(), HandleEvent::PeerClosed);
        assert!(receiver.try_recv().is_none());
    }

    #[test]
    fn test_log_errors_keeps_stream_open() {
        let stream: Stream<u8> = Stream::new();
        log_errors(&stream);

        stream.error("boom");

        assert!(stream.is_active());
    }
}
