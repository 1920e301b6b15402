//! # Core Map
//!
//! Host-side layer of the map SDK: opens live map sessions over a
//! [`BridgeChannel`](bridge_traits::BridgeChannel) and exposes them as
//! [`Stream`](core_stream::Stream)s.
//!
//! ## Overview
//!
//! - [`Handles`] builds the session streams (live location, peer location,
//!   nearby entities, peer direction, navigation).
//! - [`Controls`] wraps the renderer's request/acknowledgement events with a
//!   timeout.
//! - [`events`] publishes session notifications (peer status, nearby
//!   mutations, picked locations) on a broadcast bus.
//!
//! ## Usage
//!
//! ```rust
//! use bridge_local::LocalChannel;
//! use core_map::{GpsLocation, Handles};
//! use core_runtime::config::MapConfig;
//! use core_stream::Stream;
//! use serde_json::json;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let channel = Rc::new(LocalChannel::new());
//! let config = MapConfig::builder().channel(channel.clone()).build().unwrap();
//! let handles = Handles::new(&config);
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! let mine: Stream<GpsLocation> = Stream::new();
//! mine.on_data(move |location| sink.borrow_mut().push(*location)).unwrap();
//!
//! let location = handles.my_location(None).unwrap();
//! location.pipe(&mine);
//!
//! channel.dispatch("current:location", json!({ "lng": -3.99, "lat": 5.35 }));
//! location.close();
//!
//! assert_eq!(*seen.borrow(), vec![GpsLocation::new(-3.99, 5.35)]);
//! assert_eq!(channel.handler_count("current:location"), 0);
//! ```
//!
//! ## Threading
//!
//! Everything here is single-threaded (`Rc`-based, `!Send`). Async methods
//! run on a current-thread runtime or a `LocalSet`.

pub mod controls;
pub mod error;
pub mod events;
pub mod handles;
pub mod nearby;
pub mod types;

pub use controls::Controls;
pub use error::{MapError, Result};
pub use events::{EventBus, EventStream, HandleEvent};
pub use handles::Handles;
pub use nearby::{NearbyControls, NearbySession};
pub use types::{
    ActivePosition, Caption, Coordinates, DirectionFrame, Entity, EntityGrade, EntityKind,
    EntityStatus, GpsLocation, Journey, MapWaypoint, NavigationStatus, NearbyAction, NearbyUpdate,
    PeerPosition, PickedLocation, RouteId, RouteMode, RouteOptions, RouteProfile, RouteUnit,
    ScreenPoint, SessionId, TrafficPreference,
};
