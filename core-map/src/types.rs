//! Payloads exchanged with the map renderer.
//!
//! Field names follow the renderer's camelCase wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Identifier of a nearby session, used as a log field.
///
/// # Examples
///
/// ```
/// use core_map::SessionId;
///
/// let id = SessionId::new();
/// assert_ne!(id, SessionId::new());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Longitude/latitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lng: f64,
    pub lat: f64,
}

impl Coordinates {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// Real-time GPS fix, optionally carrying a compass heading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsLocation {
    pub lng: f64,
    pub lat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

impl GpsLocation {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self {
            lng,
            lat,
            heading: None,
        }
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lng, self.lat)
    }
}

impl From<Coordinates> for GpsLocation {
    fn from(coords: Coordinates) -> Self {
        Self::new(coords.lng, coords.lat)
    }
}

/// Label shown next to a pin on the map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Caption {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Fills in `label` when the caption has none.
    pub(crate) fn or_label(caption: Option<Caption>, label: &str) -> Caption {
        let caption = caption.unwrap_or_default();
        Caption {
            label: caption.label.or_else(|| Some(label.to_string())),
            ..caption
        }
    }
}

/// Route identifier, either textual or numeric on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteId {
    Number(i64),
    Text(String),
}

impl From<&str> for RouteId {
    fn from(id: &str) -> Self {
        RouteId::Text(id.to_string())
    }
}

impl From<String> for RouteId {
    fn from(id: String) -> Self {
        RouteId::Text(id)
    }
}

impl From<i64> for RouteId {
    fn from(id: i64) -> Self {
        RouteId::Number(id)
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteId::Number(id) => write!(f, "{}", id),
            RouteId::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    Active,
    Busy,
}

/// Service grade of a nearby entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityGrade {
    #[serde(rename = "1H")]
    OneHour,
    #[serde(rename = "2H")]
    TwoHours,
    #[serde(rename = "3H")]
    ThreeHours,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Moto,
    Car,
    Bike,
    Truck,
    Plane,
    Ship,
    Restaurant,
    Hotel,
    Store,
    Office,
    Warehouse,
}

/// Vehicle or premises displayed around the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub status: EntityStatus,
    pub grade: EntityGrade,
    pub current_location: GpsLocation,
    #[serde(rename = "static", default, skip_serializing_if = "Option::is_none")]
    pub is_static: Option<bool>,
    #[serde(rename = "type")]
    pub kind: EntityKind,
}

/// New position of an entity already on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivePosition {
    pub id: String,
    pub position: GpsLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<Caption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapWaypoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    pub coords: Coordinates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<Caption>,
}

impl MapWaypoint {
    pub fn new(coords: Coordinates) -> Self {
        Self {
            index: None,
            coords,
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: Caption) -> Self {
        self.caption = Some(caption);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMode {
    Default,
    Navigation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteProfile {
    DrivingTraffic,
    Driving,
    Cycling,
    Biking,
    Walking,
    Transit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteUnit {
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrafficPreference {
    TrafficAware,
    TrafficUnaware,
}

/// Rendering and routing options for a route.
///
/// `styles` and `animation` are renderer-defined and passed through as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RouteId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<RouteMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<RouteProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<RouteUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference: Option<TrafficPreference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointless: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<Value>,
}

/// Route to draw and, optionally, navigate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journey {
    pub route_id: RouteId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<MapWaypoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<MapWaypoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub waypoints: Vec<MapWaypoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<RouteOptions>,
}

impl Journey {
    pub fn new(route_id: impl Into<RouteId>) -> Self {
        Self {
            route_id: route_id.into(),
            origin: None,
            destination: None,
            waypoints: Vec::new(),
            options: None,
        }
    }

    pub fn with_origin(mut self, origin: MapWaypoint) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_destination(mut self, destination: MapWaypoint) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_waypoint(mut self, waypoint: MapWaypoint) -> Self {
        self.waypoints.push(waypoint);
        self
    }

    pub fn with_options(mut self, options: RouteOptions) -> Self {
        self.options = Some(options);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// Location the user picked by tapping the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PickedLocation {
    pub point: ScreenPoint,
    pub coordinates: Coordinates,
}

/// Position update for the peer pin.
///
/// `position` stays optional so malformed host data can be reported on the
/// stream instead of being rejected at the type level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerPosition {
    #[serde(default)]
    pub position: Option<GpsLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<Caption>,
}

impl PeerPosition {
    pub fn new(position: GpsLocation) -> Self {
        Self {
            position: Some(position),
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: Caption) -> Self {
        self.caption = Some(caption);
        self
    }
}

/// Trip status reported with each navigation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NavigationStatus {
    Stale,
    Started,
    LongStop,
    LowTraffic,
    HighTraffic,
    ModerateTraffic,
    SpeedWarning,
    Nearby,
    Arrived,
    /// The peer stopped sharing; ends the session.
    Unavailable,
    #[serde(other)]
    Unknown,
}

/// One navigation update: trip status, renderer direction data and position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionFrame {
    #[serde(default)]
    pub status: Option<NavigationStatus>,
    #[serde(default)]
    pub direction: Option<Value>,
    #[serde(default)]
    pub position: Option<GpsLocation>,
}

impl DirectionFrame {
    pub fn new(status: NavigationStatus, direction: Value, position: GpsLocation) -> Self {
        Self {
            status: Some(status),
            direction: Some(direction),
            position: Some(position),
        }
    }

    /// Frame carrying only a position, as fed into a navigation stream.
    pub fn position(position: GpsLocation) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }
}

/// Nearby list mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NearbyAction {
    Add,
    Remove,
    Move,
}

/// Value synced on a nearby stream after each acknowledged mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyUpdate {
    pub action: NearbyAction,
    /// The added entity, the removed id, or the new active position
    pub dataset: Value,
    /// Entity list after the mutation
    pub list: Vec<Entity>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_wire_format() {
        let entity: Entity = serde_json::from_value(json!({
            "id": "bike-1",
            "status": "ACTIVE",
            "grade": "2H",
            "currentLocation": { "lng": -3.99, "lat": 5.35, "heading": 90.0 },
            "static": false,
            "type": "bike"
        }))
        .unwrap();

        assert_eq!(entity.grade, EntityGrade::TwoHours);
        assert_eq!(entity.kind, EntityKind::Bike);
        assert_eq!(entity.current_location.heading, Some(90.0));
        assert_eq!(entity.is_static, Some(false));

        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(value["currentLocation"]["lng"], json!(-3.99));
        assert_eq!(value["type"], json!("bike"));
    }

    #[test]
    fn test_journey_serializes_camel_case() {
        let journey = Journey::new("main")
            .with_origin(MapWaypoint::new(Coordinates::new(1.0, 2.0)))
            .with_options(RouteOptions {
                profile: Some(RouteProfile::DrivingTraffic),
                preference: Some(TrafficPreference::TrafficAware),
                ..RouteOptions::default()
            });

        let value = serde_json::to_value(&journey).unwrap();

        assert_eq!(value["routeId"], json!("main"));
        assert_eq!(value["origin"]["coords"], json!({ "lng": 1.0, "lat": 2.0 }));
        assert_eq!(value["options"]["profile"], json!("driving-traffic"));
        assert_eq!(value["options"]["preference"], json!("TRAFFIC_AWARE"));
        assert!(value.get("waypoints").is_none());
        assert!(value.get("destination").is_none());
    }

    #[test]
    fn test_route_id_accepts_numbers_and_text() {
        let numeric: RouteId = serde_json::from_value(json!(42)).unwrap();
        let text: RouteId = serde_json::from_value(json!("main")).unwrap();

        assert_eq!(numeric, RouteId::Number(42));
        assert_eq!(text, RouteId::from("main"));
        assert_eq!(numeric.to_string(), "42");
    }

    #[test]
    fn test_navigation_status_parsing() {
        let frame: DirectionFrame = serde_json::from_value(json!({
            "status": "LONG_STOP",
            "direction": { "eta": 12 },
            "position": { "lng": 0.5, "lat": 0.25 }
        }))
        .unwrap();
        assert_eq!(frame.status, Some(NavigationStatus::LongStop));

        let unknown: NavigationStatus = serde_json::from_value(json!("TELEPORTED")).unwrap();
        assert_eq!(unknown, NavigationStatus::Unknown);
    }

    #[test]
    fn test_partial_frames_parse() {
        let frame: DirectionFrame =
            serde_json::from_value(json!({ "position": { "lng": 1.0, "lat": 1.0 } })).unwrap();

        assert!(frame.status.is_none());
        assert!(frame.direction.is_none());
        assert_eq!(frame, DirectionFrame::position(GpsLocation::new(1.0, 1.0)));
    }

    #[test]
    fn test_caption_default_label() {
        let filled = Caption::or_label(None, "Pickup point");
        assert_eq!(filled.label.as_deref(), Some("Pickup point"));

        let kept = Caption::or_label(
            Some(Caption {
                duration: Some(4.0),
                unit: Some("min".to_string()),
                label: Some("Gate B".to_string()),
            }),
            "Pickup point",
        );
        assert_eq!(kept.label.as_deref(), Some("Gate B"));
        assert_eq!(kept.duration, Some(4.0));
    }
}
