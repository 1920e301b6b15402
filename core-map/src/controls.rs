//! Request/acknowledgement helpers over the bridge channel.
//!
//! Acknowledged requests wait for the renderer's reply for at most the
//! configured timeout. Fire-and-forget helpers are used where no caller can
//! wait, such as inside stream listeners and close hooks.

use crate::error::{MapError, Result};
use crate::types::{GpsLocation, Journey, MapWaypoint, RouteId, RouteOptions};
use bridge_traits::{AckReceiver, BridgeChannel, BridgeError};
use core_runtime::config::MapConfig;
use serde_json::{json, Value};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Waits for the renderer's reply to `event`.
///
/// A string error in the reply becomes [`MapError::Rejected`], a dropped
/// acknowledgement [`BridgeError::AckDropped`], and no reply within `limit`
/// [`MapError::Timeout`].
pub(crate) async fn await_ack(event: &str, receiver: AckReceiver, limit: Duration) -> Result<Value> {
    match tokio::time::timeout(limit, receiver).await {
        Err(_) => {
            debug!(event, ?limit, "Acknowledgement timed out");
            Err(MapError::Timeout {
                event: event.to_string(),
                after: limit,
            })
        }
        Ok(Err(_)) => Err(BridgeError::AckDropped(event.to_string()).into()),
        Ok(Ok(ack)) => ack.into_result().map_err(|message| MapError::Rejected {
            event: event.to_string(),
            message,
        }),
    }
}

/// Map controls used by the handles layer.
#[derive(Clone)]
pub struct Controls {
    channel: Rc<dyn BridgeChannel>,
    ack_timeout: Duration,
}

impl Controls {
    pub fn new(channel: Rc<dyn BridgeChannel>, ack_timeout: Duration) -> Self {
        Self {
            channel,
            ack_timeout,
        }
    }

    pub fn from_config(config: &MapConfig) -> Self {
        Self::new(Rc::clone(&config.channel), config.ack_timeout)
    }

    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    async fn request(&self, event: &str, payload: Value) -> Result<Value> {
        let receiver = self.channel.emit_with_ack(event, payload)?;
        await_ack(event, receiver, self.ack_timeout).await
    }

    /// Draws a route on the map.
    #[instrument(skip(self, journey), fields(route_id = %journey.route_id))]
    pub async fn set_route(&self, journey: &Journey) -> Result<()> {
        self.request("set:route", serde_json::to_value(journey)?)
            .await
            .map(drop)
    }

    /// Asks the renderer for the user's current GPS fix.
    ///
    /// Returns `None` when the renderer has no fix to report.
    pub async fn current_location(&self) -> Result<Option<GpsLocation>> {
        let data = self.request("get:current:location", Value::Null).await?;
        if data.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(data)?))
    }

    pub async fn mount_navigation(&self, route_id: &RouteId) -> Result<()> {
        self.request("mount:navigation", serde_json::to_value(route_id)?)
            .await
            .map(drop)
    }

    pub async fn set_initial_navigation_position(&self, position: &GpsLocation) -> Result<()> {
        self.request("initial:navigation:position", serde_json::to_value(position)?)
            .await
            .map(drop)
    }

    pub async fn set_route_origin(&self, route_id: &RouteId, point: &MapWaypoint) -> Result<()> {
        self.request(
            "set:route:origin",
            json!({ "routeId": route_id, "point": point }),
        )
        .await
        .map(drop)
    }

    pub async fn set_route_destination(
        &self,
        route_id: &RouteId,
        point: &MapWaypoint,
    ) -> Result<()> {
        self.request(
            "set:route:destination",
            json!({ "routeId": route_id, "point": point }),
        )
        .await
        .map(drop)
    }

    pub async fn unmount_navigation(&self) -> Result<()> {
        self.request("unmount:navigation", Value::Null)
            .await
            .map(drop)
    }

    pub async fn dismiss_navigation(&self) -> Result<()> {
        self.request("dismiss:navigation", Value::Null)
            .await
            .map(drop)
    }

    /// Moves the navigation cursor to `position` without waiting.
    pub fn navigate(&self, position: &GpsLocation) -> Result<()> {
        self.channel.emit(
            "navigate:navigation:direction",
            serde_json::to_value(position)?,
        )?;
        Ok(())
    }

    /// Draws a peer's navigation direction without waiting.
    pub fn casting(
        &self,
        route_id: &RouteId,
        direction: &Value,
        position: Option<&GpsLocation>,
        options: Option<&RouteOptions>,
    ) -> Result<()> {
        self.channel.emit(
            "casting:navigation:direction",
            json!({
                "routeId": route_id,
                "direction": direction,
                "position": position,
                "options": options,
            }),
        )?;
        Ok(())
    }

    /// Tears navigation down without waiting for the renderer.
    pub(crate) fn detach_navigation(&self) -> Result<()> {
        self.channel.emit("unmount:navigation", Value::Null)?;
        Ok(())
    }
}

impl std::fmt::Debug for Controls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controls")
            .field("channel", &"BridgeChannel { ... }")
            .field("ack_timeout", &self.ack_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinates;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{Ack, EventHandler};
    use futures::channel::oneshot;
    use mockall::mock;

    mock! {
        Channel {}

        impl BridgeChannel for Channel {
            fn emit(&self, event: &str, payload: Value) -> BridgeResult<()>;
            fn emit_with_ack(&self, event: &str, payload: Value) -> BridgeResult<AckReceiver>;
            fn on(&self, event: &str, handler: EventHandler) -> BridgeResult<()>;
            fn off(&self, event: &str) -> BridgeResult<()>;
        }
    }

    fn acked(ack: Ack) -> BridgeResult<AckReceiver> {
        let (sender, receiver) = oneshot::channel();
        sender.send(ack).ok();
        Ok(receiver)
    }

    fn controls(mock: MockChannel) -> Controls {
        Controls::new(Rc::new(mock), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_set_route_sends_journey() {
        let mut mock = MockChannel::new();
        mock.expect_emit_with_ack()
            .times(1)
            .returning(|event, payload| {
                assert_eq!(event, "set:route");
                assert_eq!(payload["routeId"], json!("main"));
                acked(Ack::ok())
            });

        controls(mock).set_route(&Journey::new("main")).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_ack_is_rejected() {
        let mut mock = MockChannel::new();
        mock.expect_emit_with_ack()
            .times(1)
            .returning(|_, _| acked(Ack::failed("Route not found")));

        let result = controls(mock).mount_navigation(&RouteId::from(7_i64)).await;

        match result {
            Err(MapError::Rejected { event, message }) => {
                assert_eq!(event, "mount:navigation");
                assert_eq!(message, "Route not found");
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_ack_times_out() {
        let mut mock = MockChannel::new();
        mock.expect_emit_with_ack().times(1).returning(|_, _| {
            let (sender, receiver) = oneshot::channel::<Ack>();
            // Keep the request pending forever
            std::mem::forget(sender);
            Ok(receiver)
        });

        let result = controls(mock).dismiss_navigation().await;

        match result {
            Err(MapError::Timeout { event, after }) => {
                assert_eq!(event, "dismiss:navigation");
                assert_eq!(after, Duration::from_millis(50));
            }
            other => panic!("expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dropped_ack() {
        let mut mock = MockChannel::new();
        mock.expect_emit_with_ack().times(1).returning(|_, _| {
            let (_, receiver) = oneshot::channel::<Ack>();
            Ok(receiver)
        });

        let result = controls(mock).unmount_navigation().await;

        assert!(matches!(
            result,
            Err(MapError::Bridge(BridgeError::AckDropped(_)))
        ));
    }

    #[tokio::test]
    async fn test_current_location() {
        let mut mock = MockChannel::new();
        mock.expect_emit_with_ack()
            .times(1)
            .returning(|_, _| acked(Ack::with_data(json!({ "lng": 2.5, "lat": 48.8 }))));

        let location = controls(mock).current_location().await.unwrap();

        assert_eq!(location, Some(GpsLocation::new(2.5, 48.8)));
    }

    #[tokio::test]
    async fn test_current_location_without_fix() {
        let mut mock = MockChannel::new();
        mock.expect_emit_with_ack()
            .times(1)
            .returning(|_, _| acked(Ack::ok()));

        assert_eq!(controls(mock).current_location().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_route_origin_payload() {
        let mut mock = MockChannel::new();
        mock.expect_emit_with_ack()
            .times(1)
            .returning(|event, payload| {
                assert_eq!(event, "set:route:origin");
                assert_eq!(payload["routeId"], json!("main"));
                assert_eq!(payload["point"]["coords"], json!({ "lng": 1.0, "lat": 2.0 }));
                acked(Ack::ok())
            });

        controls(mock)
            .set_route_origin(
                &RouteId::from("main"),
                &MapWaypoint::new(Coordinates::new(1.0, 2.0)),
            )
            .await
            .unwrap();
    }

    #[test]
    fn test_fire_and_forget_helpers() {
        let mut mock = MockChannel::new();
        mock.expect_emit()
            .times(1)
            .returning(|event, payload| {
                assert_eq!(event, "navigate:navigation:direction");
                assert_eq!(payload, json!({ "lng": 3.0, "lat": 4.0 }));
                Ok(())
            });
        mock.expect_emit_with_ack().never();

        controls(mock)
            .navigate(&GpsLocation::new(3.0, 4.0))
            .unwrap();
    }

    #[test]
    fn test_casting_payload() {
        let mut mock = MockChannel::new();
        mock.expect_emit()
            .times(1)
            .returning(|event, payload| {
                assert_eq!(event, "casting:navigation:direction");
                assert_eq!(payload["routeId"], json!("peer-direction"));
                assert_eq!(payload["direction"], json!({ "eta": 3 }));
                assert_eq!(payload["options"], Value::Null);
                Ok(())
            });

        controls(mock)
            .casting(
                &RouteId::from("peer-direction"),
                &json!({ "eta": 3 }),
                Some(&GpsLocation::new(0.0, 0.0)),
                None,
            )
            .unwrap();
    }

    #[test]
    fn test_bridge_failure_propagates() {
        let mut mock = MockChannel::new();
        mock.expect_emit()
            .returning(|_, _| Err(BridgeError::NotAvailable("renderer gone".to_string())));

        let result = controls(mock).navigate(&GpsLocation::new(0.0, 0.0));

        assert!(matches!(result, Err(MapError::Bridge(BridgeError::NotAvailable(_)))));
    }
}
