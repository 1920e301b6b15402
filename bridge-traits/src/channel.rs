//! Bridge Channel Abstraction
//!
//! Message-passing contract between the host and the embedded map renderer.
//!
//! The renderer side is reached through an event-named channel: the host
//! emits events (optionally waiting for an acknowledgement) and registers
//! handlers for events pushed back by the renderer. Implementations run on a
//! single-threaded event loop, so handlers are neither `Send` nor `Sync`.

use futures::channel::oneshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Handler invoked with the payload of an incoming renderer event.
pub type EventHandler = Box<dyn Fn(&Value)>;

/// Receiving half of a pending acknowledgement.
pub type AckReceiver = oneshot::Receiver<Ack>;

/// Sending half of a pending acknowledgement, held by the channel.
pub type AckSender = oneshot::Sender<Ack>;

/// Renderer reply to an acknowledged emit.
///
/// The renderer answers `(error, data)` where `error` is either a message
/// string or a falsy value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ack {
    /// Failure message, `None` on success
    #[serde(default)]
    pub error: Option<String>,
    /// Optional reply data
    #[serde(default)]
    pub data: Value,
}

impl Ack {
    /// Successful acknowledgement without data.
    pub fn ok() -> Self {
        Self::default()
    }

    /// Successful acknowledgement carrying `data`.
    pub fn with_data(data: Value) -> Self {
        Self { error: None, data }
    }

    /// Failed acknowledgement.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            data: Value::Null,
        }
    }

    /// Builds an acknowledgement from the raw `(error, data)` reply.
    ///
    /// Only a string `error` counts as a failure; `false`, `null` and any
    /// other value mean success.
    pub fn from_reply(error: &Value, data: Value) -> Self {
        match error {
            Value::String(message) => Self {
                error: Some(message.clone()),
                data,
            },
            _ => Self::with_data(data),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Splits the acknowledgement into its data or its failure message.
    pub fn into_result(self) -> std::result::Result<Value, String> {
        match self.error {
            Some(message) => Err(message),
            None => Ok(self.data),
        }
    }
}

/// Bridge channel trait
///
/// # Contract
///
/// - `emit` is fire-and-forget.
/// - `emit_with_ack` returns a receiver resolved by the renderer's reply. The
///   channel never times out on its own; callers bound the wait.
/// - Handlers registered with `on` for the same event run in registration
///   order. `off` removes every handler of that event.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::channel::BridgeChannel;
/// use serde_json::json;
///
/// fn pin(channel: &dyn BridgeChannel) -> bridge_traits::error::Result<()> {
///     channel.on("current:location", Box::new(|payload| println!("{payload}")))?;
///     channel.emit("pin:current:location", json!("client"))
/// }
/// ```
pub trait BridgeChannel {
    /// Sends an event without waiting for a reply.
    fn emit(&self, event: &str, payload: Value) -> Result<()>;

    /// Sends an event and returns a receiver for the renderer's reply.
    fn emit_with_ack(&self, event: &str, payload: Value) -> Result<AckReceiver>;

    /// Registers a handler for an incoming event.
    fn on(&self, event: &str, handler: EventHandler) -> Result<()>;

    /// Removes every handler registered for `event`.
    fn off(&self, event: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ack_from_reply() {
        let failed = Ack::from_reply(&json!("Route not found"), Value::Null);
        assert!(!failed.is_ok());
        assert_eq!(failed.into_result(), Err("Route not found".to_string()));

        let ok = Ack::from_reply(&json!(false), json!({ "lng": 1.0, "lat": 2.0 }));
        assert!(ok.is_ok());
        assert_eq!(ok.into_result(), Ok(json!({ "lng": 1.0, "lat": 2.0 })));

        assert!(Ack::from_reply(&Value::Null, Value::Null).is_ok());
        assert!(Ack::from_reply(&json!(true), Value::Null).is_ok());
    }

    #[test]
    fn test_ack_constructors() {
        assert_eq!(Ack::ok(), Ack::with_data(Value::Null));
        assert_eq!(Ack::failed("nope").error.as_deref(), Some("nope"));
    }

    #[test]
    fn test_ack_deserialize_defaults() {
        let ack: Ack = serde_json::from_str("{}").unwrap();
        assert!(ack.is_ok());
        assert_eq!(ack.data, Value::Null);
    }

    #[tokio::test]
    async fn test_ack_over_oneshot() {
        let (sender, receiver): (AckSender, AckReceiver) = oneshot::channel();
        sender.send(Ack::with_data(json!(3))).unwrap();
        assert_eq!(receiver.await.unwrap().into_result(), Ok(json!(3)));
    }
}
