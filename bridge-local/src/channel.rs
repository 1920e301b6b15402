//! Loopback bridge channel.

use bridge_traits::{
    channel::{Ack, AckReceiver, AckSender, BridgeChannel, EventHandler},
    error::{BridgeError, Result},
};
use futures::channel::oneshot;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tracing::{debug, trace};

type SharedHandler = Rc<dyn Fn(&Value)>;
type Responder = Rc<dyn Fn(&Value) -> Ack>;

/// A message emitted by the host towards the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub event: String,
    pub payload: Value,
    /// Whether the host asked for an acknowledgement
    pub expects_ack: bool,
}

#[derive(Default)]
struct ChannelState {
    handlers: HashMap<String, Vec<SharedHandler>>,
    responders: HashMap<String, Responder>,
    pending: HashMap<String, VecDeque<AckSender>>,
    sent: Vec<SentMessage>,
    disconnected: bool,
}

/// In-process [`BridgeChannel`].
///
/// Single-threaded: share it with `Rc`. Handlers and responders run without
/// any internal borrow held, so they may call back into the channel.
#[derive(Default)]
pub struct LocalChannel {
    state: RefCell<ChannelState>,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs an automatic acknowledgement for `event`.
    ///
    /// Every acknowledged emit of that event is answered immediately with the
    /// responder's result. Replaces any previous responder.
    pub fn respond_with<F>(&self, event: &str, responder: F)
    where
        F: Fn(&Value) -> Ack + 'static,
    {
        self.state
            .borrow_mut()
            .responders
            .insert(event.to_string(), Rc::new(responder));
    }

    /// Resolves the oldest pending acknowledgement of `event`.
    ///
    /// Returns `false` when nothing was pending or the requester gave up.
    pub fn acknowledge(&self, event: &str, ack: Ack) -> bool {
        let sender = self
            .state
            .borrow_mut()
            .pending
            .get_mut(event)
            .and_then(VecDeque::pop_front);

        match sender {
            Some(sender) => sender.send(ack).is_ok(),
            None => false,
        }
    }

    /// Number of acknowledgements of `event` still awaiting a reply.
    pub fn pending_count(&self, event: &str) -> usize {
        self.state
            .borrow()
            .pending
            .get(event)
            .map_or(0, VecDeque::len)
    }

    /// Simulates the renderer pushing `event`. Returns how many handlers ran.
    pub fn dispatch(&self, event: &str, payload: Value) -> usize {
        let handlers = self
            .state
            .borrow()
            .handlers
            .get(event)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(event, "No handler registered for renderer event");
        }

        for handler in &handlers {
            handler(&payload);
        }
        handlers.len()
    }

    /// Number of handlers currently registered for `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.state
            .borrow()
            .handlers
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Every message emitted so far, oldest first.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.borrow().sent.clone()
    }

    /// Names of every emitted event, oldest first.
    pub fn sent_events(&self) -> Vec<String> {
        self.state
            .borrow()
            .sent
            .iter()
            .map(|message| message.event.clone())
            .collect()
    }

    /// Payload of the most recent emit of `event`.
    pub fn last_payload(&self, event: &str) -> Option<Value> {
        self.state
            .borrow()
            .sent
            .iter()
            .rev()
            .find(|message| message.event == event)
            .map(|message| message.payload.clone())
    }

    /// Drains the record of emitted messages.
    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut self.state.borrow_mut().sent)
    }

    /// Simulates the renderer going away.
    ///
    /// Pending acknowledgements are dropped and later calls fail with
    /// [`BridgeError::NotAvailable`].
    pub fn disconnect(&self) {
        let mut state = self.state.borrow_mut();
        state.disconnected = true;
        state.pending.clear();
        state.handlers.clear();
    }

    fn record(&self, event: &str, payload: &Value, expects_ack: bool) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.disconnected {
            return Err(BridgeError::NotAvailable(format!(
                "renderer disconnected, cannot emit '{}'",
                event
            )));
        }

        trace!(event, expects_ack, "Emitting bridge event");
        state.sent.push(SentMessage {
            event: event.to_string(),
            payload: payload.clone(),
            expects_ack,
        });
        Ok(())
    }
}

impl BridgeChannel for LocalChannel {
    fn emit(&self, event: &str, payload: Value) -> Result<()> {
        self.record(event, &payload, false)
    }

    fn emit_with_ack(&self, event: &str, payload: Value) -> Result<AckReceiver> {
        self.record(event, &payload, true)?;

        let (sender, receiver) = oneshot::channel();
        let responder = self.state.borrow().responders.get(event).cloned();

        match responder {
            Some(responder) => {
                // The requester holds the receiver, so this cannot fail.
                let _ = sender.send(responder(&payload));
            }
            None => {
                self.state
                    .borrow_mut()
                    .pending
                    .entry(event.to_string())
                    .or_default()
                    .push_back(sender);
            }
        }

        Ok(receiver)
    }

    fn on(&self, event: &str, handler: EventHandler) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.disconnected {
            return Err(BridgeError::NotAvailable(format!(
                "renderer disconnected, cannot listen to '{}'",
                event
            )));
        }

        state
            .handlers
            .entry(event.to_string())
            .or_default()
            .push(Rc::from(handler));
        Ok(())
    }

    fn off(&self, event: &str) -> Result<()> {
        self.state.borrow_mut().handlers.remove(event);
        Ok(())
    }
}
