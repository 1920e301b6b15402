//! Live nearby-entity sessions.
//!
//! A session owns the list of entities shown around the user and a source
//! stream of [`NearbyUpdate`]s. Each acknowledged mutation syncs the updated
//! list, so the host pipes the stream into its own tap to follow changes.

use crate::controls::await_ack;
use crate::error::{MapError, Result};
use crate::events::{EventBus, HandleEvent};
use crate::types::{ActivePosition, Entity, NearbyAction, NearbyUpdate, SessionId};
use bridge_traits::BridgeChannel;
use core_stream::Stream;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, error, warn};

struct Shared {
    id: SessionId,
    channel: Rc<dyn BridgeChannel>,
    ack_timeout: Duration,
    events: EventBus,
    closed: Cell<bool>,
    list: RefCell<Vec<Entity>>,
    stream: Stream<NearbyUpdate>,
}

impl Shared {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.get() {
            return Err(MapError::SessionClosed);
        }
        Ok(())
    }

    async fn request(&self, event: &str, payload: Value) -> Result<()> {
        let receiver = self.channel.emit_with_ack(event, payload)?;
        await_ack(event, receiver, self.ack_timeout).await?;
        Ok(())
    }

    fn publish(&self, action: NearbyAction, entity_id: Option<String>, dataset: Value) {
        self.events.publish(HandleEvent::Nearby { action, entity_id });

        let update = NearbyUpdate {
            action,
            dataset,
            list: self.list.borrow().clone(),
        };
        self.stream.sync(&update);
    }
}

/// Mutations of a live nearby list.
///
/// Each call waits for the renderer's acknowledgement, bounded by the nearby
/// timeout, then syncs a [`NearbyUpdate`] on the session stream.
#[derive(Clone)]
pub struct NearbyControls {
    shared: Rc<Shared>,
}

impl NearbyControls {
    /// Adds `entity`, replacing any entity with the same id.
    ///
    /// # Errors
    ///
    /// [`MapError::SessionClosed`] once the session is closed, otherwise any
    /// acknowledgement failure.
    pub async fn add(&self, entity: Entity) -> Result<()> {
        let shared = &self.shared;
        shared.ensure_open()?;

        let duplicate = {
            let mut list = shared.list.borrow_mut();
            let position = list.iter().position(|each| each.id == entity.id);
            position.map(|index| list.remove(index))
        };
        if let Some(previous) = duplicate {
            shared
                .channel
                .emit("remove:nearby:entity", json!(previous.id))?;
        }

        shared.list.borrow_mut().push(entity.clone());
        shared
            .request("add:nearby:entity", serde_json::to_value(&entity)?)
            .await?;

        debug!(session_id = %shared.id, entity_id = %entity.id, "Nearby entity added");
        let dataset = serde_json::to_value(&entity)?;
        shared.publish(NearbyAction::Add, Some(entity.id), dataset);
        Ok(())
    }

    /// Removes the entity with `id`.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let shared = &self.shared;
        shared.ensure_open()?;

        shared.list.borrow_mut().retain(|each| each.id != id);
        shared.request("remove:nearby:entity", json!(id)).await?;

        debug!(session_id = %shared.id, entity_id = id, "Nearby entity removed");
        shared.publish(NearbyAction::Remove, Some(id.to_string()), json!(id));
        Ok(())
    }

    /// Moves a mobile entity to a new position.
    pub async fn move_entity(&self, update: ActivePosition) -> Result<()> {
        let shared = &self.shared;
        shared.ensure_open()?;

        let dataset = serde_json::to_value(&update)?;
        shared
            .request("move:nearby:entity", dataset.clone())
            .await?;

        shared.publish(NearbyAction::Move, Some(update.id), dataset);
        Ok(())
    }
}

/// Handle on a live nearby list, returned by
/// [`Handles::nearby`](crate::Handles::nearby).
pub struct NearbySession {
    shared: Rc<Shared>,
    controls: NearbyControls,
}

impl NearbySession {
    pub(crate) fn open(
        channel: Rc<dyn BridgeChannel>,
        events: EventBus,
        ack_timeout: Duration,
        list: Vec<Entity>,
    ) -> Result<Self> {
        channel.emit("show:nearby", serde_json::to_value(&list)?)?;

        let shared = Rc::new(Shared {
            id: SessionId::new(),
            channel,
            ack_timeout,
            events,
            closed: Cell::new(false),
            list: RefCell::new(list),
            stream: Stream::new(),
        });

        let id = shared.id;
        let weak = Rc::downgrade(&shared);
        shared
            .stream
            .on_error(move |err| error!(session_id = %id, error = %err, "[Stream Error]"))
            .on_close(move || {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                if shared.closed.replace(true) {
                    return;
                }
                debug!(session_id = %shared.id, "Nearby stream closed, removing entities");
                if let Err(err) = shared.channel.emit("remove:nearby", Value::Null) {
                    warn!(session_id = %shared.id, error = %err, "Failed to remove nearby entities");
                }
            });

        debug!(session_id = %id, entities = shared.list.borrow().len(), "Nearby session opened");

        let controls = NearbyControls {
            shared: Rc::clone(&shared),
        };
        Ok(Self { shared, controls })
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// Hands the controls to `f`, then returns the session stream.
    pub fn live<F>(&self, f: F) -> Stream<NearbyUpdate>
    where
        F: FnOnce(NearbyControls),
    {
        f(self.controls.clone());
        self.shared.stream.clone()
    }

    pub fn controls(&self) -> NearbyControls {
        self.controls.clone()
    }

    pub fn stream(&self) -> Stream<NearbyUpdate> {
        self.shared.stream.clone()
    }

    /// Pipes session updates into `target`.
    pub fn pipe(&self, target: &Stream<NearbyUpdate>) -> &Self {
        self.shared.stream.pipe(target);
        self
    }

    /// Snapshot of the entities currently listed.
    pub fn list(&self) -> Vec<Entity> {
        self.shared.list.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        !self.shared.closed.get()
    }

    /// Removes every nearby entity from the map and closes the stream.
    ///
    /// Closing an already closed session does nothing.
    ///
    /// # Errors
    ///
    /// When the renderer refuses, the session stays open and
    /// [`MapError::Rejected`] is returned. If the stream was closed while the
    /// request was pending, the session stays closed either way.
    pub async fn close(&self) -> Result<()> {
        let shared = &self.shared;
        if shared.closed.replace(true) {
            return Ok(());
        }

        if let Err(err) = shared.request("remove:nearby", Value::Null).await {
            if shared.stream.is_active() {
                shared.closed.set(false);
            }
            return Err(err);
        }

        if shared.stream.is_active() {
            shared.stream.close();
        }
        debug!(session_id = %shared.id, "Nearby session closed");
        Ok(())
    }
}

impl std::fmt::Debug for NearbySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NearbySession")
            .field("id", &self.shared.id)
            .field("closed", &self.shared.closed.get())
            .field("entities", &self.shared.list.borrow().len())
            .finish()
    }
}
