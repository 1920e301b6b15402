//! The [`Stream`] relay primitive.
//!
//! A stream is a shared handle (`Rc<RefCell<..>>`); cloning it yields another
//! handle to the same stream. Everything runs on the caller's thread and
//! completes synchronously, so no operation ever suspends or locks.
//!
//! Listeners and hooks are invoked without any internal borrow held, which
//! allows them to re-enter the stream (close it, raise an error, register
//! more listeners) from inside a callback.

use crate::error::{Result, StreamError};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

type DataListener<T> = Rc<dyn Fn(&T)>;
type ErrorHook = Rc<dyn Fn(&StreamError)>;
type CloseHook = Rc<dyn Fn()>;

struct Inner<T> {
    id: u64,
    closed: bool,
    /// Set while this stream is forwarding an error, so cyclic chains stop.
    propagating: bool,
    listeners: Vec<DataListener<T>>,
    downstream: Option<Stream<T>>,
    upstream: Option<Weak<RefCell<Inner<T>>>>,
    error_hook: ErrorHook,
    close_hook: CloseHook,
}

impl<T> Inner<T> {
    fn new() -> Self {
        Self {
            id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
            closed: false,
            propagating: false,
            listeners: Vec::new(),
            downstream: None,
            upstream: None,
            error_hook: Rc::new(|_: &StreamError| {}),
            close_hook: Rc::new(|| {}),
        }
    }
}

/// Directional, chainable conduit of discrete values.
///
/// See the [crate documentation](crate) for the source/tap roles. The value
/// type is fixed per stream; streams can only be piped into streams carrying
/// the same type.
///
/// # Example
///
/// ```rust
/// use core_stream::Stream;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let a: Stream<&'static str> = Stream::new();
/// let b: Stream<&'static str> = Stream::new();
///
/// let closed = Rc::new(Cell::new(false));
/// let flag = Rc::clone(&closed);
/// b.on_close(move || flag.set(true));
///
/// a.pipe(&b);
/// a.close();
///
/// assert!(closed.get());
/// assert!(!b.is_active());
/// ```
pub struct Stream<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Default for Stream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Stream<T> {
    /// Creates an open stream with no listeners, no links and no-op hooks.
    pub fn new() -> Self {
        let inner = Inner::new();
        trace!(stream_id = inner.id, "Stream created");
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    /// Process-unique identifier, used as a log field.
    pub fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    /// Registers a data listener.
    ///
    /// Listeners run in registration order for every value delivered to this
    /// stream after registration. Nothing is replayed.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Closed`] when the stream has been closed. This
    /// signals a programming error at the call site and must not be retried.
    pub fn on_data<F>(&self, listener: F) -> Result<&Self>
    where
        F: Fn(&T) + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        if inner.closed {
            debug!(stream_id = inner.id, "Rejected listener on closed stream");
            return Err(StreamError::Closed);
        }

        inner.listeners.push(Rc::new(listener));
        Ok(self)
    }

    /// Pushes `value` to the listeners of the downstream target.
    ///
    /// This stream's own listeners are not notified. Without a downstream, or
    /// when either end is closed, the call does nothing.
    pub fn sync(&self, value: &T) {
        let downstream = {
            let inner = self.inner.borrow();
            if inner.closed {
                return;
            }
            inner.downstream.clone()
        };

        if let Some(downstream) = downstream {
            downstream.deliver(value);
        }
    }

    /// Notifies this stream's own listeners. Reached only through an
    /// upstream's [`sync`](Self::sync).
    fn deliver(&self, value: &T) {
        let (id, listeners) = {
            let inner = self.inner.borrow();
            if inner.closed {
                return;
            }
            (inner.id, inner.listeners.clone())
        };

        for listener in listeners {
            // A listener may close the stream mid-delivery.
            if self.inner.borrow().closed {
                break;
            }

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(value))) {
                warn!(
                    stream_id = id,
                    panic = %panic_message(payload.as_ref()),
                    "Data listener panicked, continuing delivery"
                );
            }
        }
    }

    /// Links this stream as the upstream producer of `target`.
    ///
    /// Replaces any previous downstream; the replaced target forgets this
    /// stream as its upstream. Returns `self` for chained configuration.
    /// Piping from a closed stream does nothing.
    pub fn pipe(&self, target: &Stream<T>) -> &Self {
        let (id, previous) = {
            let mut inner = self.inner.borrow_mut();
            if inner.closed {
                trace!(stream_id = inner.id, "Ignored pipe from closed stream");
                return self;
            }
            (inner.id, inner.downstream.replace(target.clone()))
        };

        if let Some(previous) = previous {
            if !previous.ptr_eq(target) {
                previous.forget_upstream(self);
            }
        }

        target.inner.borrow_mut().upstream = Some(Rc::downgrade(&self.inner));
        trace!(stream_id = id, target_id = target.id(), "Stream piped");
        self
    }

    /// Raises a fault on this stream and every stream downstream of it.
    ///
    /// The own error hook runs first, then the same error is forwarded along
    /// the chain. A closed stream skips its own hook but still forwards.
    /// Never closes anything and never fails.
    pub fn error(&self, error: impl Into<StreamError>) -> &Self {
        let error = error.into();
        self.propagate(&error);
        self
    }

    fn propagate(&self, error: &StreamError) {
        let (hook, downstream) = {
            let mut inner = self.inner.borrow_mut();
            if inner.propagating {
                return;
            }
            inner.propagating = true;

            let hook = (!inner.closed).then(|| Rc::clone(&inner.error_hook));
            (hook, inner.downstream.clone())
        };

        if let Some(hook) = hook {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| hook(error))) {
                warn!(
                    stream_id = self.id(),
                    panic = %panic_message(payload.as_ref()),
                    "Error hook panicked, continuing propagation"
                );
            }
        }
        if let Some(downstream) = downstream {
            downstream.propagate(error);
        }

        self.inner.borrow_mut().propagating = false;
    }

    /// Tears the stream down.
    ///
    /// Marks it closed, drops every listener, runs the close hook once and
    /// closes the downstream target. The upstream is never closed; it only
    /// loses its link to this stream. Calling `close` again does nothing.
    pub fn close(&self) {
        let (id, hook, downstream, upstream) = {
            let mut inner = self.inner.borrow_mut();
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.listeners.clear();

            let hook = std::mem::replace(&mut inner.close_hook, Rc::new(|| {}));
            (
                inner.id,
                hook,
                inner.downstream.clone(),
                inner.upstream.take(),
            )
        };

        debug!(stream_id = id, "Stream closed");

        if let Some(upstream) = upstream.and_then(|weak| weak.upgrade()) {
            if let Ok(mut upstream) = upstream.try_borrow_mut() {
                let points_here = upstream
                    .downstream
                    .as_ref()
                    .is_some_and(|downstream| downstream.ptr_eq(self));
                if points_here {
                    upstream.downstream = None;
                }
            }
        }

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| hook())) {
            warn!(
                stream_id = id,
                panic = %panic_message(payload.as_ref()),
                "Close hook panicked, closing downstream anyway"
            );
        }

        if let Some(downstream) = downstream {
            downstream.close();
        }
    }

    /// Returns `true` until [`close`](Self::close) has run.
    pub fn is_active(&self) -> bool {
        !self.inner.borrow().closed
    }

    /// Replaces the error hook. The default hook ignores the error.
    pub fn on_error<F>(&self, hook: F) -> &Self
    where
        F: Fn(&StreamError) + 'static,
    {
        self.inner.borrow_mut().error_hook = Rc::new(hook);
        self
    }

    /// Replaces the close hook. The hook runs at most once.
    pub fn on_close<F>(&self, hook: F) -> &Self
    where
        F: Fn() + 'static,
    {
        self.inner.borrow_mut().close_hook = Rc::new(hook);
        self
    }

    /// Current downstream target, if any.
    pub fn downstream(&self) -> Option<Stream<T>> {
        self.inner.borrow().downstream.clone()
    }

    /// Whether a live upstream stream is piped into this one.
    pub fn has_upstream(&self) -> bool {
        self.inner
            .borrow()
            .upstream
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Number of registered data listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Non-owning handle for use inside this stream's own listeners and hooks.
    pub fn downgrade(&self) -> WeakStream<T> {
        WeakStream {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles refer to the same stream.
    pub fn ptr_eq(&self, other: &Stream<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn forget_upstream(&self, upstream: &Stream<T>) {
        let mut inner = self.inner.borrow_mut();
        let linked = inner
            .upstream
            .as_ref()
            .is_some_and(|weak| Weak::ptr_eq(weak, &Rc::downgrade(&upstream.inner)));
        if linked {
            inner.upstream = None;
        }
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Stream")
                .field("id", &inner.id)
                .field("closed", &inner.closed)
                .field("listeners", &inner.listeners.len())
                .field("has_downstream", &inner.downstream.is_some())
                .finish(),
            Err(_) => f.debug_struct("Stream").finish_non_exhaustive(),
        }
    }
}

/// Weak counterpart of [`Stream`].
///
/// Listeners that need to act on their own stream (raise a fault, close it)
/// should capture a `WeakStream`; capturing a strong handle would keep the
/// stream alive through its own listener list.
pub struct WeakStream<T> {
    inner: Weak<RefCell<Inner<T>>>,
}

impl<T> Clone for WeakStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> WeakStream<T> {
    /// Returns the stream if any strong handle is still alive.
    pub fn upgrade(&self) -> Option<Stream<T>> {
        self.inner.upgrade().map(|inner| Stream { inner })
    }
}

impl<T> fmt::Debug for WeakStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStream")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl Fn(&T) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |value: &T| sink.borrow_mut().push(value.clone()))
    }

    #[test]
    fn test_new_stream_is_active() {
        let stream: Stream<u8> = Stream::new();
        assert!(stream.is_active());
        assert_eq!(stream.listener_count(), 0);
        assert!(stream.downstream().is_none());
        assert!(!stream.has_upstream());
    }

    #[test]
    fn test_ids_are_unique() {
        let a: Stream<u8> = Stream::new();
        let b: Stream<u8> = Stream::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn test_sync_without_downstream_is_noop() {
        let stream: Stream<u8> = Stream::new();
        let (seen, listener) = recorder();
        stream.on_data(listener).unwrap();

        stream.sync(&1);

        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_pipe_to_self_delivers_to_own_listeners() {
        let stream: Stream<u8> = Stream::new();
        let (seen, listener) = recorder();
        stream.on_data(listener).unwrap();

        stream.pipe(&stream);
        stream.sync(&5);

        assert_eq!(*seen.borrow(), vec![5]);
    }

    #[test]
    fn test_pipe_replaces_previous_downstream() {
        let source: Stream<u8> = Stream::new();
        let first: Stream<u8> = Stream::new();
        let second: Stream<u8> = Stream::new();
        let (first_seen, first_listener) = recorder();
        let (second_seen, second_listener) = recorder();
        first.on_data(first_listener).unwrap();
        second.on_data(second_listener).unwrap();

        source.pipe(&first);
        assert!(first.has_upstream());

        source.pipe(&second);
        source.sync(&9);

        assert!(first_seen.borrow().is_empty());
        assert_eq!(*second_seen.borrow(), vec![9]);
        assert!(!first.has_upstream());
        assert!(second.has_upstream());
        assert!(source.downstream().unwrap().ptr_eq(&second));
    }

    #[test]
    fn test_pipe_after_close_is_ignored() {
        let source: Stream<u8> = Stream::new();
        let target: Stream<u8> = Stream::new();

        source.close();
        source.pipe(&target);

        assert!(source.downstream().is_none());
        assert!(!target.has_upstream());
        assert!(target.is_active());
    }

    #[test]
    fn test_sync_into_closed_downstream_is_noop() {
        let source: Stream<u8> = Stream::new();
        let target: Stream<u8> = Stream::new();
        let (seen, listener) = recorder();
        target.on_data(listener).unwrap();
        source.pipe(&target);

        target.close();
        source.sync(&1);

        assert!(seen.borrow().is_empty());
        assert!(source.is_active());
    }

    #[test]
    fn test_close_detaches_from_upstream() {
        let source: Stream<u8> = Stream::new();
        let target: Stream<u8> = Stream::new();
        source.pipe(&target);

        target.close();

        assert!(source.downstream().is_none());
        assert!(!target.has_upstream());
    }

    #[test]
    fn test_close_clears_listeners() {
        let stream: Stream<u8> = Stream::new();
        stream.on_data(|_| {}).unwrap();
        stream.on_data(|_| {}).unwrap();
        assert_eq!(stream.listener_count(), 2);

        stream.close();

        assert_eq!(stream.listener_count(), 0);
    }

    #[test]
    fn test_listener_closing_stream_stops_delivery() {
        let source: Stream<u8> = Stream::new();
        let target: Stream<u8> = Stream::new();
        let weak = target.downgrade();
        target
            .on_data(move |_| {
                if let Some(stream) = weak.upgrade() {
                    stream.close();
                }
            })
            .unwrap();
        let (seen, listener) = recorder();
        target.on_data(listener).unwrap();
        source.pipe(&target);

        source.sync(&1);

        assert!(seen.borrow().is_empty());
        assert!(!target.is_active());
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let source: Stream<u8> = Stream::new();
        let target: Stream<u8> = Stream::new();
        target.on_data(|_| panic!("listener failure")).unwrap();
        let (seen, listener) = recorder();
        target.on_data(listener).unwrap();
        source.pipe(&target);

        source.sync(&1);
        source.sync(&2);

        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_panicking_error_hook_does_not_swallow_later_errors() {
        let source: Stream<Option<u8>> = Stream::new();
        let target: Stream<Option<u8>> = Stream::new();
        let weak = target.downgrade();
        target
            .on_data(move |_| {
                if let Some(stream) = weak.upgrade() {
                    stream.error("Invalid Data");
                }
            })
            .unwrap();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        target.on_error(move |_| {
            *counter.borrow_mut() += 1;
            if *counter.borrow() == 1 {
                panic!("hook failure");
            }
        });
        source.pipe(&target);

        source.sync(&None);
        target.error("second");
        target.error("third");

        assert_eq!(*calls.borrow(), 3);
    }

    #[test]
    fn test_panicking_close_hook_still_cascades() {
        let source: Stream<u8> = Stream::new();
        let target: Stream<u8> = Stream::new();
        source.pipe(&target);
        source.on_close(|| panic!("close hook failure"));

        source.close();

        assert!(!source.is_active());
        assert!(!target.is_active());
    }

    #[test]
    fn test_listener_may_raise_error_on_own_stream() {
        let source: Stream<Option<u8>> = Stream::new();
        let target: Stream<Option<u8>> = Stream::new();
        let weak = target.downgrade();
        target
            .on_data(move |value| {
                if value.is_none() {
                    if let Some(stream) = weak.upgrade() {
                        stream.error("Invalid Data");
                    }
                }
            })
            .unwrap();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&errors);
        target.on_error(move |error| sink.borrow_mut().push(error.to_string()));
        source.pipe(&target);

        source.sync(&Some(1));
        source.sync(&None);

        assert_eq!(*errors.borrow(), vec!["Invalid Data".to_string()]);
        assert!(target.is_active());
    }

    #[test]
    fn test_error_hook_is_replaced() {
        let stream: Stream<u8> = Stream::new();
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let first_count = Rc::clone(&first);
        let second_count = Rc::clone(&second);

        stream
            .on_error(move |_| first_count.set(first_count.get() + 1))
            .on_error(move |_| second_count.set(second_count.get() + 1));
        stream.error("boom");

        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn test_error_without_hook_is_swallowed() {
        let stream: Stream<u8> = Stream::new();
        stream.error("ignored").error(StreamError::fault("also ignored"));
        assert!(stream.is_active());
    }

    #[test]
    fn test_error_after_close_skips_own_hook() {
        let stream: Stream<u8> = Stream::new();
        let calls = Rc::new(Cell::new(0));
        let count = Rc::clone(&calls);
        stream.on_error(move |_| count.set(count.get() + 1));

        stream.close();
        stream.error("late");

        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_error_forwarded_past_closed_stream() {
        let a: Stream<u8> = Stream::new();
        let b: Stream<u8> = Stream::new();
        let c: Stream<u8> = Stream::new();
        a.pipe(&b);
        b.pipe(&c);
        let calls = Rc::new(Cell::new(0));
        let count = Rc::clone(&calls);
        c.on_error(move |_| count.set(count.get() + 1));

        // Closing `b` also closes `c`, and `a` loses its downstream link.
        b.close();
        a.error("boom");

        assert_eq!(calls.get(), 0);
        assert!(a.is_active());
    }

    #[test]
    fn test_error_in_cyclic_chain_terminates() {
        let a: Stream<u8> = Stream::new();
        let b: Stream<u8> = Stream::new();
        a.pipe(&b);
        b.pipe(&a);

        let calls = Rc::new(RefCell::new(Vec::new()));
        let from_a = Rc::clone(&calls);
        let from_b = Rc::clone(&calls);
        a.on_error(move |_| from_a.borrow_mut().push("a"));
        b.on_error(move |_| from_b.borrow_mut().push("b"));

        a.error("loop");

        assert_eq!(*calls.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_close_in_cyclic_chain_terminates() {
        let a: Stream<u8> = Stream::new();
        let b: Stream<u8> = Stream::new();
        a.pipe(&b);
        b.pipe(&a);

        a.close();

        assert!(!a.is_active());
        assert!(!b.is_active());
    }

    #[test]
    fn test_close_hook_registered_after_close_never_runs() {
        let stream: Stream<u8> = Stream::new();
        stream.close();

        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        stream.on_close(move || flag.set(true));
        stream.close();

        assert!(!ran.get());
    }

    #[test]
    fn test_close_hook_released_after_run() {
        let stream: Stream<u8> = Stream::new();
        let resource = Rc::new(());
        let held = Rc::clone(&resource);
        stream.on_close(move || {
            let _ = &held;
        });
        assert_eq!(Rc::strong_count(&resource), 2);

        stream.close();

        assert_eq!(Rc::strong_count(&resource), 1);
    }

    #[test]
    fn test_weak_stream_upgrade() {
        let stream: Stream<u8> = Stream::new();
        let weak = stream.downgrade();
        assert!(weak.upgrade().unwrap().ptr_eq(&stream));

        drop(stream);

        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_listener_registered_during_delivery_sees_next_value() {
        let source: Stream<u8> = Stream::new();
        let target: Stream<u8> = Stream::new();
        let (seen, listener) = recorder();
        let pending = RefCell::new(Some(listener));
        let weak = target.downgrade();
        target
            .on_data(move |_| {
                if let (Some(listener), Some(stream)) = (pending.borrow_mut().take(), weak.upgrade())
                {
                    stream.on_data(listener).unwrap();
                }
            })
            .unwrap();
        source.pipe(&target);

        source.sync(&1);
        source.sync(&2);

        assert_eq!(*seen.borrow(), vec![2]);
    }

    #[test]
    fn test_debug_output() {
        let stream: Stream<u8> = Stream::new();
        let rendered = format!("{:?}", stream);
        assert!(rendered.contains("Stream"));
        assert!(rendered.contains("closed: false"));
    }
}
