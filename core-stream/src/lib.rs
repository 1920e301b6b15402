//! # Core Stream
//!
//! Single-threaded, chainable data relay used to route live location and
//! navigation events between the map bridge and the host application.
//!
//! ## Overview
//!
//! A [`Stream`] plays one of two roles depending on which end a caller holds:
//!
//! - **Source**: a producer calls [`Stream::sync`] on it. The value is not
//!   delivered to the source's own listeners but to the listeners of the
//!   stream it is piped into.
//! - **Tap**: a consumer registers listeners with [`Stream::on_data`] and
//!   receives whatever the upstream source syncs.
//!
//! ```text
//!  producer ──sync──> ┌────────┐  pipe  ┌────────┐ ──deliver──> listeners
//!                     │ source ├───────>│  tap   │
//!                     └────────┘        └────────┘
//! ```
//!
//! A stream intended as the terminal consumer point must therefore be the
//! *target* of a [`Stream::pipe`] call.
//!
//! ## Usage
//!
//! ```rust
//! use core_stream::Stream;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let source: Stream<u32> = Stream::new();
//! let tap: Stream<u32> = Stream::new();
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! tap.on_data(move |value| sink.borrow_mut().push(*value)).unwrap();
//!
//! source.pipe(&tap);
//! source.sync(&7);
//! source.close();
//! source.sync(&8);
//!
//! assert_eq!(*seen.borrow(), vec![7]);
//! assert!(!tap.is_active());
//! ```
//!
//! ## Error Handling
//!
//! Registering a listener on a closed stream returns [`StreamError::Closed`].
//! Every other operation on a closed stream is a silent no-op. Faults injected
//! with [`Stream::error`] are observed through hooks, never returned.

pub mod error;
pub mod stream;

pub use error::{Result, StreamError};
pub use stream::{Stream, WeakStream};
