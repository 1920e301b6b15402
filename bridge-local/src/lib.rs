//! # Local Bridge Implementation
//!
//! In-process implementation of the bridge traits for hosts that drive the
//! SDK without a WebView renderer (backend connectors, integration tests).
//!
//! ## Overview
//!
//! - [`LocalChannel`] implements `BridgeChannel` as a loopback: outgoing
//!   messages are recorded, renderer events are injected with
//!   [`LocalChannel::dispatch`], and acknowledgements are produced either by
//!   installed responders or manually with [`LocalChannel::acknowledge`].
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_local::LocalChannel;
//! use bridge_traits::{Ack, BridgeChannel};
//! use std::rc::Rc;
//!
//! let channel = Rc::new(LocalChannel::new());
//! channel.respond_with("set:route", |_| Ack::ok());
//!
//! let bridge: Rc<dyn BridgeChannel> = channel.clone();
//! // hand `bridge` to MapConfig::builder().channel(bridge)
//! ```

mod channel;

pub use channel::{LocalChannel, SentMessage};
