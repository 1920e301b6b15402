//! # Host Bridge Traits
//!
//! Contracts between the map SDK core and the host platform.
//!
//! ## Overview
//!
//! The SDK never talks to the map renderer or the host logger directly. Each
//! capability is a trait implemented per host (React Native WebView bridge,
//! in-process loopback for tests and headless connectors).
//!
//! ## Traits
//!
//! - [`BridgeChannel`](channel::BridgeChannel) - Event-named message channel to the
//!   map renderer, with acknowledged requests
//! - [`LoggerSink`](logger::LoggerSink) - Forward structured logs to host logging
//!
//! ## Threading
//!
//! `BridgeChannel` implementations live on the host's single-threaded event
//! loop and carry non-`Send` handlers. `LoggerSink` must be `Send + Sync`
//! because it is driven from the `tracing` subscriber.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform failures into it with an actionable message.

pub mod channel;
pub mod error;
pub mod logger;

pub use error::BridgeError;

pub use channel::{Ack, AckReceiver, AckSender, BridgeChannel, EventHandler};
pub use logger::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
