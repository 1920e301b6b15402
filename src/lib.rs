//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map to the individual workspace
//! crates (`core-stream`, `core-map`, `bridge-local`). Host applications can
//! depend on `msi-workspace` and enable the documented features without
//! wiring each crate individually.
//!
//! - `handles` (default): the map handles layer and its runtime
//! - `local-bridge`: the in-process loopback bridge channel

pub use core_stream as stream;

#[cfg(feature = "handles")]
pub use core_map as map;

#[cfg(feature = "handles")]
pub use core_runtime as runtime;

#[cfg(feature = "local-bridge")]
pub use bridge_local as local;
