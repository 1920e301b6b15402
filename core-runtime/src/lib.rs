//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the map SDK:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! Every other SDK crate logs through `tracing` and is configured through the
//! [`MapConfig`](config::MapConfig) built here. The host initializes logging
//! once, builds a config around its bridge channel, and hands it to the map
//! handles.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{MapConfig, MapConfigBuilder};
pub use error::{Error, Result};
