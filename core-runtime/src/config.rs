//! # Map Configuration Module
//!
//! Provides configuration management for the map SDK handles.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `MapConfig`
//! instance holding the bridge channel and the timing settings used by the
//! handles layer. It enforces fail-fast validation so a host that forgot to
//! inject its channel learns about it at startup rather than on the first
//! location update.
//!
//! ## Required Dependencies
//!
//! - `BridgeChannel` - Message channel to the map renderer
//!
//! ## Defaults
//!
//! | Setting | Default |
//! |---------|---------|
//! | `ack_timeout` | 12 s |
//! | `nearby_ack_timeout` | 8 s |
//! | `event_buffer_size` | 100 |
//! | `default_user_type` | `client` |
//!
//! ## Usage
//!
//! ```
//! use bridge_local::LocalChannel;
//! use core_runtime::config::MapConfig;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! let config = MapConfig::builder()
//!     .channel(Rc::new(LocalChannel::new()))
//!     .ack_timeout(Duration::from_secs(5))
//!     .build()
//!     .expect("Failed to build config");
//!
//! assert_eq!(config.nearby_ack_timeout, Duration::from_secs(8));
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::MapConfig;
//!
//! // This will panic with an actionable error message
//! let config = MapConfig::builder()
//!     .build()
//!     .expect("Should fail - missing bridge channel");
//! ```

use crate::error::{Error, Result};
use bridge_traits::BridgeChannel;
use std::rc::Rc;
use std::time::Duration;

/// Acknowledgement timeout for renderer requests.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(12_000);

/// Acknowledgement timeout for nearby entity controls.
pub const DEFAULT_NEARBY_ACK_TIMEOUT: Duration = Duration::from_millis(8_000);

/// Capacity of the handle event bus.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// User type pinned by `my_location` when none is given.
pub const DEFAULT_USER_TYPE: &str = "client";

/// Configuration for the map handles.
///
/// Holds the renderer channel, so it lives on the host's event loop thread.
/// Use [`MapConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct MapConfig {
    /// Channel to the map renderer (required)
    pub channel: Rc<dyn BridgeChannel>,

    /// Upper bound on waiting for a renderer acknowledgement
    pub ack_timeout: Duration,

    /// Upper bound on waiting for a nearby control acknowledgement
    pub nearby_ack_timeout: Duration,

    /// Capacity of the handle event bus
    pub event_buffer_size: usize,

    /// User type pinned when the caller gives none
    pub default_user_type: String,
}

impl std::fmt::Debug for MapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapConfig")
            .field("channel", &"BridgeChannel { ... }")
            .field("ack_timeout", &self.ack_timeout)
            .field("nearby_ack_timeout", &self.nearby_ack_timeout)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("default_user_type", &self.default_user_type)
            .finish()
    }
}

impl MapConfig {
    /// Creates a new builder for constructing a `MapConfig`.
    pub fn builder() -> MapConfigBuilder {
        MapConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Both acknowledgement timeouts are non-zero
    /// - The event buffer holds at least one event
    /// - The default user type is not blank
    pub fn validate(&self) -> Result<()> {
        if self.ack_timeout.is_zero() {
            return Err(Error::Config(
                "Acknowledgement timeout must be greater than 0ms".to_string(),
            ));
        }

        if self.nearby_ack_timeout.is_zero() {
            return Err(Error::Config(
                "Nearby acknowledgement timeout must be greater than 0ms".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.default_user_type.trim().is_empty() {
            return Err(Error::Config(
                "Default user type cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn channel_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "BridgeChannel".to_string(),
        message: "BridgeChannel implementation is required to reach the map renderer. \
                 React Native: inject the WebView message bridge. \
                 Tests and headless hosts: inject bridge_local::LocalChannel."
            .to_string(),
    }
}

/// Builder for constructing [`MapConfig`] instances.
///
/// Call [`build()`](MapConfigBuilder::build) once every option is set.
#[derive(Default)]
pub struct MapConfigBuilder {
    channel: Option<Rc<dyn BridgeChannel>>,
    ack_timeout: Option<Duration>,
    nearby_ack_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
    default_user_type: Option<String>,
}

impl MapConfigBuilder {
    /// Sets the renderer channel.
    pub fn channel(mut self, channel: Rc<dyn BridgeChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Sets the acknowledgement timeout for renderer requests.
    ///
    /// Default: 12 seconds
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = Some(timeout);
        self
    }

    /// Sets the acknowledgement timeout for nearby entity controls.
    ///
    /// Default: 8 seconds
    pub fn nearby_ack_timeout(mut self, timeout: Duration) -> Self {
        self.nearby_ack_timeout = Some(timeout);
        self
    }

    /// Sets the capacity of the handle event bus.
    ///
    /// Slow subscribers lagging by more than this many events miss the oldest
    /// ones. Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the user type pinned by `my_location` by default.
    pub fn default_user_type(mut self, user_type: impl Into<String>) -> Self {
        self.default_user_type = Some(user_type.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no channel was provided
    /// - [`Error::Config`] when a setting fails validation
    pub fn build(self) -> Result<MapConfig> {
        let channel = self.channel.ok_or_else(channel_missing_error)?;

        let config = MapConfig {
            channel,
            ack_timeout: self.ack_timeout.unwrap_or(DEFAULT_ACK_TIMEOUT),
            nearby_ack_timeout: self
                .nearby_ack_timeout
                .unwrap_or(DEFAULT_NEARBY_ACK_TIMEOUT),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            default_user_type: self
                .default_user_type
                .unwrap_or_else(|| DEFAULT_USER_TYPE.to_string()),
        };

        config.validate()?;

        Ok(config)
    }
}
