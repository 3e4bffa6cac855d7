//! Builder pattern for manager configuration.
//!
//! Provides a fluent API for configuring and creating [`ResourceManager`]
//! instances.
//!
//! # Example
//!
//! ```ignore
//! use rtc_resource_manager::{MergePolicy, ResourceManager};
//!
//! let manager = ResourceManager::builder()
//!     .channel(ws_channel)
//!     .rtc_facade(facade)
//!     .connection_ttl_ms(30_000)
//!     .merge_policy(MergePolicy::CallerOverrides)
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::channel::{ChannelHandle, SignalingChannel};
use crate::error::Result;
use crate::rtc::{IceServer, RtcConfig, RtcFacade};

use super::config::{ManagerConfig, MergePolicy};
use super::core::ResourceManager;

// ============================================================================
// ManagerBuilder
// ============================================================================

/// Builder for configuring a [`ResourceManager`] instance.
///
/// Use [`ResourceManager::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct ManagerBuilder {
    /// Caller configuration.
    config: ManagerConfig,
    /// How it combines with the built-in defaults.
    policy: MergePolicy,
}

// ============================================================================
// ManagerBuilder Implementation
// ============================================================================

impl ManagerBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default channel.
    #[inline]
    #[must_use]
    pub fn channel(self, channel: impl SignalingChannel) -> Self {
        self.channel_handle(ChannelHandle::from_channel(channel))
    }

    /// Sets the default channel from an existing handle.
    #[inline]
    #[must_use]
    pub fn channel_handle(mut self, handle: ChannelHandle) -> Self {
        self.config.channel = Some(handle);
        self
    }

    /// Sets the peer connection factory.
    #[inline]
    #[must_use]
    pub fn rtc_facade(self, facade: impl RtcFacade) -> Self {
        self.shared_rtc_facade(Arc::new(facade))
    }

    /// Sets a shared peer connection factory.
    #[inline]
    #[must_use]
    pub fn shared_rtc_facade(mut self, facade: Arc<dyn RtcFacade>) -> Self {
        self.config.rtc_facade = Some(facade);
        self
    }

    /// Sets the ICE configuration.
    ///
    /// Under [`MergePolicy::DefaultsWin`] the built-in ICE servers are used
    /// regardless.
    #[inline]
    #[must_use]
    pub fn rtc_config(mut self, config: RtcConfig) -> Self {
        self.config.rtc_config = Some(config);
        self
    }

    /// Adds one ICE server to the caller ICE configuration.
    #[must_use]
    pub fn ice_server(mut self, server: IceServer) -> Self {
        self.config
            .rtc_config
            .get_or_insert_with(|| RtcConfig::with_servers(Vec::new()))
            .ice_servers
            .push(server);
        self
    }

    /// Sets the eviction TTL.
    ///
    /// Under [`MergePolicy::DefaultsWin`] the built-in TTL is used
    /// regardless.
    #[inline]
    #[must_use]
    pub fn connection_ttl(mut self, ttl: Duration) -> Self {
        self.config.connection_ttl = Some(ttl);
        self
    }

    /// Sets the eviction TTL in milliseconds.
    #[inline]
    #[must_use]
    pub fn connection_ttl_ms(self, ttl_ms: u64) -> Self {
        self.connection_ttl(Duration::from_millis(ttl_ms))
    }

    /// Sets the merge policy.
    #[inline]
    #[must_use]
    pub fn merge_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the manager with validation.
    ///
    /// # Errors
    ///
    /// See [`ResourceManager::new`].
    pub fn build(self) -> Result<ResourceManager> {
        ResourceManager::with_policy(self.config, self.policy)
    }
}

// ============================================================================
// Tests
// ============================================================================
