//! Manager configuration and the defaults merge.
//!
//! # Merge Policy
//!
//! Under [`MergePolicy::DefaultsWin`] (the default) a caller value is only
//! used where the built-in default is absent. The built-in defaults set a
//! TTL and an ICE configuration but no channel and no facade, so callers
//! supply those two and get the built-in TTL and ICE servers regardless of
//! what else they pass. [`MergePolicy::CallerOverrides`] gives the
//! conventional behavior.
//!
//! # Example
//!
//! ```ignore
//! use rtc_resource_manager::{ManagerConfig, MergePolicy};
//!
//! let config = ManagerConfig::new()
//!     .with_channel(channel)
//!     .with_rtc_facade(facade)
//!     .with_connection_ttl_ms(30_000);
//!
//! let merged = config.merge(&ManagerConfig::defaults(), MergePolicy::CallerOverrides);
//! assert_eq!(merged.connection_ttl, Some(Duration::from_secs(30)));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::channel::{ChannelHandle, validate_channel};
use crate::error::{Error, Result};
use crate::rtc::{RtcConfig, RtcFacade};

// ============================================================================
// Constants
// ============================================================================

/// Built-in idle time before an unused connection is evicted.
pub const DEFAULT_CONNECTION_TTL: Duration = Duration::from_millis(10_000);

// ============================================================================
// MergePolicy
// ============================================================================

/// How caller configuration combines with the built-in defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MergePolicy {
    /// A built-in default wins; caller values fill absent defaults only.
    #[default]
    DefaultsWin,
    /// Caller values win; defaults fill what the caller leaves unset.
    CallerOverrides,
}

// ============================================================================
// ManagerConfig
// ============================================================================

/// Caller-supplied manager configuration.
///
/// Every field is optional here; the manager rejects a merged configuration
/// that lacks a channel, a facade or an ICE configuration.
#[derive(Clone, Default)]
pub struct ManagerConfig {
    /// Default channel, registered at construction.
    pub channel: Option<ChannelHandle>,

    /// Idle time before eviction.
    pub connection_ttl: Option<Duration>,

    /// Peer connection factory.
    pub rtc_facade: Option<Arc<dyn RtcFacade>>,

    /// ICE configuration handed to the facade.
    pub rtc_config: Option<RtcConfig>,
}

impl fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("channel", &self.channel.as_ref().map(ChannelHandle::id))
            .field("connection_ttl", &self.connection_ttl)
            .field("rtc_facade", &self.rtc_facade.as_ref().map(|_| "<facade>"))
            .field("rtc_config", &self.rtc_config)
            .finish()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ManagerConfig {
    /// Creates an empty configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the built-in defaults.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            channel: None,
            connection_ttl: Some(DEFAULT_CONNECTION_TTL),
            rtc_facade: None,
            rtc_config: Some(RtcConfig::default()),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ManagerConfig {
    /// Sets the default channel.
    #[inline]
    #[must_use]
    pub fn with_channel(mut self, channel: ChannelHandle) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Sets the eviction TTL.
    #[inline]
    #[must_use]
    pub fn with_connection_ttl(mut self, ttl: Duration) -> Self {
        self.connection_ttl = Some(ttl);
        self
    }

    /// Sets the eviction TTL in milliseconds.
    #[inline]
    #[must_use]
    pub fn with_connection_ttl_ms(self, ttl_ms: u64) -> Self {
        self.with_connection_ttl(Duration::from_millis(ttl_ms))
    }

    /// Sets the peer connection factory.
    #[inline]
    #[must_use]
    pub fn with_rtc_facade(mut self, facade: Arc<dyn RtcFacade>) -> Self {
        self.rtc_facade = Some(facade);
        self
    }

    /// Sets the ICE configuration.
    #[inline]
    #[must_use]
    pub fn with_rtc_config(mut self, config: RtcConfig) -> Self {
        self.rtc_config = Some(config);
        self
    }
}

// ============================================================================
// Merge & Validation
// ============================================================================

impl ManagerConfig {
    /// Combines this (caller) configuration with `defaults`.
    #[must_use]
    pub fn merge(self, defaults: &ManagerConfig, policy: MergePolicy) -> ManagerConfig {
        let defaults = defaults.clone();

        match policy {
            MergePolicy::DefaultsWin => ManagerConfig {
                channel: defaults.channel.or(self.channel),
                connection_ttl: defaults.connection_ttl.or(self.connection_ttl),
                rtc_facade: defaults.rtc_facade.or(self.rtc_facade),
                rtc_config: defaults.rtc_config.or(self.rtc_config),
            },
            MergePolicy::CallerOverrides => ManagerConfig {
                channel: self.channel.or(defaults.channel),
                connection_ttl: self.connection_ttl.or(defaults.connection_ttl),
                rtc_facade: self.rtc_facade.or(defaults.rtc_facade),
                rtc_config: self.rtc_config.or(defaults.rtc_config),
            },
        }
    }

    /// Checks a merged configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the channel, facade or ICE
    /// configuration is missing or invalid, or if the TTL is zero.
    pub(crate) fn validate(self) -> Result<ResolvedConfig> {
        let channel = self
            .channel
            .ok_or_else(|| Error::validation("a default channel is required"))?;
        validate_channel(&channel)?;

        let rtc_facade = self
            .rtc_facade
            .ok_or_else(|| Error::validation("an RTC facade is required"))?;

        let rtc_config = self
            .rtc_config
            .ok_or_else(|| Error::validation("an RTC configuration is required"))?;
        rtc_config.validate()?;

        let connection_ttl = self.connection_ttl.unwrap_or(DEFAULT_CONNECTION_TTL);
        if connection_ttl.is_zero() {
            return Err(Error::validation("connection TTL must be non-zero"));
        }

        Ok(ResolvedConfig {
            channel,
            connection_ttl,
            rtc_facade,
            rtc_config,
        })
    }
}

// ============================================================================
// ResolvedConfig
// ============================================================================

/// Validated configuration held by a running manager.
#[derive(Clone)]
pub(crate) struct ResolvedConfig {
    pub(crate) channel: ChannelHandle,
    pub(crate) connection_ttl: Duration,
    pub(crate) rtc_facade: Arc<dyn RtcFacade>,
    pub(crate) rtc_config: RtcConfig,
}

// ============================================================================
// Tests
// ============================================================================
