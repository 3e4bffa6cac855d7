//! Resource manager: channel and connection registries behind one handle.
//!
//! The [`ResourceManager`] owns both registries exclusively. Channels and
//! connections are never shared with another manager instance.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info};

use crate::channel::{ChannelHandle, ChannelRef, ChannelRegistry, ChannelState};
use crate::connection::{ConnectionRegistry, TrackedConnection, UsageGuard};
use crate::error::{Error, Result};
use crate::identifiers::{ManagerId, PeerId};
use crate::rtc::PeerConnection;

use super::builder::ManagerBuilder;
use super::config::{ManagerConfig, MergePolicy, ResolvedConfig};

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the manager.
pub(crate) struct ManagerInner {
    /// Identity stamped on bound channels.
    pub id: ManagerId,

    /// Validated configuration.
    pub config: ResolvedConfig,

    /// Bound channels by identifier.
    pub channels: ChannelRegistry,

    /// Tracked connections by peer.
    pub connections: ConnectionRegistry,
}

// ============================================================================
// ResourceManager
// ============================================================================

/// Pool of reference-counted peer connections negotiated over pluggable
/// signaling channels.
///
/// Clones share state.
///
/// # Example
///
/// ```ignore
/// use rtc_resource_manager::ResourceManager;
///
/// let manager = ResourceManager::builder()
///     .channel(ws_channel)
///     .rtc_facade(facade)
///     .build()?;
///
/// // Feed inbound frames from the channel transport
/// manager.response(&frame, "signaling")?;
///
/// let connection = manager.connect_to("peer-42").await?;
/// let chat = connection.add_data_connection("chat").await?;
/// chat.send(b"hello").await?;
///
/// manager.close("peer-42")?;
/// ```
#[derive(Clone)]
pub struct ResourceManager {
    /// Shared inner state.
    pub(crate) inner: Arc<ManagerInner>,
}

// ============================================================================
// ResourceManager - Display
// ============================================================================

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("id", &self.inner.id)
            .field("channel_count", &self.channel_count())
            .field("connection_count", &self.connection_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ResourceManager - Construction
// ============================================================================

impl ResourceManager {
    /// Creates a manager, merging `config` under [`MergePolicy::DefaultsWin`].
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the merged configuration lacks a valid
    ///   channel, facade or ICE configuration
    /// - [`Error::Ownership`] if the channel is bound to another manager
    pub fn new(config: ManagerConfig) -> Result<Self> {
        Self::with_policy(config, MergePolicy::default())
    }

    /// Creates a manager with an explicit merge policy.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_policy(config: ManagerConfig, policy: MergePolicy) -> Result<Self> {
        let config = config.merge(&ManagerConfig::defaults(), policy).validate()?;
        let id = ManagerId::next();

        let channels = ChannelRegistry::new(id);
        let connections =
            ConnectionRegistry::new(config.connection_ttl).with_channels(channels.directory());

        let inner = ManagerInner {
            id,
            channels,
            connections,
            config,
        };

        inner.channels.register(&inner.config.channel)?;

        info!(
            manager_id = %id,
            channel_id = %inner.config.channel.id(),
            ttl_ms = u64::try_from(inner.config.connection_ttl.as_millis()).unwrap_or(u64::MAX),
            ?policy,
            "Resource manager initialized"
        );

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }
}

// ============================================================================
// ResourceManager - Channels
// ============================================================================

impl ResourceManager {
    /// Binds a channel to this manager.
    ///
    /// A different handle already registered under the same id is closed
    /// first. Registering the handle that is already bound does nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the channel id is malformed
    /// - [`Error::Ownership`] if the handle is bound to another manager
    pub fn register(&self, channel: &ChannelHandle) -> Result<()> {
        self.inner.channels.register(channel)
    }

    /// Closes and removes a channel.
    ///
    /// Connections negotiated over it stay tracked but can no longer send
    /// signals.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelNotFound`] if no channel is registered under `id`.
    pub fn unregister(&self, id: &str) -> Result<()> {
        self.inner.channels.unregister(id)
    }

    /// Returns the number of bound channels.
    #[inline]
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.inner.channels.len()
    }

    /// Returns the identifiers of bound channels, sorted.
    #[must_use]
    pub fn channel_ids(&self) -> Vec<String> {
        let mut ids = self.inner.channels.ids();
        ids.sort();
        ids
    }

    /// Resolves the channel a connection should use, registering a fresh
    /// handle on the fly.
    fn resolve_for_connect(&self, channel: Option<ChannelRef>) -> Result<ChannelHandle> {
        let reference =
            channel.unwrap_or_else(|| ChannelRef::Id(self.inner.config.channel.id().to_string()));

        match self.inner.channels.resolve(&reference) {
            Ok(handle) => Ok(handle),
            Err(err) => match reference {
                ChannelRef::Handle(handle) if handle.state() == ChannelState::Unbound => {
                    debug!(channel_id = %handle.id(), "Registering unbound channel on connect");
                    self.inner.channels.register(&handle)?;
                    Ok(handle)
                }
                _ => Err(err),
            },
        }
    }
}

// ============================================================================
// ResourceManager - Connections
// ============================================================================

impl ResourceManager {
    /// Creates a builder for opening a connection.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let connection = manager
    ///     .connection()
    ///     .peer("peer-42")
    ///     .via("backup-relay")
    ///     .timeout(Duration::from_secs(5))
    ///     .open()
    ///     .await?;
    /// ```
    #[inline]
    #[must_use]
    pub fn connection(&self) -> ConnectBuilder<'_> {
        ConnectBuilder::new(self)
    }

    /// Acquires the connection to `peer` over the default channel and waits
    /// until it is open.
    ///
    /// Creates and starts negotiating the connection if it is not tracked.
    /// Each successful call must be matched by one [`close`](Self::close).
    /// Dropping the returned future before it resolves releases the usage.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelNotFound`] if the default channel was unregistered
    /// - [`Error::Negotiation`] if the handshake fails
    /// - [`Error::ConnectionClosed`] if the connection closes first
    pub async fn connect_to(&self, peer: impl Into<PeerId>) -> Result<TrackedConnection> {
        self.open(Some(peer.into()), None, None).await
    }

    /// Like [`connect_to`](Self::connect_to), over a specific channel.
    ///
    /// An unbound handle is registered first.
    ///
    /// # Errors
    ///
    /// As [`connect_to`](Self::connect_to), plus [`Error::Ownership`] if the
    /// channel is closed or bound elsewhere.
    pub async fn connect_to_via(
        &self,
        peer: impl Into<PeerId>,
        channel: impl Into<ChannelRef>,
    ) -> Result<TrackedConnection> {
        self.open(Some(peer.into()), Some(channel.into()), None).await
    }

    /// Like [`connect_to`](Self::connect_to), failing after `timeout`.
    ///
    /// # Errors
    ///
    /// As [`connect_to`](Self::connect_to), plus [`Error::Timeout`].
    pub async fn connect_to_with_timeout(
        &self,
        peer: impl Into<PeerId>,
        timeout: Duration,
    ) -> Result<TrackedConnection> {
        self.open(Some(peer.into()), None, Some(timeout)).await
    }

    /// Releases one usage of the connection to `peer_id`.
    ///
    /// When usage reaches zero the connection is evicted after the
    /// configured TTL unless it is acquired again first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionNotFound`] if no connection is tracked.
    pub fn close(&self, peer_id: &str) -> Result<()> {
        let remaining = self.inner.connections.release(peer_id)?;
        debug!(peer_id, remaining, "Connection released");
        Ok(())
    }

    /// Returns the tracked connection to `peer_id` without acquiring it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionNotFound`] if no connection is tracked.
    pub fn get_connection(&self, peer_id: &str) -> Result<TrackedConnection> {
        self.inner.connections.get(peer_id)
    }

    /// Returns the number of tracked connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    /// Returns the tracked peers, sorted.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<PeerId> {
        let mut ids = self.inner.connections.ids();
        ids.sort();
        ids
    }

    /// Returns this manager's identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ManagerId {
        self.inner.id
    }

    /// Returns the eviction TTL in effect.
    #[inline]
    #[must_use]
    pub fn connection_ttl(&self) -> Duration {
        self.inner.config.connection_ttl
    }

    /// Closes every tracked connection and every bound channel.
    ///
    /// Pending opens fail with [`Error::ConnectionClosed`].
    pub async fn shutdown(&self) {
        let connections = self.inner.connections.drain();

        info!(
            manager_id = %self.inner.id,
            count = connections.len(),
            "Shutting down all connections"
        );

        join_all(connections.iter().map(TrackedConnection::close_and_wait)).await;

        self.inner.channels.close_all();
    }
}

// ============================================================================
// ResourceManager - Internal API
// ============================================================================

impl ResourceManager {
    /// Opens (or joins) the connection to `peer`.
    async fn open(
        &self,
        peer: Option<PeerId>,
        channel: Option<ChannelRef>,
        timeout: Option<Duration>,
    ) -> Result<TrackedConnection> {
        let channel = self.resolve_for_connect(channel)?;
        let peer_id = peer.unwrap_or_else(PeerId::generate);

        let (connection, created) = self
            .inner
            .connections
            .acquire(&peer_id, &channel, || self.create_peer(&peer_id))?;
        let guard = UsageGuard::new(connection.clone());

        if created {
            info!(
                peer_id = %peer_id,
                channel_id = %channel.id(),
                "Opening new connection"
            );
            connection.start_offer()?;
        } else if connection.channel_id() != channel.id() {
            debug!(
                peer_id = %peer_id,
                tracked_channel = %connection.channel_id(),
                requested_channel = %channel.id(),
                "Reusing connection negotiated over another channel"
            );
        }

        match timeout {
            Some(limit) => tokio::time::timeout(limit, connection.wait_open())
                .await
                .map_err(|_| {
                    Error::timeout(
                        format!("open connection to {peer_id}"),
                        u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    )
                })??,
            None => connection.wait_open().await?,
        }

        Ok(guard.disarm())
    }

    /// Builds a fresh peer connection through the facade.
    pub(crate) fn create_peer(&self, peer_id: &PeerId) -> Result<Arc<dyn PeerConnection>> {
        self.inner
            .config
            .rtc_facade
            .create_peer_connection(&self.inner.config.rtc_config)
            .map_err(|e| {
                Error::negotiation(peer_id.clone(), format!("peer connection rejected: {e}"))
            })
    }
}

// ============================================================================
// ConnectBuilder
// ============================================================================

/// Builder for opening a connection.
///
/// Created by [`ResourceManager::connection`].
pub struct ConnectBuilder<'a> {
    /// Reference to the manager.
    manager: &'a ResourceManager,
    /// Remote peer; generated if unset.
    peer: Option<PeerId>,
    /// Channel; the default channel if unset.
    channel: Option<ChannelRef>,
    /// Open timeout.
    timeout: Option<Duration>,
}

impl<'a> ConnectBuilder<'a> {
    pub(crate) fn new(manager: &'a ResourceManager) -> Self {
        Self {
            manager,
            peer: None,
            channel: None,
            timeout: None,
        }
    }

    /// Sets the remote peer.
    #[must_use]
    pub fn peer(mut self, peer: impl Into<PeerId>) -> Self {
        self.peer = Some(peer.into());
        self
    }

    /// Negotiates over this channel instead of the default one.
    #[must_use]
    pub fn via(mut self, channel: impl Into<ChannelRef>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Fails with [`Error::Timeout`] if not open within `timeout`.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Acquires the connection and waits until it is open.
    ///
    /// # Errors
    ///
    /// See [`ResourceManager::connect_to`].
    pub async fn open(self) -> Result<TrackedConnection> {
        self.manager.open(self.peer, self.channel, self.timeout).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use tokio_test::{assert_pending, task};

    use crate::connection::{DEFAULT_DATA_CHANNEL, NegotiationState, OpenStatus};
    use crate::protocol::{ResponseKind, Signal};
    use crate::testing::{
        Harness, LoopbackFacade, MemoryChannel, answer_frame, harness, next_signal, offer_frame,
        settle,
    };

    /// Spawns `connect_to(peer)` and answers the offer it sends.
    async fn connect_answered(h: &Harness, peer: &str) -> TrackedConnection {
        let manager = h.manager.clone();
        let target = peer.to_string();
        let pending = tokio::spawn(async move { manager.connect_to(target).await });

        let offer = next_signal(&h.channel, ResponseKind::Offer).await;
        assert_eq!(offer.peer_id().as_str(), peer);

        h.manager.response(&answer_frame(peer), "c1").unwrap();
        pending.await.unwrap().unwrap()
    }

    #[test]
    fn test_manager_is_clone_and_debug() {
        fn assert_clone<T: Clone>() {}
        fn assert_debug<T: std::fmt::Debug>() {}
        assert_clone::<ResourceManager>();
        assert_debug::<ResourceManager>();
    }

    #[test]
    fn test_new_requires_channel() {
        let config = ManagerConfig::new().with_rtc_facade(Arc::new(LoopbackFacade::new()));
        let err = ResourceManager::new(config).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_new_requires_facade() {
        let config =
            ManagerConfig::new().with_channel(ChannelHandle::from_channel(MemoryChannel::new("c1")));
        assert!(ResourceManager::new(config).is_err());
    }

    #[test]
    fn test_new_registers_default_channel() {
        let h = harness();
        assert_eq!(h.channel.bind_calls(), 1);
        assert_eq!(h.manager.channel_ids(), vec!["c1".to_string()]);
        assert_eq!(h.handle.state(), ChannelState::Bound);
    }

    #[test]
    fn test_defaults_win_ttl() {
        let channel = ChannelHandle::from_channel(MemoryChannel::new("c1"));
        let config = ManagerConfig::new()
            .with_channel(channel)
            .with_rtc_facade(Arc::new(LoopbackFacade::new()))
            .with_connection_ttl_ms(250);

        let manager = ResourceManager::new(config.clone()).unwrap();
        assert_eq!(manager.connection_ttl(), Duration::from_secs(10));

        let channel = ChannelHandle::from_channel(MemoryChannel::new("c2"));
        let manager =
            ResourceManager::with_policy(config.with_channel(channel), MergePolicy::CallerOverrides)
                .unwrap();
        assert_eq!(manager.connection_ttl(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_connect_to_opens_after_answer() {
        let h = harness();

        let connection = connect_answered(&h, "p1").await;

        assert_eq!(connection.open_status(), OpenStatus::Open);
        assert_eq!(connection.usage_count(), 1);
        assert_eq!(connection.negotiation_state(), NegotiationState::Stable);
        assert_eq!(connection.channel_id(), "c1");
        assert!(connection.data_connection(DEFAULT_DATA_CHANNEL).await.is_some());
        assert_eq!(h.manager.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_to_existing_shares_connection() {
        let h = harness();
        let first = connect_answered(&h, "p1").await;

        let second = h.manager.connect_to("p1").await.unwrap();

        assert!(first.same(&second));
        assert_eq!(second.usage_count(), 2);
        assert_eq!(h.facade.peers_created(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_connect_to_creates_once() {
        let h = harness();
        let a = tokio::spawn({
            let m = h.manager.clone();
            async move { m.connect_to("p1").await }
        });
        let b = tokio::spawn({
            let m = h.manager.clone();
            async move { m.connect_to("p1").await }
        });

        next_signal(&h.channel, ResponseKind::Offer).await;
        h.manager.response(&answer_frame("p1"), "c1").unwrap();

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();
        assert!(a.same(&b));
        assert_eq!(a.usage_count(), 2);
        assert_eq!(h.facade.peers_created(), 1);
    }

    #[tokio::test]
    async fn test_connect_to_generates_peer_id() {
        let h = harness();
        let pending = tokio::spawn({
            let m = h.manager.clone();
            async move { m.connection().open().await }
        });

        let offer = next_signal(&h.channel, ResponseKind::Offer).await;
        let peer = offer.peer_id().clone();
        assert!(!peer.as_str().is_empty());

        h.manager.response(&answer_frame(peer.as_str()), "c1").unwrap();
        let connection = pending.await.unwrap().unwrap();
        assert_eq!(connection.id(), &peer);
    }

    #[tokio::test]
    async fn test_dropped_connect_releases_usage() {
        let h = harness();

        let mut pending = task::spawn(h.manager.connect_to("p1"));
        assert_pending!(pending.poll());
        assert_eq!(h.manager.get_connection("p1").unwrap().usage_count(), 1);

        drop(pending);

        let connection = h.manager.get_connection("p1").unwrap();
        assert_eq!(connection.usage_count(), 0);
        assert!(connection.eviction_pending());
    }

    #[tokio::test]
    async fn test_negotiation_failure_fails_every_waiter() {
        let h = harness();
        h.facade.behavior().reject_offer(true);

        let a = tokio::spawn({
            let m = h.manager.clone();
            async move { m.connect_to("p1").await }
        });
        let b = tokio::spawn({
            let m = h.manager.clone();
            async move { m.connect_to("p1").await }
        });

        assert!(a.await.unwrap().unwrap_err().is_negotiation_error());
        assert!(b.await.unwrap().unwrap_err().is_negotiation_error());
        assert_eq!(h.manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_facade_rejection_is_negotiation_error() {
        let h = harness();
        h.facade.behavior().reject_create(true);

        let err = h.manager.connect_to("p1").await.unwrap_err();

        assert!(err.is_negotiation_error());
        assert_eq!(h.manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_send_failure_fails_open() {
        let h = harness();
        h.channel.set_fail_sends(true);

        let err = h.manager.connect_to("p1").await.unwrap_err();

        assert!(err.is_negotiation_error());
        assert!(err.to_string().contains("send offer"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_releases_usage() {
        let h = harness();

        let err = h
            .manager
            .connect_to_with_timeout("p1", Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(h.manager.get_connection("p1").unwrap().usage_count(), 0);
    }

    #[tokio::test]
    async fn test_close_unknown_peer() {
        let h = harness();
        assert!(h.manager.close("nobody").unwrap_err().is_lookup_error());
        assert!(h.manager.get_connection("nobody").unwrap_err().is_lookup_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_never_goes_negative() {
        let h = harness();
        let connection = connect_answered(&h, "p1").await;

        h.manager.close("p1").unwrap();
        h.manager.close("p1").unwrap();

        assert_eq!(connection.usage_count(), 0);
        assert!(connection.eviction_pending());
    }

    #[tokio::test]
    async fn test_connect_via_unbound_handle_registers_it() {
        let h = harness();
        let extra = Arc::new(MemoryChannel::new("c2"));
        let handle = ChannelHandle::new(extra.clone());

        let pending = tokio::spawn({
            let m = h.manager.clone();
            let handle = handle.clone();
            async move { m.connect_to_via("p2", handle).await }
        });

        next_signal(&extra, ResponseKind::Offer).await;
        assert_eq!(handle.state(), ChannelState::Bound);
        assert_eq!(extra.bind_calls(), 1);

        h.manager.response(&answer_frame("p2"), "c2").unwrap();
        let connection = pending.await.unwrap().unwrap();
        assert_eq!(connection.channel_id(), "c2");
    }

    #[tokio::test]
    async fn test_connect_via_closed_handle_rejected() {
        let h = harness();
        let handle = ChannelHandle::from_channel(MemoryChannel::new("c2"));
        h.manager.register(&handle).unwrap();
        h.manager.unregister("c2").unwrap();

        let err = h.manager.connect_to_via("p2", handle).await.unwrap_err();

        assert!(matches!(err, Error::Ownership { .. }));
        assert_eq!(h.manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_via_foreign_handle_rejected() {
        let h = harness();
        let other = harness();

        let err = h
            .manager
            .connect_to_via("p2", other.handle.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Ownership { .. }));
    }

    #[tokio::test]
    async fn test_default_channel_unregistered() {
        let h = harness();
        h.manager.unregister("c1").unwrap();

        let err = h.manager.connect_to("p1").await.unwrap_err();
        assert!(err.is_lookup_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_lifecycle() {
        let h = harness();

        let connection = connect_answered(&h, "p1").await;
        assert_eq!(connection.open_status(), OpenStatus::Open);

        // Renegotiation from the remote side.
        h.manager.response(&offer_frame("p1"), "c1").unwrap();
        let answer = next_signal(&h.channel, ResponseKind::Answer).await;
        assert!(matches!(answer, Signal::Answer { .. }));
        assert_eq!(connection.negotiation_state(), NegotiationState::Stable);

        h.manager.close("p1").unwrap();
        assert_eq!(connection.usage_count(), 0);

        tokio::time::advance(h.manager.connection_ttl() + Duration::from_millis(1)).await;
        settle().await;

        assert_eq!(h.manager.connection_count(), 0);
        assert_eq!(connection.open_status(), OpenStatus::Closed);
        assert!(h.facade.last_peer().unwrap().is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reacquire_before_ttl_prevents_eviction() {
        let h = harness();
        connect_answered(&h, "p1").await;

        h.manager.close("p1").unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        let again = h.manager.connect_to("p1").await.unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;

        assert_eq!(h.manager.connection_count(), 1);
        assert_eq!(again.usage_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let h = harness();
        let connection = connect_answered(&h, "p1").await;

        h.manager.shutdown().await;

        assert_eq!(h.manager.connection_count(), 0);
        assert_eq!(h.manager.channel_count(), 0);
        assert_eq!(connection.open_status(), OpenStatus::Closed);
        assert_eq!(h.handle.state(), ChannelState::Closed);
        assert_eq!(h.channel.close_calls(), 1);
        assert!(h.facade.last_peer().unwrap().is_closed());
    }

    #[tokio::test]
    async fn test_shutdown_fails_pending_open() {
        let h = harness();
        let pending = tokio::spawn({
            let m = h.manager.clone();
            async move { m.connect_to("p1").await }
        });
        next_signal(&h.channel, ResponseKind::Offer).await;

        h.manager.shutdown().await;

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed { .. }));
    }
}
