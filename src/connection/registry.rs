//! Pool of tracked connections keyed by peer identifier.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │           ConnectionRegistry             │
//! │  ┌────────────────────────────────────┐  │
//! │  │ peer-a → TrackedConnection (use 2) │  │
//! │  │ peer-b → TrackedConnection (use 0) │──┼── eviction timer
//! │  └────────────────────────────────────┘  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Eviction timers and failed negotiations remove their own entries
//! through a weak back-reference to the map.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::channel::{ChannelDirectory, ChannelHandle};
use crate::error::{Error, Result};
use crate::identifiers::PeerId;
use crate::rtc::PeerConnection;

use super::tracked::TrackedConnection;

// ============================================================================
// Types
// ============================================================================

/// Tracked connections by peer.
pub(crate) type ConnectionMap = FxHashMap<PeerId, TrackedConnection>;

// ============================================================================
// ConnectionRegistry
// ============================================================================

/// Tracked connections of one manager, at most one per peer.
pub(crate) struct ConnectionRegistry {
    /// Active connections by peer.
    connections: Arc<RwLock<ConnectionMap>>,

    /// Idle time before eviction, applied to every new entry.
    ttl: Duration,

    /// Where connections look up a replacement for their channel.
    channels: ChannelDirectory,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            connections: Arc::new(RwLock::new(FxHashMap::default())),
            ttl,
            channels: ChannelDirectory::default(),
        }
    }

    /// Lets connections follow channel replacements in `channels`.
    #[must_use]
    pub(crate) fn with_channels(mut self, channels: ChannelDirectory) -> Self {
        self.channels = channels;
        self
    }

    /// Returns the number of tracked connections.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns the tracked peers.
    pub(crate) fn ids(&self) -> Vec<PeerId> {
        self.connections.read().keys().cloned().collect()
    }

    /// Returns the connection for `peer_id`, if tracked.
    #[inline]
    pub(crate) fn find(&self, peer_id: &str) -> Option<TrackedConnection> {
        self.connections.read().get(peer_id).cloned()
    }

    /// Returns the connection for `peer_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionNotFound`] if no connection is tracked.
    pub(crate) fn get(&self, peer_id: &str) -> Result<TrackedConnection> {
        self.find(peer_id)
            .ok_or_else(|| Error::connection_not_found(PeerId::from(peer_id)))
    }

    /// Returns the connection for `peer_id`, creating it if absent, and
    /// increments its usage.
    ///
    /// Lookup, insert and increment happen under one write lock, so two
    /// concurrent callers for the same peer share one connection. The
    /// second tuple field is `true` if the connection was created here.
    ///
    /// # Errors
    ///
    /// Whatever `create_peer` returns; the registry is left unchanged.
    pub(crate) fn acquire<F>(
        &self,
        peer_id: &PeerId,
        channel: &ChannelHandle,
        create_peer: F,
    ) -> Result<(TrackedConnection, bool)>
    where
        F: FnOnce() -> Result<Arc<dyn PeerConnection>>,
    {
        let mut connections = self.connections.write();
        let (connection, created) =
            self.lookup_or_create(&mut connections, peer_id, channel, create_peer)?;
        connection.acquire();
        Ok((connection, created))
    }

    /// Like [`acquire`](Self::acquire) without touching usage.
    pub(crate) fn get_or_insert<F>(
        &self,
        peer_id: &PeerId,
        channel: &ChannelHandle,
        create_peer: F,
    ) -> Result<(TrackedConnection, bool)>
    where
        F: FnOnce() -> Result<Arc<dyn PeerConnection>>,
    {
        let mut connections = self.connections.write();
        self.lookup_or_create(&mut connections, peer_id, channel, create_peer)
    }

    fn lookup_or_create<F>(
        &self,
        connections: &mut ConnectionMap,
        peer_id: &PeerId,
        channel: &ChannelHandle,
        create_peer: F,
    ) -> Result<(TrackedConnection, bool)>
    where
        F: FnOnce() -> Result<Arc<dyn PeerConnection>>,
    {
        if let Some(existing) = connections.get(peer_id) {
            return Ok((existing.clone(), false));
        }

        let peer = create_peer()?;
        let connection = TrackedConnection::spawn(
            peer_id.clone(),
            peer,
            channel.clone(),
            self.channels.clone(),
            self.ttl,
            Arc::downgrade(&self.connections),
        );
        connections.insert(peer_id.clone(), connection.clone());

        Ok((connection, true))
    }

    /// Decrements usage of the connection for `peer_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionNotFound`] if no connection is tracked.
    pub(crate) fn release(&self, peer_id: &str) -> Result<usize> {
        let connection = self.get(peer_id)?;
        Ok(connection.release())
    }

    /// Removes every entry and returns them.
    pub(crate) fn drain(&self) -> Vec<TrackedConnection> {
        let drained: Vec<_> = self.connections.write().drain().map(|(_, c)| c).collect();
        debug!(count = drained.len(), "Connection registry drained");
        drained
    }
}

// ============================================================================
// Tests
// ============================================================================
