//! Reference-counted, TTL-evicted wrapper around one peer connection.
//!
//! # Lifecycle
//!
//! ```text
//!             acquire                 release → 0
//!   create ──────────► usage > 0 ─────────────────► idle (timer armed)
//!                          ▲                            │        │
//!                          └────────── acquire ─────────┘        │ TTL elapsed
//!                                  (timer cancelled)             ▼
//!                                                   evicted: removed + closed
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::{ChannelDirectory, ChannelHandle, ChannelState};
use crate::error::{Error, Result};
use crate::identifiers::PeerId;
use crate::protocol::{IceCandidate, SessionDescription, Signal};
use crate::rtc::{DataChannel, PeerConnection};

use super::negotiation::{self, NegotiationCommand};
use super::registry::ConnectionMap;

// ============================================================================
// Constants
// ============================================================================

/// Name of the data sub-channel every connection carries.
pub const DEFAULT_DATA_CHANNEL: &str = "default";

// ============================================================================
// Public State Types
// ============================================================================

/// Whether the underlying connection is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenStatus {
    /// Closed, failed, or evicted.
    Closed,
    /// Negotiating.
    Opening,
    /// Connected.
    Open,
}

/// Offer/answer sub-state gating inbound answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    /// No exchange in flight.
    Stable,
    /// A local offer was sent; only an answer is acceptable.
    AwaitingAnswer,
}

// ============================================================================
// Internal Types
// ============================================================================

/// Progress published to callers waiting for the connection to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Phase {
    Opening,
    Open,
    Failed(String),
    Closed,
}

/// A pending eviction.
struct EvictionTimer {
    task: JoinHandle<()>,
}

impl EvictionTimer {
    fn cancel(self) {
        self.task.abort();
    }
}

/// Usage accounting, guarded by one lock.
struct UsageState {
    usage_count: usize,
    negotiation: NegotiationState,
    eviction: Option<EvictionTimer>,
    /// Bumped on every arm/cancel so a stale timer never evicts.
    generation: u64,
}

/// Internal shared state for a tracked connection.
pub(crate) struct TrackedInner {
    /// Remote peer.
    id: PeerId,
    /// Transport handle.
    peer: Arc<dyn PeerConnection>,
    /// Identifier of the channel local offers and candidates go out on.
    channel_id: String,
    /// Last handle seen bound under `channel_id`.
    channel: Mutex<ChannelHandle>,
    /// Source of replacement handles for `channel_id`.
    channels: ChannelDirectory,
    /// Idle time before eviction.
    ttl: Duration,
    /// Usage, negotiation sub-state, eviction timer.
    state: Mutex<UsageState>,
    /// Open progress.
    phase: watch::Sender<Phase>,
    /// Named data sub-channels.
    data_channels: AsyncMutex<FxHashMap<String, Arc<dyn DataChannel>>>,
    /// Serial negotiation queue.
    commands: mpsc::UnboundedSender<NegotiationCommand>,
    /// Negotiation loop task.
    loop_task: Mutex<Option<JoinHandle<()>>>,
    /// Owning registry (non-owning back-reference).
    registry: Weak<RwLock<ConnectionMap>>,
    /// Set once the transport has been closed, by us or by the remote side.
    transport_closed: AtomicBool,
}

impl Drop for TrackedInner {
    fn drop(&mut self) {
        if self.transport_closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let peer = Arc::clone(&self.peer);
            let peer_id = self.id.clone();
            runtime.spawn(async move {
                if let Err(e) = peer.close().await {
                    debug!(peer_id = %peer_id, error = %e, "Failed to close dropped connection");
                }
            });
        } else {
            debug!(peer_id = %self.id, "Connection dropped outside runtime, transport left to its own Drop");
        }
    }
}

// ============================================================================
// TrackedConnection
// ============================================================================

/// A handle to a tracked peer connection.
///
/// Obtained from [`ResourceManager::connect_to`](crate::ResourceManager::connect_to)
/// or [`ResourceManager::get_connection`](crate::ResourceManager::get_connection).
/// Clones share state.
#[derive(Clone)]
pub struct TrackedConnection {
    pub(crate) inner: Arc<TrackedInner>,
}

impl fmt::Debug for TrackedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedConnection")
            .field("id", &self.inner.id)
            .field("channel_id", &self.inner.channel_id)
            .field("usage_count", &self.usage_count())
            .field("open_status", &self.open_status())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TrackedConnection - Construction
// ============================================================================

impl TrackedConnection {
    /// Wraps a fresh peer connection and starts its negotiation loop.
    ///
    /// Must be called inside a Tokio runtime.
    pub(crate) fn spawn(
        id: PeerId,
        peer: Arc<dyn PeerConnection>,
        channel: ChannelHandle,
        channels: ChannelDirectory,
        ttl: Duration,
        registry: Weak<RwLock<ConnectionMap>>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (phase, _) = watch::channel(Phase::Opening);

        let events = command_tx.clone();
        peer.set_event_handler(Box::new(move |event| {
            let _ = events.send(NegotiationCommand::Transport(event));
        }));

        let inner = Arc::new(TrackedInner {
            id,
            peer,
            channel_id: channel.id().to_string(),
            channel: Mutex::new(channel),
            channels,
            ttl,
            state: Mutex::new(UsageState {
                usage_count: 0,
                negotiation: NegotiationState::Stable,
                eviction: None,
                generation: 0,
            }),
            phase,
            data_channels: AsyncMutex::new(FxHashMap::default()),
            commands: command_tx,
            loop_task: Mutex::new(None),
            registry,
            transport_closed: AtomicBool::new(false),
        });

        let task = tokio::spawn(negotiation::run(Arc::downgrade(&inner), command_rx));
        *inner.loop_task.lock() = Some(task);

        debug!(
            peer_id = %inner.id,
            channel_id = %inner.channel_id,
            "Tracked connection created"
        );

        Self { inner }
    }

    #[inline]
    pub(crate) fn from_inner(inner: Arc<TrackedInner>) -> Self {
        Self { inner }
    }

    /// Returns `true` if both handles refer to the same tracked connection.
    #[inline]
    pub(crate) fn same(&self, other: &TrackedConnection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

// ============================================================================
// TrackedConnection - Accessors
// ============================================================================

impl TrackedConnection {
    /// Returns the remote peer identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &PeerId {
        &self.inner.id
    }

    /// Returns the identifier of the channel this connection signals over.
    #[inline]
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.inner.channel_id
    }

    /// Returns how many callers currently hold this connection.
    #[inline]
    #[must_use]
    pub fn usage_count(&self) -> usize {
        self.inner.state.lock().usage_count
    }

    /// Returns whether the connection is usable.
    #[must_use]
    pub fn open_status(&self) -> OpenStatus {
        match *self.inner.phase.borrow() {
            Phase::Opening => OpenStatus::Opening,
            Phase::Open => OpenStatus::Open,
            Phase::Failed(_) | Phase::Closed => OpenStatus::Closed,
        }
    }

    /// Returns the offer/answer sub-state.
    #[inline]
    #[must_use]
    pub fn negotiation_state(&self) -> NegotiationState {
        self.inner.state.lock().negotiation
    }

    /// Returns `true` if an eviction timer is pending.
    #[inline]
    #[must_use]
    pub fn eviction_pending(&self) -> bool {
        self.inner.state.lock().eviction.is_some()
    }

    /// Returns the underlying transport handle.
    #[inline]
    #[must_use]
    pub fn peer_connection(&self) -> &Arc<dyn PeerConnection> {
        &self.inner.peer
    }

    #[inline]
    pub(crate) fn phase(&self) -> Phase {
        self.inner.phase.borrow().clone()
    }

    fn is_terminated(&self) -> bool {
        matches!(*self.inner.phase.borrow(), Phase::Closed | Phase::Failed(_))
    }
}

// ============================================================================
// TrackedConnection - Data Sub-channels
// ============================================================================

impl TrackedConnection {
    /// Returns the named data sub-channel, creating it if needed.
    ///
    /// Calling twice with the same name returns the same handle.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is closed or failed
    /// - [`Error::Negotiation`] if the transport rejects the sub-channel
    pub async fn add_data_connection(&self, name: &str) -> Result<Arc<dyn DataChannel>> {
        if self.is_terminated() {
            return Err(Error::connection_closed(self.inner.id.clone()));
        }

        let mut channels = self.inner.data_channels.lock().await;
        if let Some(existing) = channels.get(name) {
            return Ok(Arc::clone(existing));
        }

        let created = self
            .inner
            .peer
            .create_data_channel(name)
            .await
            .map_err(|e| {
                Error::negotiation(
                    self.inner.id.clone(),
                    format!("data channel '{name}' rejected: {e}"),
                )
            })?;

        channels.insert(name.to_string(), Arc::clone(&created));
        debug!(peer_id = %self.inner.id, name, "Data sub-channel created");

        Ok(created)
    }

    /// Returns the named data sub-channel without creating it.
    pub async fn data_connection(&self, name: &str) -> Option<Arc<dyn DataChannel>> {
        self.inner.data_channels.lock().await.get(name).cloned()
    }

    /// Returns the names of all data sub-channels.
    pub async fn data_connection_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.inner.data_channels.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Records a sub-channel opened by the remote side, unless one with the
    /// same label already exists.
    pub(crate) async fn adopt_data_channel(&self, channel: Arc<dyn DataChannel>) {
        let label = channel.label().to_string();
        let mut channels = self.inner.data_channels.lock().await;
        if channels.contains_key(&label) {
            debug!(peer_id = %self.inner.id, label, "Remote data sub-channel already known");
            return;
        }
        channels.insert(label.clone(), channel);
        debug!(peer_id = %self.inner.id, label, "Remote data sub-channel adopted");
    }

    pub(crate) async fn clear_data_channels(&self) {
        self.inner.data_channels.lock().await.clear();
    }
}

// ============================================================================
// TrackedConnection - Usage & Eviction
// ============================================================================

impl TrackedConnection {
    /// Increments usage and cancels any pending eviction.
    pub(crate) fn acquire(&self) -> usize {
        let mut state = self.inner.state.lock();

        if let Some(timer) = state.eviction.take() {
            timer.cancel();
            state.generation += 1;
            debug!(peer_id = %self.inner.id, "Eviction cancelled by reacquisition");
        }

        state.usage_count += 1;
        state.usage_count
    }

    /// Decrements usage, arming the eviction timer when it reaches zero.
    ///
    /// Usage never goes below zero.
    pub(crate) fn release(&self) -> usize {
        let mut state = self.inner.state.lock();

        if state.usage_count == 0 {
            warn!(peer_id = %self.inner.id, "Release of a connection with no users ignored");
            return 0;
        }

        state.usage_count -= 1;
        if state.usage_count == 0 {
            self.arm_eviction(&mut state);
        }
        state.usage_count
    }

    /// Arms eviction for a connection nobody has acquired yet.
    pub(crate) fn arm_idle_eviction(&self) {
        let mut state = self.inner.state.lock();
        if state.usage_count == 0 {
            self.arm_eviction(&mut state);
        }
    }

    /// Replaces any pending timer with a fresh one.
    fn arm_eviction(&self, state: &mut UsageState) {
        if let Some(previous) = state.eviction.take() {
            previous.cancel();
        }
        state.generation += 1;
        let generation = state.generation;

        if self.is_terminated() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(peer_id = %self.inner.id, "No Tokio runtime, eviction timer not armed");
            return;
        };

        let connection = Arc::downgrade(&self.inner);
        let ttl = self.inner.ttl;
        let deadline = tokio::time::Instant::now() + ttl;
        let task = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = connection.upgrade() {
                TrackedConnection::from_inner(inner).evict(generation);
            }
        });

        state.eviction = Some(EvictionTimer { task });
        debug!(
            peer_id = %self.inner.id,
            ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            "Eviction timer armed"
        );
    }

    /// Timer callback: remove from the registry and close, if still idle.
    fn evict(&self, generation: u64) {
        let registry = self.inner.registry.upgrade();
        let mut map = registry.as_ref().map(|r| r.write());

        {
            let mut state = self.inner.state.lock();
            if state.generation != generation || state.usage_count != 0 {
                debug!(peer_id = %self.inner.id, "Stale eviction timer ignored");
                return;
            }
            state.eviction = None;
        }

        if let Some(map) = map.as_mut()
            && map.get(&self.inner.id).is_some_and(|c| c.same(self))
        {
            map.remove(&self.inner.id);
        }
        drop(map);

        info!(peer_id = %self.inner.id, "Idle connection evicted");
        let _ = self.enqueue(NegotiationCommand::Close);
    }

    /// Drops any pending eviction; the connection is going away by other means.
    pub(crate) fn cancel_eviction(&self) {
        let pending = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.eviction.take()
        };
        if let Some(timer) = pending {
            timer.cancel();
        }
    }

    /// Removes this connection from its registry, if it is still the entry.
    pub(crate) fn detach(&self) {
        let Some(registry) = self.inner.registry.upgrade() else {
            return;
        };

        let mut map = registry.write();
        if map.get(&self.inner.id).is_some_and(|c| c.same(self)) {
            map.remove(&self.inner.id);
            debug!(peer_id = %self.inner.id, "Connection detached from registry");
        }
    }
}

// ============================================================================
// TrackedConnection - Negotiation
// ============================================================================

impl TrackedConnection {
    /// Queues a negotiation step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the negotiation loop has ended.
    pub(crate) fn enqueue(&self, command: NegotiationCommand) -> Result<()> {
        self.inner
            .commands
            .send(command)
            .map_err(|_| Error::connection_closed(self.inner.id.clone()))
    }

    /// Starts negotiating as the offerer.
    pub(crate) fn start_offer(&self) -> Result<()> {
        self.enqueue(NegotiationCommand::CreateOffer)
    }

    /// Queues a remote offer; the answer goes out on `reply_via`.
    pub(crate) fn accept_offer(
        &self,
        description: SessionDescription,
        reply_via: ChannelHandle,
    ) -> Result<()> {
        self.enqueue(NegotiationCommand::ApplyOffer {
            description,
            reply_via,
        })
    }

    /// Accepts a remote answer if one is awaited.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if no local offer is awaiting an answer
    /// - [`Error::ConnectionClosed`] if the negotiation loop has ended
    pub(crate) fn accept_answer(&self, description: SessionDescription) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if state.negotiation != NegotiationState::AwaitingAnswer {
                return Err(Error::protocol(format!(
                    "no connection is awaiting an answer from {}",
                    self.inner.id
                )));
            }
            state.negotiation = NegotiationState::Stable;
        }

        self.enqueue(NegotiationCommand::ApplyAnswer(description))
    }

    /// Queues a remote candidate.
    pub(crate) fn accept_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.enqueue(NegotiationCommand::AddCandidate(candidate))
    }

    pub(crate) fn set_negotiation(&self, negotiation: NegotiationState) {
        self.inner.state.lock().negotiation = negotiation;
    }

    /// Sends a signal on the channel currently bound under this
    /// connection's channel id.
    pub(crate) fn signal(&self, signal: Signal) -> Result<()> {
        self.current_channel().send(signal)
    }

    /// Returns the stored handle while it is bound, otherwise the handle
    /// that replaced it.
    fn current_channel(&self) -> ChannelHandle {
        let stored = self.inner.channel.lock().clone();
        if stored.state() == ChannelState::Bound {
            return stored;
        }

        match self.inner.channels.current(&self.inner.channel_id) {
            Some(fresh) if fresh.state() == ChannelState::Bound => {
                debug!(
                    peer_id = %self.inner.id,
                    channel_id = %self.inner.channel_id,
                    "Following replaced channel"
                );
                *self.inner.channel.lock() = fresh.clone();
                fresh
            }
            _ => stored,
        }
    }

    /// Closes the transport unless it is already closed.
    pub(crate) async fn close_transport(&self) {
        if self.inner.transport_closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.inner.peer.close().await {
            warn!(peer_id = %self.inner.id, error = %e, "Transport close failed");
        }
    }

    /// Records that the remote side closed the transport.
    pub(crate) fn mark_transport_closed(&self) {
        self.inner.transport_closed.store(true, Ordering::SeqCst);
    }

    /// Waits until the connection is open.
    ///
    /// # Errors
    ///
    /// - [`Error::Negotiation`] if negotiation fails
    /// - [`Error::ConnectionClosed`] if the connection closes first
    pub(crate) async fn wait_open(&self) -> Result<()> {
        let mut phase = self.inner.phase.subscribe();

        loop {
            let current = phase.borrow_and_update().clone();
            match current {
                Phase::Open => return Ok(()),
                Phase::Failed(reason) => {
                    return Err(Error::negotiation(self.inner.id.clone(), reason));
                }
                Phase::Closed => return Err(Error::connection_closed(self.inner.id.clone())),
                Phase::Opening => {}
            }

            if phase.changed().await.is_err() {
                return Err(Error::connection_closed(self.inner.id.clone()));
            }
        }
    }

    /// Opening → Open.
    pub(crate) fn mark_open(&self) {
        let opened = self.inner.phase.send_if_modified(|phase| {
            if *phase == Phase::Opening {
                *phase = Phase::Open;
                true
            } else {
                false
            }
        });

        if opened {
            info!(peer_id = %self.inner.id, "Connection open");
        }
    }

    /// Opening/Open → Closed. A recorded failure is kept.
    pub(crate) fn mark_closed(&self) {
        self.inner.phase.send_if_modified(|phase| {
            if matches!(phase, Phase::Opening | Phase::Open) {
                *phase = Phase::Closed;
                true
            } else {
                false
            }
        });
    }

    /// Records a failure, detaches from the registry, and queues closure.
    pub(crate) fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let failed = self.inner.phase.send_if_modified(|phase| {
            if matches!(phase, Phase::Opening | Phase::Open) {
                *phase = Phase::Failed(reason.clone());
                true
            } else {
                false
            }
        });

        if failed {
            warn!(peer_id = %self.inner.id, error = %reason, "Connection failed");
            self.cancel_eviction();
            self.detach();
            let _ = self.enqueue(NegotiationCommand::Close);
        }
    }

    /// Queues closure and waits for the negotiation loop to finish.
    pub(crate) async fn close_and_wait(&self) {
        self.cancel_eviction();
        let _ = self.enqueue(NegotiationCommand::Close);

        let task = self.inner.loop_task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            debug!(peer_id = %self.inner.id, error = %e, "Negotiation loop ended abnormally");
        }
    }
}

// ============================================================================
// UsageGuard
// ============================================================================

/// Releases one usage on drop unless disarmed.
///
/// Held by `connect_to` while it waits for the connection to open, so a
/// cancelled or failed open never leaves usage incremented.
pub(crate) struct UsageGuard {
    connection: TrackedConnection,
    armed: bool,
}

impl UsageGuard {
    pub(crate) fn new(connection: TrackedConnection) -> Self {
        Self {
            connection,
            armed: true,
        }
    }

    /// Keeps the usage and returns the connection.
    pub(crate) fn disarm(mut self) -> TrackedConnection {
        self.armed = false;
        self.connection.clone()
    }
}

impl Drop for UsageGuard {
    fn drop(&mut self) {
        if self.armed {
            let remaining = self.connection.release();
            debug!(
                peer_id = %self.connection.id(),
                remaining,
                "Pending open abandoned, usage released"
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
