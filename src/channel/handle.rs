//! Signaling channel contract and lifecycle-tracked handle.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::ManagerId;
use crate::protocol::{Response, Signal};

// ============================================================================
// SignalingChannel
// ============================================================================

/// A caller-supplied signaling transport.
///
/// The manager never interprets channel bytes itself: it hands raw frames to
/// [`on_message`](Self::on_message) and receives a classified [`Response`],
/// and it hands outbound [`Signal`]s to [`send`](Self::send).
///
/// # Example
///
/// ```ignore
/// struct WsChannel { id: String, tx: mpsc::UnboundedSender<Vec<u8>> }
///
/// impl SignalingChannel for WsChannel {
///     fn id(&self) -> &str { &self.id }
///
///     fn send(&self, signal: Signal) -> Result<()> {
///         let frame = encode_signal(&signal)?;
///         self.tx.send(frame).map_err(|_| Error::signaling("socket closed"))
///     }
///
///     fn on_message(&self, raw: &[u8]) -> Result<Response> {
///         decode_response(raw)
///     }
/// }
/// ```
pub trait SignalingChannel: Send + Sync + 'static {
    /// Unique identifier. Must not change once the channel is registered.
    fn id(&self) -> &str;

    /// Delivers an outbound signal to the remote side.
    ///
    /// # Errors
    ///
    /// Implementations should return [`Error::Signaling`] when the transport
    /// cannot deliver.
    fn send(&self, signal: Signal) -> Result<()>;

    /// Decodes an inbound frame into a classified response.
    ///
    /// # Errors
    ///
    /// Implementations should return [`Error::Protocol`] for frames they
    /// cannot classify.
    fn on_message(&self, raw: &[u8]) -> Result<Response>;

    /// Called after the channel is bound to a manager.
    fn on_bind(&self) {}

    /// Called after the channel is closed.
    fn on_close(&self) {}
}

// ============================================================================
// ChannelState
// ============================================================================

/// Lifecycle state of a channel handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Never registered.
    Unbound,
    /// Registered with a manager.
    Bound,
    /// Replaced, unregistered, or shut down.
    Closed,
}

// ============================================================================
// Types
// ============================================================================

/// Mutable lifecycle data, guarded together so state and owner never disagree.
#[derive(Debug)]
struct Lifecycle {
    state: ChannelState,
    owner: Option<ManagerId>,
}

/// Internal shared state for a channel handle.
struct ChannelInner {
    /// Identifier captured at wrap time.
    id: String,
    /// The caller's channel.
    channel: Arc<dyn SignalingChannel>,
    /// State and owning manager.
    lifecycle: Mutex<Lifecycle>,
}

// ============================================================================
// ChannelHandle
// ============================================================================

/// A cloneable, lifecycle-tracked handle to a [`SignalingChannel`].
///
/// Clones share state; two handles are the same channel only if one was
/// cloned from the other (see [`same_channel`](Self::same_channel)).
#[derive(Clone)]
pub struct ChannelHandle {
    inner: Arc<ChannelInner>,
}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.inner.lifecycle.lock();
        f.debug_struct("ChannelHandle")
            .field("id", &self.inner.id)
            .field("state", &lifecycle.state)
            .field("owner", &lifecycle.owner)
            .finish_non_exhaustive()
    }
}

impl ChannelHandle {
    /// Wraps a shared channel. The handle starts [`ChannelState::Unbound`].
    #[must_use]
    pub fn new(channel: Arc<dyn SignalingChannel>) -> Self {
        let id = channel.id().to_string();
        Self {
            inner: Arc::new(ChannelInner {
                id,
                channel,
                lifecycle: Mutex::new(Lifecycle {
                    state: ChannelState::Unbound,
                    owner: None,
                }),
            }),
        }
    }

    /// Wraps an owned channel.
    #[inline]
    #[must_use]
    pub fn from_channel(channel: impl SignalingChannel) -> Self {
        Self::new(Arc::new(channel))
    }

    /// Returns the channel identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.inner.lifecycle.lock().state
    }

    /// Returns `true` if both handles wrap the same channel object.
    #[inline]
    #[must_use]
    pub fn same_channel(&self, other: &ChannelHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns the owning manager, if bound.
    #[inline]
    pub(crate) fn owner(&self) -> Option<ManagerId> {
        self.inner.lifecycle.lock().owner
    }

    /// Marks the channel bound to `owner` without running the hook.
    pub(crate) fn mark_bound(&self, owner: ManagerId) {
        let mut lifecycle = self.inner.lifecycle.lock();
        lifecycle.state = ChannelState::Bound;
        lifecycle.owner = Some(owner);
    }

    /// Runs the `on_bind` hook.
    pub(crate) fn notify_bound(&self) {
        debug!(channel_id = %self.inner.id, "Channel bound");
        self.inner.channel.on_bind();
    }

    /// Closes the channel: state Closed, owner cleared, `on_close` hook.
    ///
    /// Closing an already closed channel does nothing.
    pub(crate) fn close(&self) {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state == ChannelState::Closed {
                return;
            }
            lifecycle.state = ChannelState::Closed;
            lifecycle.owner = None;
        }

        debug!(channel_id = %self.inner.id, "Channel closed");
        self.inner.channel.on_close();
    }

    /// Sends a signal through a bound channel.
    ///
    /// # Errors
    ///
    /// - [`Error::Signaling`] if the channel is not bound
    /// - Whatever the channel's `send` returns
    pub(crate) fn send(&self, signal: Signal) -> Result<()> {
        if self.state() != ChannelState::Bound {
            return Err(Error::signaling(format!(
                "channel {} is not bound",
                self.inner.id
            )));
        }

        trace!(
            channel_id = %self.inner.id,
            peer_id = %signal.peer_id(),
            kind = %signal.kind(),
            "Sending signal"
        );
        self.inner.channel.send(signal)
    }

    /// Classifies a raw frame through the channel's receive handler.
    #[inline]
    pub(crate) fn on_message(&self, raw: &[u8]) -> Result<Response> {
        self.inner.channel.on_message(raw)
    }
}

// ============================================================================
// Tests
// ============================================================================
