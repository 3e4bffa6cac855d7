//! Peer connection facade.
//!
//! The manager never speaks ICE, DTLS or SCTP itself. It drives an opaque
//! peer connection through these traits, and the embedding application
//! supplies an implementation (a `webrtc` crate adapter, a browser bridge,
//! a test double).
//!
//! # Traits
//!
//! | Trait | Role |
//! |-------|------|
//! | [`RtcFacade`] | Factory for peer connections |
//! | [`PeerConnection`] | Offer/answer, candidates, data channels, close |
//! | [`DataChannel`] | Named data sub-channel on a peer connection |
//!
//! Implementations report errors as any crate [`Error`](crate::Error); the
//! manager rewraps them as [`Error::Negotiation`](crate::Error::Negotiation)
//! for the peer concerned.

// ============================================================================
// Submodules
// ============================================================================

/// ICE server configuration.
pub mod config;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{IceCandidate, SessionDescription};

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{DEFAULT_STUN_URLS, IceServer, IceTransportPolicy, RtcConfig};

// ============================================================================
// PeerState
// ============================================================================

/// Aggregate connection state reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerState {
    /// Created, nothing exchanged yet.
    New,
    /// ICE/DTLS in progress.
    Connecting,
    /// Media and data can flow.
    Connected,
    /// Temporarily lost connectivity.
    Disconnected,
    /// Connectivity checks or handshake failed.
    Failed,
    /// Closed locally or remotely.
    Closed,
}

// ============================================================================
// PeerEvent
// ============================================================================

/// Asynchronous notification from a peer connection.
pub enum PeerEvent {
    /// The aggregate state changed.
    StateChanged(PeerState),
    /// A local candidate was gathered and must reach the remote peer.
    LocalCandidate(IceCandidate),
    /// The remote peer opened a data channel.
    DataChannel(Arc<dyn DataChannel>),
}

impl fmt::Debug for PeerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateChanged(state) => f.debug_tuple("StateChanged").field(state).finish(),
            Self::LocalCandidate(candidate) => {
                f.debug_tuple("LocalCandidate").field(candidate).finish()
            }
            Self::DataChannel(channel) => f.debug_tuple("DataChannel").field(&channel.label()).finish(),
        }
    }
}

/// Event handler callback type.
///
/// Called by the transport for each [`PeerEvent`]. May be invoked from any
/// thread; must not block.
pub type PeerEventHandler = Box<dyn Fn(PeerEvent) + Send + Sync>;

// ============================================================================
// Traits
// ============================================================================

/// A named data sub-channel on a peer connection.
#[async_trait]
pub trait DataChannel: Send + Sync + 'static {
    /// Channel label.
    fn label(&self) -> &str;

    /// Sends one message.
    async fn send(&self, data: &[u8]) -> Result<()>;

    /// Closes the sub-channel.
    async fn close(&self) -> Result<()>;
}

/// An opaque peer connection handle.
///
/// `create_offer` and `create_answer` also apply the produced description
/// locally, so a successful call leaves the connection ready for the
/// matching remote description.
#[async_trait]
pub trait PeerConnection: Send + Sync + 'static {
    /// Installs the event handler, replacing any previous one.
    fn set_event_handler(&self, handler: PeerEventHandler);

    /// Creates and applies a local offer.
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Creates and applies a local answer to the applied remote offer.
    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Applies a remote offer or answer.
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    /// Adds a remote candidate.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Creates a named data sub-channel.
    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>>;

    /// Closes the connection and releases transport resources.
    async fn close(&self) -> Result<()>;
}

/// Factory for peer connection handles.
pub trait RtcFacade: Send + Sync + 'static {
    /// Constructs a new, unnegotiated peer connection.
    ///
    /// # Errors
    ///
    /// Implementations fail if the transport cannot allocate a connection.
    fn create_peer_connection(&self, config: &RtcConfig) -> Result<Arc<dyn PeerConnection>>;
}
