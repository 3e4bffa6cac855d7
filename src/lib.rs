//! RTC Resource Manager - pooled WebRTC peer connections over pluggable signaling.
//!
//! This library keeps one reference-counted peer connection per remote peer,
//! negotiates it over whichever signaling channel the caller registers, and
//! closes it once it has gone unused for a configurable TTL.
//!
//! # Architecture
//!
//! The manager sits between two caller-supplied seams:
//!
//! - **Signaling (caller)**: [`SignalingChannel`] implementations carry
//!   offers, answers and candidates to remote peers and classify inbound frames
//! - **Transport (caller)**: an [`RtcFacade`] hands out opaque
//!   [`PeerConnection`] handles from whatever WebRTC stack is in use
//!
//! Key design principles:
//!
//! - Each [`TrackedConnection`] owns: peer connection + negotiation loop + eviction timer
//! - Connections are shared: repeated [`connect_to`](ResourceManager::connect_to)
//!   calls join the same connection and bump its usage count
//! - A connection whose usage count reaches zero is evicted after the TTL
//!   unless someone acquires it first
//! - Inbound frames flow through [`ResourceManager::response`]
//!
//! # Quick Start
//!
//! ```ignore
//! use rtc_resource_manager::{ResourceManager, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = ResourceManager::builder()
//!         .channel(ws_channel)
//!         .rtc_facade(facade)
//!         .build()?;
//!
//!     // Opens (or joins) the connection to "alice"
//!     let connection = manager.connect_to("alice").await?;
//!     let chat = connection.add_data_connection("chat").await?;
//!     chat.send(b"hello").await?;
//!
//!     // Every inbound signaling frame goes through the manager
//!     manager.response(&frame, "ws")?;
//!
//!     // Drop one usage; the connection closes after the TTL
//!     manager.close("alice")?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`channel`] | Signaling channel trait, handles and registry |
//! | [`connection`] | [`TrackedConnection`] and its negotiation loop |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`manager`] | [`ResourceManager`], builder and configuration |
//! | [`protocol`] | Signaling message types and JSON envelope |
//! | [`rtc`] | Transport seam: peer connections and ICE configuration |

// ============================================================================
// Modules
// ============================================================================

/// Signaling channels.
///
/// Implement [`SignalingChannel`] for each transport that carries
/// negotiation messages.
pub mod channel;

/// Tracked peer connections.
///
/// - [`TrackedConnection`] - Shared, reference-counted peer connection
pub mod connection;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for peers and managers.
pub mod identifiers;

/// Resource manager, builder and configuration.
///
/// Use [`ResourceManager::builder()`] to create a configured manager.
pub mod manager;

/// Signaling message types.
pub mod protocol;

/// WebRTC transport seam.
pub mod rtc;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Channel types
pub use channel::{ChannelHandle, ChannelRef, ChannelState, SignalingChannel, validate_channel};

// Connection types
pub use connection::{DEFAULT_DATA_CHANNEL, NegotiationState, OpenStatus, TrackedConnection};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ManagerId, PeerId};

// Manager types
pub use manager::{
    ConnectBuilder, DEFAULT_CONNECTION_TTL, ManagerBuilder, ManagerConfig, MergePolicy,
    ResourceManager,
};

// Protocol types
pub use protocol::{
    IceCandidate, Response, ResponseKind, SdpType, SessionDescription, Signal, decode_response,
    encode_signal,
};

// Transport types
pub use rtc::{
    DataChannel, IceServer, IceTransportPolicy, PeerConnection, PeerEvent, PeerEventHandler,
    PeerState, RtcConfig, RtcFacade,
};
