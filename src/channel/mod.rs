//! Signaling channels.
//!
//! A channel is the caller's out-of-band transport for negotiation
//! messages (a WebSocket to a signaling server, a chat relay, a pipe in
//! tests). The manager binds channels into its registry and routes
//! classified messages from them.
//!
//! # Channel Lifecycle
//!
//! ```text
//!  Unbound ──register──► Bound ──replace / unregister / shutdown──► Closed
//!                          ▲                                          │
//!                          └──────────── register (explicit) ─────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `handle` | `SignalingChannel` trait and `ChannelHandle` |
//! | `registry` | Per-manager channel registry |

// ============================================================================
// Submodules
// ============================================================================

/// Channel contract and lifecycle-tracked handle.
pub mod handle;

/// Per-manager channel registry.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use handle::{ChannelHandle, ChannelState, SignalingChannel};
pub use registry::{ChannelRef, validate_channel};

pub(crate) use registry::{ChannelDirectory, ChannelRegistry};
