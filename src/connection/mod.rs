//! Tracked peer connections.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `tracked` | `TrackedConnection`: usage count, eviction, data sub-channels |
//! | `negotiation` | Serial offer/answer/candidate loop per connection |
//! | `registry` | Connections keyed by peer |

// ============================================================================
// Submodules
// ============================================================================

/// Per-connection negotiation loop.
pub(crate) mod negotiation;

/// Connections keyed by peer.
pub(crate) mod registry;

/// Reference-counted connection wrapper.
pub mod tracked;

// ============================================================================
// Re-exports
// ============================================================================

pub use tracked::{DEFAULT_DATA_CHANNEL, NegotiationState, OpenStatus, TrackedConnection};

pub(crate) use registry::ConnectionRegistry;
pub(crate) use tracked::UsageGuard;
