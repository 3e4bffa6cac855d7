//! Signaling protocol message types.
//!
//! This module defines the messages exchanged between the manager and the
//! signaling channels it multiplexes.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Signal` | Manager → Channel | Local offer, answer or candidate |
//! | `Response` | Channel → Manager | Classified inbound message |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `signal` | Signal, Response and their payload types |
//! | `envelope` | Ready-made JSON `{kind, data}` codec |

// ============================================================================
// Submodules
// ============================================================================

/// JSON envelope codec.
pub mod envelope;

/// Signal and Response message types.
pub mod signal;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{decode_response, encode_signal};
pub use signal::{IceCandidate, Response, ResponseKind, SdpType, SessionDescription, Signal};
