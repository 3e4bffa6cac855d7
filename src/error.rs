//! Error types for the resource manager.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use rtc_resource_manager::{Result, ResourceManager};
//!
//! async fn example(manager: &ResourceManager) -> Result<()> {
//!     let conn = manager.connect_to("peer-1").await?;
//!     let chat = conn.add_data_connection("chat").await?;
//!     chat.send(b"hello").await?;
//!     manager.close("peer-1")?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Validation | [`Error::Validation`] |
//! | Lookup | [`Error::ChannelNotFound`], [`Error::ConnectionNotFound`] |
//! | Ownership | [`Error::Ownership`] |
//! | Protocol | [`Error::Protocol`] |
//! | Negotiation | [`Error::Negotiation`], [`Error::Signaling`] |
//! | Lifecycle | [`Error::Timeout`], [`Error::ConnectionClosed`] |
//! | External | [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::PeerId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// Malformed channel or configuration.
    ///
    /// Returned by channel registration and manager construction.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what failed validation.
        message: String,
    },

    // ========================================================================
    // Lookup Errors
    // ========================================================================
    /// No channel is registered under the identifier.
    #[error("Channel not found: {channel_id}")]
    ChannelNotFound {
        /// The missing channel ID.
        channel_id: String,
    },

    /// No tracked connection exists for the peer.
    #[error("Connection not found: {peer_id}")]
    ConnectionNotFound {
        /// The missing peer ID.
        peer_id: PeerId,
    },

    // ========================================================================
    // Ownership Errors
    // ========================================================================
    /// Channel resolved but is not bound to this manager instance.
    #[error("Channel {channel_id} is not bound to this manager instance")]
    Ownership {
        /// The foreign channel's ID.
        channel_id: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Unrecognized or out-of-sequence signaling message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Negotiation Errors
    // ========================================================================
    /// The underlying transport rejected an offer, answer, candidate or
    /// data sub-channel creation.
    #[error("Negotiation with {peer_id} failed: {message}")]
    Negotiation {
        /// Peer whose negotiation failed.
        peer_id: PeerId,
        /// Transport-supplied reason.
        message: String,
    },

    /// A signaling channel failed to deliver an outbound signal.
    #[error("Signaling channel failed: {message}")]
    Signaling {
        /// Description of the delivery failure.
        message: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The tracked connection was closed while a caller was waiting on it.
    #[error("Connection closed: {peer_id}")]
    ConnectionClosed {
        /// Peer whose connection closed.
        peer_id: PeerId,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a validation error.
    #[inline]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a channel not found error.
    #[inline]
    pub fn channel_not_found(channel_id: impl Into<String>) -> Self {
        Self::ChannelNotFound {
            channel_id: channel_id.into(),
        }
    }

    /// Creates a connection not found error.
    #[inline]
    pub fn connection_not_found(peer_id: PeerId) -> Self {
        Self::ConnectionNotFound { peer_id }
    }

    /// Creates an ownership error.
    #[inline]
    pub fn ownership(channel_id: impl Into<String>) -> Self {
        Self::Ownership {
            channel_id: channel_id.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a negotiation error.
    #[inline]
    pub fn negotiation(peer_id: PeerId, message: impl Into<String>) -> Self {
        Self::Negotiation {
            peer_id,
            message: message.into(),
        }
    }

    /// Creates a signaling delivery error.
    #[inline]
    pub fn signaling(message: impl Into<String>) -> Self {
        Self::Signaling {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a connection closed error.
    #[inline]
    pub fn connection_closed(peer_id: PeerId) -> Self {
        Self::ConnectionClosed { peer_id }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if an identifier was not found in either registry.
    #[inline]
    #[must_use]
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self,
            Self::ChannelNotFound { .. } | Self::ConnectionNotFound { .. }
        )
    }

    /// Returns `true` if the transport or signaling path rejected a step.
    #[inline]
    #[must_use]
    pub fn is_negotiation_error(&self) -> bool {
        matches!(self, Self::Negotiation { .. } | Self::Signaling { .. })
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Negotiation { .. }
                | Self::Signaling { .. }
                | Self::ConnectionClosed { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
