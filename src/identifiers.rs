//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing a peer identifier with a channel
//! identifier or a manager identity at compile time.
//!
//! | Type | Wraps | Purpose |
//! |------|-------|---------|
//! | [`PeerId`] | `String` | Key of the connection registry |
//! | [`ManagerId`] | `Uuid` | Owning-manager identity on a channel |

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// PeerId
// ============================================================================

/// Identifier of a remote peer, and of the tracked connection to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Creates a peer ID from any string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random peer ID (UUID v4).
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    #[inline]
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    #[inline]
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&PeerId> for PeerId {
    #[inline]
    fn from(id: &PeerId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for PeerId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PeerId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// ManagerId
// ============================================================================

/// Identity of a resource manager instance.
///
/// Stored on bound channels as a non-owning back-reference; only ever
/// compared for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManagerId(Uuid);

impl ManagerId {
    /// Allocates a fresh, unique manager identity.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
