//! Registry of signaling channels keyed by channel identifier.
//!
//! # Invariants
//!
//! - At most one handle per identifier is Bound to the owning manager.
//! - Replacing a handle closes the old one before the new one is bound.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identifiers::ManagerId;

use super::handle::{ChannelHandle, ChannelState};

// ============================================================================
// ChannelRef
// ============================================================================

/// Either a channel identifier or a channel handle.
#[derive(Debug, Clone)]
pub enum ChannelRef {
    /// Look the channel up by identifier.
    Id(String),
    /// Use this handle directly.
    Handle(ChannelHandle),
}

impl From<&str> for ChannelRef {
    #[inline]
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for ChannelRef {
    #[inline]
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<ChannelHandle> for ChannelRef {
    #[inline]
    fn from(handle: ChannelHandle) -> Self {
        Self::Handle(handle)
    }
}

impl From<&ChannelHandle> for ChannelRef {
    #[inline]
    fn from(handle: &ChannelHandle) -> Self {
        Self::Handle(handle.clone())
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Structural check on a channel before it may be bound.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the identifier is empty, padded with
/// whitespace, or contains control characters.
pub fn validate_channel(channel: &ChannelHandle) -> Result<()> {
    let id = channel.id();

    if id.is_empty() {
        return Err(Error::validation("channel id must not be empty"));
    }

    if id.trim() != id {
        return Err(Error::validation(format!(
            "channel id '{id}' has surrounding whitespace"
        )));
    }

    if id.chars().any(char::is_control) {
        return Err(Error::validation(format!(
            "channel id '{}' contains control characters",
            id.escape_debug()
        )));
    }

    Ok(())
}

// ============================================================================
// ChannelDirectory
// ============================================================================

/// Bound channels by identifier.
type ChannelMap = FxHashMap<String, ChannelHandle>;

/// Non-owning view of a registry's bound channels.
///
/// Lets long-lived connections find the handle currently bound under an id
/// after the one they started with has been replaced.
#[derive(Clone, Default)]
pub(crate) struct ChannelDirectory {
    channels: Weak<RwLock<ChannelMap>>,
}

impl ChannelDirectory {
    /// Returns the handle bound under `id`, if the registry still exists.
    pub(crate) fn current(&self, id: &str) -> Option<ChannelHandle> {
        self.channels.upgrade()?.read().get(id).cloned()
    }
}

// ============================================================================
// ChannelRegistry
// ============================================================================

/// Channels bound to one manager instance.
pub(crate) struct ChannelRegistry {
    /// Identity stamped on bound channels.
    manager_id: ManagerId,

    /// Bound channels by identifier.
    channels: Arc<RwLock<ChannelMap>>,

    /// Serializes replace-then-bind so no two handles for an id are Bound at once.
    registration: Mutex<()>,
}

impl ChannelRegistry {
    /// Creates an empty registry for `manager_id`.
    pub(crate) fn new(manager_id: ManagerId) -> Self {
        Self {
            manager_id,
            channels: Arc::new(RwLock::new(FxHashMap::default())),
            registration: Mutex::new(()),
        }
    }

    /// Returns a non-owning view of the bound channels.
    pub(crate) fn directory(&self) -> ChannelDirectory {
        ChannelDirectory {
            channels: Arc::downgrade(&self.channels),
        }
    }

    /// Returns the number of bound channels.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.channels.read().len()
    }

    /// Returns the identifiers of bound channels.
    pub(crate) fn ids(&self) -> Vec<String> {
        self.channels.read().keys().cloned().collect()
    }

    /// Validates and binds a channel, closing any other handle under its id.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the channel fails [`validate_channel`]
    /// - [`Error::Ownership`] if the handle is bound to another manager
    pub(crate) fn register(&self, channel: &ChannelHandle) -> Result<()> {
        validate_channel(channel)?;

        if let Some(owner) = channel.owner()
            && owner != self.manager_id
        {
            return Err(Error::ownership(channel.id()));
        }

        let _serial = self.registration.lock();
        let id = channel.id().to_string();

        let existing = self.channels.read().get(&id).cloned();
        if let Some(old) = existing {
            if old.same_channel(channel) && old.state() == ChannelState::Bound {
                debug!(channel_id = %id, "Channel already bound, nothing to do");
                return Ok(());
            }

            self.channels.write().remove(&id);
            old.close();
            info!(channel_id = %id, "Replaced channel, previous handle closed");
        }

        channel.mark_bound(self.manager_id);
        self.channels.write().insert(id, channel.clone());
        channel.notify_bound();

        Ok(())
    }

    /// Resolves a reference to a channel bound to this manager.
    ///
    /// Never mutates state.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelNotFound`] if no channel is registered under the id
    /// - [`Error::Ownership`] if the channel is not bound to this manager
    pub(crate) fn resolve(&self, reference: &ChannelRef) -> Result<ChannelHandle> {
        let handle = match reference {
            ChannelRef::Id(id) => self
                .channels
                .read()
                .get(id)
                .cloned()
                .ok_or_else(|| Error::channel_not_found(id.as_str()))?,
            ChannelRef::Handle(handle) => handle.clone(),
        };

        if handle.owner() != Some(self.manager_id) {
            return Err(Error::ownership(handle.id()));
        }

        Ok(handle)
    }

    /// Closes and removes the channel registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelNotFound`] if no channel is registered under `id`.
    pub(crate) fn unregister(&self, id: &str) -> Result<()> {
        let removed = {
            let _serial = self.registration.lock();
            self.channels.write().remove(id)
        };

        let handle = removed.ok_or_else(|| Error::channel_not_found(id))?;
        handle.close();
        info!(channel_id = %id, "Channel unregistered");
        Ok(())
    }

    /// Closes and removes every channel.
    pub(crate) fn close_all(&self) {
        let drained: Vec<_> = {
            let _serial = self.registration.lock();
            self.channels.write().drain().collect()
        };

        for (id, handle) in drained {
            handle.close();
            debug!(channel_id = %id, "Channel closed during shutdown");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
