//! Inbound signaling dispatch.
//!
//! A frame from a channel is classified by that channel's `on_message` and
//! routed by kind:
//!
//! | Kind | Action |
//! |------|--------|
//! | `None` | Nothing |
//! | `Candidate` | Queue on the peer's connection; lookup error if untracked |
//! | `Offer` | Create or reuse the peer's connection, queue offer + answer |
//! | `Answer` | Queue on the connection awaiting it; protocol error otherwise |
//!
//! Structural checks run synchronously here. Transport failures surface
//! through pending [`connect_to`](ResourceManager::connect_to) calls.

// ============================================================================
// Imports
// ============================================================================

use tracing::{info, trace};

use crate::channel::{ChannelHandle, ChannelRef};
use crate::error::{Error, Result};
use crate::identifiers::PeerId;
use crate::protocol::{Response, ResponseKind, SdpType, SessionDescription};

use super::core::ResourceManager;

// ============================================================================
// ResourceManager - Dispatch
// ============================================================================

impl ResourceManager {
    /// Classifies a raw frame received on `channel` and acts on it.
    ///
    /// Returns the kind of the classified message.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelNotFound`] / [`Error::Ownership`] if the channel
    ///   does not resolve to this manager
    /// - Whatever the channel's `on_message` returns
    /// - [`Error::ConnectionNotFound`] for a candidate from an untracked peer
    /// - [`Error::Protocol`] for an answer nobody awaits, or a description
    ///   whose type contradicts its kind
    pub fn response(&self, raw: &[u8], channel: impl Into<ChannelRef>) -> Result<ResponseKind> {
        let channel = self.inner.channels.resolve(&channel.into())?;
        let response = channel.on_message(raw)?;
        let kind = response.kind();

        trace!(
            channel_id = %channel.id(),
            kind = %kind,
            peer_id = ?response.peer_id().map(PeerId::as_str),
            "Dispatching response"
        );

        match response {
            Response::None => {}

            Response::Candidate { peer_id, candidate } => {
                self.inner
                    .connections
                    .get(peer_id.as_str())?
                    .accept_candidate(candidate)?;
            }

            Response::Offer {
                peer_id,
                description,
            } => self.accept_offer(peer_id, description, channel)?,

            Response::Answer {
                peer_id,
                description,
            } => self.accept_answer(&peer_id, description)?,
        }

        Ok(kind)
    }

    fn accept_offer(
        &self,
        peer_id: PeerId,
        description: SessionDescription,
        channel: ChannelHandle,
    ) -> Result<()> {
        expect_sdp_type(&description, SdpType::Offer)?;

        let (connection, created) =
            self.inner
                .connections
                .get_or_insert(&peer_id, &channel, || self.create_peer(&peer_id))?;

        if created {
            info!(
                peer_id = %peer_id,
                channel_id = %channel.id(),
                "Remote offer opened connection"
            );
            connection.arm_idle_eviction();
        }

        connection.accept_offer(description, channel)
    }

    fn accept_answer(&self, peer_id: &PeerId, description: SessionDescription) -> Result<()> {
        expect_sdp_type(&description, SdpType::Answer)?;

        let connection = self
            .inner
            .connections
            .find(peer_id.as_str())
            .ok_or_else(|| {
                Error::protocol(format!("no connection is awaiting an answer from {peer_id}"))
            })?;

        connection.accept_answer(description)
    }
}

/// Rejects a description whose type contradicts the message kind.
fn expect_sdp_type(description: &SessionDescription, expected: SdpType) -> Result<()> {
    if description.sdp_type == expected {
        Ok(())
    } else {
        Err(Error::protocol(format!(
            "expected {expected:?} description, got {:?}",
            description.sdp_type
        )))
    }
}

// ============================================================================
// Tests
// ============================================================================
