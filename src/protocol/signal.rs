//! Typed signaling messages.
//!
//! Outbound messages are [`Signal`]s handed to a channel's `send`; inbound
//! bytes are classified by the channel's `on_message` into a [`Response`].
//!
//! The `peer_id` of a [`Signal`] names the remote peer it is addressed to.
//! The `peer_id` of a [`Response`] names the remote peer it came from.
//! Translating between the two is the channel transport's business.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identifiers::PeerId;

// ============================================================================
// SessionDescription
// ============================================================================

/// Which half of an offer/answer exchange a description is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    /// Session offer.
    Offer,
    /// Session answer.
    Answer,
}

/// A session description (SDP) with its type.
///
/// # Format
///
/// ```json
/// { "type": "offer", "sdp": "v=0\r\n..." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Offer or answer.
    #[serde(rename = "type")]
    pub sdp_type: SdpType,

    /// Raw SDP text.
    pub sdp: String,
}

impl SessionDescription {
    /// Creates an offer description.
    #[inline]
    #[must_use]
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    /// Creates an answer description.
    #[inline]
    #[must_use]
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

// ============================================================================
// IceCandidate
// ============================================================================

/// A network-reachability candidate exchanged during connection setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    /// Candidate attribute line (`candidate:...`).
    pub candidate: String,

    /// Media stream identification tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    /// Index of the media description the candidate belongs to.
    #[serde(
        default,
        rename = "sdpMLineIndex",
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
}

impl IceCandidate {
    /// Creates a candidate without media association.
    #[inline]
    #[must_use]
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
        }
    }

    /// Sets the media association.
    #[inline]
    #[must_use]
    pub fn with_mid(mut self, sdp_mid: impl Into<String>, sdp_mline_index: u16) -> Self {
        self.sdp_mid = Some(sdp_mid.into());
        self.sdp_mline_index = Some(sdp_mline_index);
        self
    }
}

// ============================================================================
// Signal
// ============================================================================

/// An outbound signaling message, sent through a channel to a remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Local offer for a connection this side initiated.
    Offer {
        /// Addressee.
        peer_id: PeerId,
        /// Local offer.
        description: SessionDescription,
    },

    /// Local answer to a remote offer.
    Answer {
        /// Addressee.
        peer_id: PeerId,
        /// Local answer.
        description: SessionDescription,
    },

    /// Locally gathered candidate.
    Candidate {
        /// Addressee.
        peer_id: PeerId,
        /// The candidate.
        candidate: IceCandidate,
    },
}

impl Signal {
    /// Returns the peer the signal is addressed to.
    #[inline]
    #[must_use]
    pub fn peer_id(&self) -> &PeerId {
        match self {
            Self::Offer { peer_id, .. }
            | Self::Answer { peer_id, .. }
            | Self::Candidate { peer_id, .. } => peer_id,
        }
    }

    /// Returns the kind tag of the signal.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ResponseKind {
        match self {
            Self::Offer { .. } => ResponseKind::Offer,
            Self::Answer { .. } => ResponseKind::Answer,
            Self::Candidate { .. } => ResponseKind::Candidate,
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// Classification tag of a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// Nothing for the manager to do.
    None,
    /// Remote candidate.
    Candidate,
    /// Remote offer.
    Offer,
    /// Remote answer.
    Answer,
}

impl ResponseKind {
    /// Returns the wire name of the kind.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Candidate => "candidate",
            Self::Offer => "offer",
            Self::Answer => "answer",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound signaling message, as classified by a channel's `on_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Miscellaneous traffic the manager ignores (presence, keep-alives...).
    None,

    /// Candidate from a remote peer.
    Candidate {
        /// Sender.
        peer_id: PeerId,
        /// The candidate.
        candidate: IceCandidate,
    },

    /// Offer from a remote peer.
    Offer {
        /// Sender.
        peer_id: PeerId,
        /// Remote offer.
        description: SessionDescription,
    },

    /// Answer from a remote peer to a local offer.
    Answer {
        /// Sender.
        peer_id: PeerId,
        /// Remote answer.
        description: SessionDescription,
    },
}

impl Response {
    /// Returns the kind tag of the response.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ResponseKind {
        match self {
            Self::None => ResponseKind::None,
            Self::Candidate { .. } => ResponseKind::Candidate,
            Self::Offer { .. } => ResponseKind::Offer,
            Self::Answer { .. } => ResponseKind::Answer,
        }
    }

    /// Returns the sending peer, if the response carries one.
    #[inline]
    #[must_use]
    pub fn peer_id(&self) -> Option<&PeerId> {
        match self {
            Self::None => None,
            Self::Candidate { peer_id, .. }
            | Self::Offer { peer_id, .. }
            | Self::Answer { peer_id, .. } => Some(peer_id),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
