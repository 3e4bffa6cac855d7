//! Per-connection negotiation loop.
//!
//! Every step that touches a peer connection (creating the offer, applying
//! remote descriptions and candidates, reacting to transport events) goes
//! through one queue and runs in one spawned task, so steps for a given
//! peer never interleave.
//!
//! # Failure
//!
//! A failed step marks the connection failed, which wakes pending opens
//! with [`Error::Negotiation`](crate::Error::Negotiation), detaches the
//! connection from its registry and queues [`NegotiationCommand::Close`].
//! A rejected remote candidate only fails a connection that is still
//! opening.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Weak;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::channel::ChannelHandle;
use crate::error::Error;
use crate::protocol::{IceCandidate, SessionDescription, Signal};
use crate::rtc::{PeerEvent, PeerState};

use super::tracked::{
    DEFAULT_DATA_CHANNEL, NegotiationState, Phase, TrackedConnection, TrackedInner,
};

// ============================================================================
// Types
// ============================================================================

/// Internal commands for the negotiation loop.
pub(crate) enum NegotiationCommand {
    /// Open the default sub-channel, create an offer and send it.
    CreateOffer,

    /// Apply a remote offer and send the answer on `reply_via`.
    ApplyOffer {
        description: SessionDescription,
        reply_via: ChannelHandle,
    },

    /// Apply a remote answer.
    ApplyAnswer(SessionDescription),

    /// Add a remote candidate.
    AddCandidate(IceCandidate),

    /// Event raised by the transport.
    Transport(PeerEvent),

    /// Close the transport and stop the loop.
    Close,
}

/// Outcome of one step; the error is the failure reason.
type StepResult = std::result::Result<(), String>;

// ============================================================================
// Event Loop
// ============================================================================

/// Runs until closed, or until the connection is dropped.
pub(crate) async fn run(
    connection: Weak<TrackedInner>,
    mut commands: mpsc::UnboundedReceiver<NegotiationCommand>,
) {
    while let Some(command) = commands.recv().await {
        let Some(inner) = connection.upgrade() else {
            break;
        };
        let tracked = TrackedConnection::from_inner(inner);

        match command {
            NegotiationCommand::CreateOffer => {
                if let Err(reason) = create_offer(&tracked).await {
                    tracked.fail(reason);
                }
            }

            NegotiationCommand::ApplyOffer {
                description,
                reply_via,
            } => {
                if let Err(reason) = apply_offer(&tracked, description, reply_via).await {
                    tracked.fail(reason);
                }
            }

            NegotiationCommand::ApplyAnswer(description) => {
                if let Err(e) = tracked
                    .peer_connection()
                    .set_remote_description(description)
                    .await
                {
                    tracked.fail(format!("remote answer rejected: {e}"));
                } else {
                    debug!(peer_id = %tracked.id(), "Remote answer applied");
                }
            }

            NegotiationCommand::AddCandidate(candidate) => {
                add_candidate(&tracked, candidate).await;
            }

            NegotiationCommand::Transport(event) => {
                if !handle_event(&tracked, event).await {
                    break;
                }
            }

            NegotiationCommand::Close => {
                close(&tracked).await;
                break;
            }
        }
    }

    debug!("Negotiation loop terminated");
}

// ============================================================================
// Steps
// ============================================================================

async fn create_offer(tracked: &TrackedConnection) -> StepResult {
    tracked
        .add_data_connection(DEFAULT_DATA_CHANNEL)
        .await
        .map_err(|e| match e {
            Error::Negotiation { message, .. } => message,
            other => other.to_string(),
        })?;

    let description = tracked
        .peer_connection()
        .create_offer()
        .await
        .map_err(|e| format!("create offer: {e}"))?;

    // Must be set before the offer leaves, or a fast answer is rejected.
    tracked.set_negotiation(NegotiationState::AwaitingAnswer);

    tracked
        .signal(Signal::Offer {
            peer_id: tracked.id().clone(),
            description,
        })
        .map_err(|e| format!("send offer: {e}"))?;

    debug!(peer_id = %tracked.id(), channel_id = %tracked.channel_id(), "Offer sent");
    Ok(())
}

async fn apply_offer(
    tracked: &TrackedConnection,
    description: SessionDescription,
    reply_via: ChannelHandle,
) -> StepResult {
    if tracked.negotiation_state() == NegotiationState::AwaitingAnswer {
        warn!(peer_id = %tracked.id(), "Offer collision, remote offer takes precedence");
    }

    let peer = tracked.peer_connection();

    peer.set_remote_description(description)
        .await
        .map_err(|e| format!("remote offer rejected: {e}"))?;

    let answer = peer
        .create_answer()
        .await
        .map_err(|e| format!("create answer: {e}"))?;

    tracked.set_negotiation(NegotiationState::Stable);

    reply_via
        .send(Signal::Answer {
            peer_id: tracked.id().clone(),
            description: answer,
        })
        .map_err(|e| format!("send answer: {e}"))?;

    debug!(peer_id = %tracked.id(), channel_id = %reply_via.id(), "Answer sent");
    Ok(())
}

async fn add_candidate(tracked: &TrackedConnection, candidate: IceCandidate) {
    match tracked.peer_connection().add_ice_candidate(candidate).await {
        Ok(()) => trace!(peer_id = %tracked.id(), "Remote candidate added"),
        Err(e) if tracked.phase() == Phase::Opening => {
            tracked.fail(format!("remote candidate rejected: {e}"));
        }
        Err(e) => {
            warn!(peer_id = %tracked.id(), error = %e, "Remote candidate rejected");
        }
    }
}

/// Returns `false` when the loop should stop.
async fn handle_event(tracked: &TrackedConnection, event: PeerEvent) -> bool {
    match event {
        PeerEvent::StateChanged(PeerState::Connected) => tracked.mark_open(),

        PeerEvent::StateChanged(PeerState::Failed) => {
            tracked.fail("transport reported connection failure");
        }

        PeerEvent::StateChanged(PeerState::Closed) => {
            debug!(peer_id = %tracked.id(), "Transport closed");
            tracked.mark_transport_closed();
            tracked.mark_closed();
            tracked.cancel_eviction();
            tracked.detach();
            tracked.clear_data_channels().await;
            return false;
        }

        PeerEvent::StateChanged(PeerState::Disconnected) => {
            warn!(peer_id = %tracked.id(), "Transport disconnected");
        }

        PeerEvent::StateChanged(state) => {
            trace!(peer_id = %tracked.id(), ?state, "Transport state changed");
        }

        PeerEvent::LocalCandidate(candidate) => {
            let sent = tracked.signal(Signal::Candidate {
                peer_id: tracked.id().clone(),
                candidate,
            });
            match sent {
                Ok(()) => trace!(peer_id = %tracked.id(), "Local candidate sent"),
                Err(e) if tracked.phase() == Phase::Opening => {
                    tracked.fail(format!("send candidate: {e}"));
                }
                Err(e) => warn!(peer_id = %tracked.id(), error = %e, "Local candidate dropped"),
            }
        }

        PeerEvent::DataChannel(channel) => tracked.adopt_data_channel(channel).await,
    }

    true
}

async fn close(tracked: &TrackedConnection) {
    tracked.close_transport().await;
    tracked.mark_closed();
    tracked.clear_data_channels().await;
    debug!(peer_id = %tracked.id(), "Connection closed");
}

// ============================================================================
// Tests
// ============================================================================
