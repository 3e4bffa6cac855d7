//! JSON envelope codec for signaling channels.
//!
//! Channel implementations are free to pick any wire format; this codec is
//! the ready-made one. Use [`decode_response`] inside
//! [`SignalingChannel::on_message`](crate::channel::SignalingChannel::on_message)
//! and [`encode_signal`] inside `send`.
//!
//! # Format
//!
//! ```json
//! { "kind": "offer", "data": { "peerId": "p1", "sdp": "v=0\r\n..." } }
//! { "kind": "answer", "data": { "peerId": "p1", "sdp": "v=0\r\n..." } }
//! { "kind": "candidate", "data": { "peerId": "p1", "candidate": "candidate:...", "sdpMid": "0", "sdpMLineIndex": 0 } }
//! { "kind": "none" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::PeerId;

use super::signal::{IceCandidate, Response, ResponseKind, SessionDescription, Signal};

// ============================================================================
// Wire Types
// ============================================================================

/// Outer `{kind, data}` frame.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    data: Value,
}

/// Payload of offer and answer frames.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptionData {
    peer_id: PeerId,
    sdp: String,
}

/// Payload of candidate frames.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidateData {
    peer_id: PeerId,
    #[serde(flatten)]
    candidate: IceCandidate,
}

// ============================================================================
// Codec
// ============================================================================

/// Decodes a raw frame into a classified [`Response`].
///
/// # Errors
///
/// - [`Error::Json`] if the frame is not a JSON object with a `kind`
/// - [`Error::Protocol`] if `kind` is unrecognized or `data` is malformed
pub fn decode_response(raw: &[u8]) -> Result<Response> {
    let envelope: Envelope = serde_json::from_slice(raw)?;
    trace!(kind = %envelope.kind, "Decoding signaling envelope");

    match envelope.kind.as_str() {
        "none" => Ok(Response::None),
        "candidate" => {
            let data: CandidateData = payload(ResponseKind::Candidate, envelope.data)?;
            Ok(Response::Candidate {
                peer_id: data.peer_id,
                candidate: data.candidate,
            })
        }
        "offer" => {
            let data: DescriptionData = payload(ResponseKind::Offer, envelope.data)?;
            Ok(Response::Offer {
                peer_id: data.peer_id,
                description: SessionDescription::offer(data.sdp),
            })
        }
        "answer" => {
            let data: DescriptionData = payload(ResponseKind::Answer, envelope.data)?;
            Ok(Response::Answer {
                peer_id: data.peer_id,
                description: SessionDescription::answer(data.sdp),
            })
        }
        other => Err(Error::protocol(format!(
            "unrecognized response kind: {other}"
        ))),
    }
}

/// Encodes an outbound [`Signal`] into a frame.
///
/// # Errors
///
/// Returns [`Error::Json`] if serialization fails.
pub fn encode_signal(signal: &Signal) -> Result<Vec<u8>> {
    let data = match signal {
        Signal::Offer {
            peer_id,
            description,
        }
        | Signal::Answer {
            peer_id,
            description,
        } => serde_json::to_value(DescriptionData {
            peer_id: peer_id.clone(),
            sdp: description.sdp.clone(),
        })?,
        Signal::Candidate { peer_id, candidate } => serde_json::to_value(CandidateData {
            peer_id: peer_id.clone(),
            candidate: candidate.clone(),
        })?,
    };

    let envelope = Envelope {
        kind: signal.kind().as_str().to_string(),
        data,
    };

    Ok(serde_json::to_vec(&envelope)?)
}

/// Deserializes the `data` member for a given kind.
fn payload<T: DeserializeOwned>(kind: ResponseKind, data: Value) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| Error::protocol(format!("malformed {kind} data: {e}")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_none() {
        let response = decode_response(br#"{"kind":"none"}"#).unwrap();
        assert_eq!(response, Response::None);
    }

    #[test]
    fn test_decode_none_with_payload() {
        let response = decode_response(br#"{"kind":"none","data":{"presence":"online"}}"#);
        assert!(matches!(response, Ok(Response::None)));
    }

    #[test]
    fn test_decode_offer() {
        let response =
            decode_response(br#"{"kind":"offer","data":{"peerId":"p1","sdp":"v=0"}}"#).unwrap();
        assert_eq!(
            response,
            Response::Offer {
                peer_id: PeerId::new("p1"),
                description: SessionDescription::offer("v=0"),
            }
        );
    }

    #[test]
    fn test_decode_candidate() {
        let raw = br#"{"kind":"candidate","data":{"peerId":"p1","candidate":"candidate:1","sdpMid":"0","sdpMLineIndex":0}}"#;
        let response = decode_response(raw).unwrap();
        let Response::Candidate { peer_id, candidate } = response else {
            panic!("expected candidate, got {response:?}");
        };
        assert_eq!(peer_id.as_str(), "p1");
        assert_eq!(candidate, IceCandidate::new("candidate:1").with_mid("0", 0));
    }

    #[test]
    fn test_decode_unknown_kind() {
        let err = decode_response(br#"{"kind":"bye","data":{}}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
        assert!(err.to_string().contains("unrecognized response kind: bye"));
    }

    #[test]
    fn test_decode_missing_peer() {
        let err = decode_response(br#"{"kind":"answer","data":{"sdp":"v=0"}}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_decode_not_json() {
        let err = decode_response(b"hello").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_encode_candidate_shape() {
        let signal = Signal::Candidate {
            peer_id: PeerId::new("p2"),
            candidate: IceCandidate::new("candidate:9"),
        };
        let bytes = encode_signal(&signal).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["kind"], "candidate");
        assert_eq!(value["data"]["peerId"], "p2");
        assert_eq!(value["data"]["candidate"], "candidate:9");
    }

    #[test]
    fn test_encoded_answer_decodes_as_answer() {
        let signal = Signal::Answer {
            peer_id: PeerId::new("p3"),
            description: SessionDescription::answer("v=0 answer"),
        };
        let bytes = encode_signal(&signal).unwrap();
        assert_eq!(
            decode_response(&bytes).unwrap(),
            Response::Answer {
                peer_id: PeerId::new("p3"),
                description: SessionDescription::answer("v=0 answer"),
            }
        );
    }
}
