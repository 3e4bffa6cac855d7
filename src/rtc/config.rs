//! Peer connection configuration (ICE servers).
//!
//! Mirrors the shape of the browser `RTCConfiguration` dictionary so a
//! configuration can be loaded straight from JSON:
//!
//! ```ignore
//! let config: RtcConfig = serde_json::from_str(r#"{
//!     "iceServers": [
//!         { "urls": "stun:stun.l.google.com:19302" },
//!         { "urls": ["turn:turn.example.org:3478"], "username": "u", "credential": "p" }
//!     ]
//! }"#)?;
//! config.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Public STUN servers used when no configuration is supplied.
pub const DEFAULT_STUN_URLS: &[&str] = &["stun:stun.l.google.com:19302", "stun:stun.ekiga.net"];

/// URL schemes accepted for ICE servers.
const ICE_SCHEMES: &[&str] = &["stun", "stuns", "turn", "turns"];

// ============================================================================
// IceTransportPolicy
// ============================================================================

/// Which candidates the transport may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceTransportPolicy {
    /// Any candidate type.
    #[default]
    All,
    /// Relay (TURN) candidates only.
    Relay,
}

// ============================================================================
// IceServer
// ============================================================================

/// A STUN or TURN server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    /// Server URLs; a single string is accepted when deserializing.
    #[serde(deserialize_with = "one_or_many")]
    pub urls: Vec<String>,

    /// TURN username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// TURN credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    /// Creates a server entry from its URLs.
    #[must_use]
    pub fn new(urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            username: None,
            credential: None,
        }
    }

    /// Attaches TURN credentials.
    #[inline]
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.credential = Some(credential.into());
        self
    }

    /// Checks URL syntax, scheme, and TURN credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.urls.is_empty() {
            return Err(Error::validation("ICE server has no URLs"));
        }

        for raw in &self.urls {
            let url = Url::parse(raw)
                .map_err(|e| Error::validation(format!("invalid ICE server URL '{raw}': {e}")))?;

            let scheme = url.scheme();
            if !ICE_SCHEMES.contains(&scheme) {
                return Err(Error::validation(format!(
                    "unsupported ICE server scheme '{scheme}' in '{raw}'"
                )));
            }

            if scheme.starts_with("turn") && (self.username.is_none() || self.credential.is_none())
            {
                return Err(Error::validation(format!(
                    "TURN server '{raw}' requires a username and credential"
                )));
            }
        }

        Ok(())
    }
}

/// Accepts `"url"` or `["url", ...]`.
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(url) => vec![url],
        OneOrMany::Many(urls) => urls,
    })
}

// ============================================================================
// RtcConfig
// ============================================================================

/// Options handed to the facade when constructing a peer connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcConfig {
    /// STUN/TURN servers.
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,

    /// Candidate restriction.
    #[serde(default)]
    pub ice_transport_policy: IceTransportPolicy,
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServer::new(DEFAULT_STUN_URLS.iter().copied())],
            ice_transport_policy: IceTransportPolicy::All,
        }
    }
}

impl RtcConfig {
    /// Creates a configuration with the given servers.
    #[must_use]
    pub fn with_servers(ice_servers: impl IntoIterator<Item = IceServer>) -> Self {
        Self {
            ice_servers: ice_servers.into_iter().collect(),
            ice_transport_policy: IceTransportPolicy::All,
        }
    }

    /// Restricts the transport to relay candidates.
    #[inline]
    #[must_use]
    pub fn relay_only(mut self) -> Self {
        self.ice_transport_policy = IceTransportPolicy::Relay;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if there are no servers, any server is
    /// malformed, or relay-only is requested without a TURN server.
    pub fn validate(&self) -> Result<()> {
        if self.ice_servers.is_empty() {
            return Err(Error::validation("rtc config must list at least one ICE server"));
        }

        for server in &self.ice_servers {
            server.validate()?;
        }

        if self.ice_transport_policy == IceTransportPolicy::Relay {
            let has_turn = self
                .ice_servers
                .iter()
                .flat_map(|s| s.urls.iter())
                .any(|u| u.starts_with("turn"));
            if !has_turn {
                return Err(Error::validation(
                    "relay-only transport policy requires a TURN server",
                ));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
