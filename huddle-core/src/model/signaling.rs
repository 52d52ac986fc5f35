use crate::error::{CallError, Result};
use crate::model::participant::ParticipantId;
use crate::model::payload::{IceCandidate, JoinNotice, SessionDescription};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// One signaling frame. `from` on `peer-joined`/`peer-left` names the
/// participant that joined or left; `to` exists only on unicast kinds.
/// `data` is opaque to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalMessage {
    Join {
        from: ParticipantId,
    },
    PeerJoined {
        from: ParticipantId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<JoinNotice>,
    },
    PeerLeft {
        from: ParticipantId,
    },
    Offer {
        from: ParticipantId,
        to: ParticipantId,
        #[serde(default)]
        data: Value,
    },
    Answer {
        from: ParticipantId,
        to: ParticipantId,
        #[serde(default)]
        data: Value,
    },
    IceCandidate {
        from: ParticipantId,
        to: ParticipantId,
        #[serde(default)]
        data: Value,
    },
}

impl SignalMessage {
    /// Tells existing members that `from` has just joined.
    pub fn peer_joined(from: ParticipantId) -> Self {
        Self::PeerJoined {
            from,
            data: Some(JoinNotice { existing: false }),
        }
    }

    /// Tells a newcomer that `from` was already in the room.
    pub fn peer_present(from: ParticipantId) -> Self {
        Self::PeerJoined {
            from,
            data: Some(JoinNotice { existing: true }),
        }
    }

    pub fn peer_left(from: ParticipantId) -> Self {
        Self::PeerLeft { from }
    }

    pub fn offer(from: ParticipantId, to: ParticipantId, desc: &SessionDescription) -> Result<Self> {
        Ok(Self::Offer {
            from,
            to,
            data: encode(desc)?,
        })
    }

    pub fn answer(from: ParticipantId, to: ParticipantId, desc: &SessionDescription) -> Result<Self> {
        Ok(Self::Answer {
            from,
            to,
            data: encode(desc)?,
        })
    }

    pub fn ice_candidate(from: ParticipantId, to: ParticipantId, candidate: &IceCandidate) -> Result<Self> {
        Ok(Self::IceCandidate {
            from,
            to,
            data: encode(candidate)?,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::PeerJoined { .. } => "peer-joined",
            Self::PeerLeft { .. } => "peer-left",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
        }
    }

    pub fn sender(&self) -> &ParticipantId {
        match self {
            Self::Join { from }
            | Self::PeerJoined { from, .. }
            | Self::PeerLeft { from }
            | Self::Offer { from, .. }
            | Self::Answer { from, .. }
            | Self::IceCandidate { from, .. } => from,
        }
    }

    /// Recipient of a unicast message, `None` for broadcast kinds.
    pub fn recipient(&self) -> Option<&ParticipantId> {
        match self {
            Self::Offer { to, .. } | Self::Answer { to, .. } | Self::IceCandidate { to, .. } => {
                Some(to)
            }
            _ => None,
        }
    }

    pub fn is_unicast(&self) -> bool {
        self.recipient().is_some()
    }

    /// Replaces the sender with `id`. Payloads are left untouched.
    pub fn with_sender(mut self, id: ParticipantId) -> Self {
        match &mut self {
            Self::Join { from }
            | Self::PeerJoined { from, .. }
            | Self::PeerLeft { from }
            | Self::Offer { from, .. }
            | Self::Answer { from, .. }
            | Self::IceCandidate { from, .. } => *from = id,
        }
        self
    }

    /// Decodes the opaque payload of a unicast message.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        let data = match self {
            Self::Offer { data, .. } | Self::Answer { data, .. } | Self::IceCandidate { data, .. } => data,
            other => {
                return Err(CallError::ProtocolViolation(format!(
                    "'{}' carries no payload",
                    other.kind()
                )));
            }
        };

        serde_json::from_value(data.clone()).map_err(|e| {
            CallError::ProtocolViolation(format!("malformed '{}' payload: {}", self.kind(), e))
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CallError::ProtocolViolation(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| CallError::ProtocolViolation(e.to_string()))
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| CallError::ProtocolViolation(e.to_string()))
}
