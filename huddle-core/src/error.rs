use crate::model::ParticipantId;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("signaling channel is not open")]
    ChannelNotReady,

    #[error("signaling channel closed")]
    ChannelClosed,

    #[error("local media acquisition failed: {0}")]
    MediaAcquisitionFailed(String),

    #[error("negotiation with {peer} failed: {reason}")]
    NegotiationFailed { peer: ParticipantId, reason: String },

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The call API was used in a state that does not allow it.
    #[error("call is {0}")]
    InvalidState(String),

    /// The transport could not be opened at all.
    #[error("transport error: {0}")]
    Transport(String),
}

impl CallError {
    pub fn negotiation(peer: &ParticipantId, reason: impl ToString) -> Self {
        Self::NegotiationFailed {
            peer: peer.clone(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CallError>;
