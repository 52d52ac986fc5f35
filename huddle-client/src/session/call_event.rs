use crate::media::MediaStream;
use huddle_core::{CallError, ParticipantId};

/// What a call reports to the application.
#[derive(Debug, Clone)]
pub enum CallEvent {
    PeerJoined(ParticipantId),

    /// Sent each time the peer's stream gains a track.
    RemoteStream {
        peer: ParticipantId,
        stream: MediaStream,
    },

    PeerLeft(ParticipantId),

    /// Negotiation with one peer failed; the rest of the call goes on.
    NegotiationFailed {
        peer: ParticipantId,
        error: CallError,
    },

    /// The signaling channel closed under an active call. Sent once; the
    /// call is over.
    Terminated(CallError),
}
