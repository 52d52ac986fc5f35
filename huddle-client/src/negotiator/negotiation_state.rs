use std::fmt;

/// Progress of the offer/answer exchange with one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Idle,
    Offering,
    AwaitingAnswer,
    AwaitingOffer,
    Answering,
    Connected,
    Closed,
}

impl NegotiationState {
    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Which side sends the offer. The participant that learns of a peer that
/// was already in the room is the initiator; the other side waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    pub fn for_notice(existing: bool) -> Self {
        if existing {
            Self::Initiator
        } else {
            Self::Responder
        }
    }
}
