mod participant;
mod payload;
mod room;
mod signaling;

pub use participant::ParticipantId;
pub use payload::{IceCandidate, JoinNotice, SdpType, SessionDescription};
pub use room::RoomId;
pub use signaling::{IceServerConfig, SignalMessage};
