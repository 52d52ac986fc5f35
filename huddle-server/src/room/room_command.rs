use huddle_core::{ParticipantId, SignalMessage};
use tokio::sync::{mpsc, oneshot};

/// Identifies one transport session of a participant. A participant that
/// reconnects under the same id gets a new session, so a late `Leave` from
/// the old transport cannot evict the new one.
pub type SessionId = u64;

/// Commands delivered to a room by the signaling layer.
#[derive(Debug)]
pub enum RoomCommand {
    /// The participant announced itself with `join`.
    Join {
        participant: ParticipantId,
        session: SessionId,
        outbox: mpsc::UnboundedSender<SignalMessage>,
    },

    /// A frame received from a joined session, to be routed.
    Route {
        session: SessionId,
        message: SignalMessage,
    },

    /// The session's transport closed or missed its heartbeat.
    Leave { session: SessionId },

    /// Drop a participant whatever session it is on.
    Disconnect { participant: ParticipantId },

    /// Current members in join order.
    Members {
        reply: oneshot::Sender<Vec<ParticipantId>>,
    },
}
