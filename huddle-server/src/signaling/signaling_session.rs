use crate::room::{RoomCommand, RoomManager, SessionId};
use huddle_core::{ParticipantId, RoomId, SignalMessage};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Coordinator-side state of one participant transport, shared by the
/// WebSocket handler and the in-process connector.
///
/// Nothing is routed until the participant has sent `join`.
pub struct SignalingSession {
    rooms: RoomManager,
    room_id: RoomId,
    participant: ParticipantId,
    session: SessionId,
    outbox: Option<mpsc::UnboundedSender<SignalMessage>>,
    joined: bool,
}

impl SignalingSession {
    pub fn new(
        rooms: RoomManager,
        room_id: RoomId,
        participant: ParticipantId,
        outbox: mpsc::UnboundedSender<SignalMessage>,
    ) -> Self {
        let session = rooms.next_session();
        Self {
            rooms,
            room_id,
            participant,
            session,
            outbox: Some(outbox),
            joined: false,
        }
    }

    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// Handles one frame received from the participant.
    pub async fn accept(&mut self, message: SignalMessage) {
        match message {
            SignalMessage::Join { .. } => {
                let Some(outbox) = self.outbox.take() else {
                    warn!("{} sent a second join; ignoring", self.participant);
                    return;
                };
                info!("{} wants to join room '{}'", self.participant, self.room_id);
                self.joined = true;
                self.rooms
                    .dispatch(
                        &self.room_id,
                        RoomCommand::Join {
                            participant: self.participant.clone(),
                            session: self.session,
                            outbox,
                        },
                    )
                    .await;
            }
            other if !self.joined => {
                warn!(
                    "{} sent '{}' before join; dropping",
                    self.participant,
                    other.kind()
                );
            }
            other => {
                self.rooms
                    .dispatch(
                        &self.room_id,
                        RoomCommand::Route {
                            session: self.session,
                            message: other,
                        },
                    )
                    .await;
            }
        }
    }

    /// The transport is gone. Announces the departure if the participant had
    /// joined.
    pub async fn finish(self) {
        if !self.joined {
            return;
        }
        self.rooms
            .dispatch(
                &self.room_id,
                RoomCommand::Leave {
                    session: self.session,
                },
            )
            .await;
    }
}
