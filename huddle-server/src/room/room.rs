use crate::room::room_command::{RoomCommand, SessionId};
use huddle_core::{ParticipantId, RoomId, SignalMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct Member {
    id: ParticipantId,
    session: SessionId,
    outbox: mpsc::UnboundedSender<SignalMessage>,
}

impl Member {
    fn deliver(&self, msg: SignalMessage) {
        if self.outbox.send(msg).is_err() {
            // The transport is gone; its own Leave will follow.
            debug!("Outbox of {} already closed", self.id);
        }
    }
}

/// Room actor: owns the membership of one call and routes signaling
/// between its members. Members are kept in join order.
pub struct Room {
    id: RoomId,
    members: Vec<Member>,
    command_rx: mpsc::Receiver<RoomCommand>,
}

impl Room {
    pub fn new(id: RoomId, command_rx: mpsc::Receiver<RoomCommand>) -> Self {
        Self {
            id,
            members: Vec::new(),
            command_rx,
        }
    }

    /// Runs until the room is empty. Commands that were already queued when
    /// the room shut down are handed back so the caller can replay them.
    pub async fn run(mut self) -> Vec<RoomCommand> {
        info!("Room {} event loop started", self.id);

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);

            if self.members.is_empty() {
                break;
            }
        }

        self.command_rx.close();
        let mut leftovers = Vec::new();
        while let Some(cmd) = self.command_rx.recv().await {
            leftovers.push(cmd);
        }

        info!("Room {} event loop finished", self.id);
        leftovers
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                participant,
                session,
                outbox,
            } => self.join(participant, session, outbox),

            RoomCommand::Route { session, message } => self.route(session, message),

            RoomCommand::Leave { session } => {
                if let Some(pos) = self.members.iter().position(|m| m.session == session) {
                    self.remove_at(pos);
                }
            }

            RoomCommand::Disconnect { participant } => {
                if let Some(pos) = self.members.iter().position(|m| m.id == participant) {
                    info!("Disconnecting {} from room {}", participant, self.id);
                    self.remove_at(pos);
                }
            }

            RoomCommand::Members { reply } => {
                let _ = reply.send(self.members.iter().map(|m| m.id.clone()).collect());
            }
        }
    }

    fn join(
        &mut self,
        participant: ParticipantId,
        session: SessionId,
        outbox: mpsc::UnboundedSender<SignalMessage>,
    ) {
        if let Some(pos) = self.members.iter().position(|m| m.id == participant) {
            warn!(
                "{} joined room {} again; replacing the previous session",
                participant, self.id
            );
            self.remove_at(pos);
        }

        info!("{} joined room {}", participant, self.id);

        let newcomer = Member {
            id: participant,
            session,
            outbox,
        };

        for existing in &self.members {
            existing.deliver(SignalMessage::peer_joined(newcomer.id.clone()));
            newcomer.deliver(SignalMessage::peer_present(existing.id.clone()));
        }

        self.members.push(newcomer);
    }

    fn route(&mut self, session: SessionId, message: SignalMessage) {
        let Some(sender) = self.members.iter().find(|m| m.session == session) else {
            warn!(
                "Dropping '{}' in room {}: sender has not joined",
                message.kind(),
                self.id
            );
            return;
        };

        if !message.is_unicast() {
            warn!(
                "Dropping '{}' from {}: only offer, answer and ice-candidate are routed",
                message.kind(),
                sender.id
            );
            return;
        }

        let message = message.with_sender(sender.id.clone());
        let Some(to) = message.recipient() else {
            return;
        };

        match self.members.iter().find(|m| &m.id == to) {
            Some(recipient) => {
                debug!("Routing '{}' {} -> {}", message.kind(), sender.id, recipient.id);
                recipient.deliver(message);
            }
            None => warn!(
                "Dropping '{}' from {}: {} is not in room {}",
                message.kind(),
                sender.id,
                to,
                self.id
            ),
        }
    }

    fn remove_at(&mut self, pos: usize) {
        let gone = self.members.remove(pos);
        info!("{} left room {}", gone.id, self.id);

        for member in &self.members {
            member.deliver(SignalMessage::peer_left(gone.id.clone()));
        }
    }
}
