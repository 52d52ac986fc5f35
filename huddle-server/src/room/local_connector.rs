use crate::room::RoomManager;
use crate::signaling::SignalingSession;
use async_trait::async_trait;
use huddle_core::{Connector, Link, ParticipantId, Result, RoomId};
use tokio::sync::mpsc;
use tracing::debug;

/// Connects clients to a coordinator living in the same process, without
/// sockets. Used for embedding and for end-to-end tests.
#[derive(Clone)]
pub struct LocalConnector {
    rooms: RoomManager,
}

impl LocalConnector {
    pub fn new(rooms: RoomManager) -> Self {
        Self { rooms }
    }
}

#[async_trait]
impl Connector for LocalConnector {
    async fn open(&self, room: &RoomId, participant: &ParticipantId) -> Result<Link> {
        let (outgoing, mut from_client) = mpsc::unbounded_channel();
        let (to_client, incoming) = mpsc::unbounded_channel();

        let mut session =
            SignalingSession::new(self.rooms.clone(), room.clone(), participant.clone(), to_client);

        tokio::spawn(async move {
            while let Some(msg) = from_client.recv().await {
                session.accept(msg).await;
            }
            debug!("Local transport of {} closed", session.participant());
            session.finish().await;
        });

        Ok(Link { outgoing, incoming })
    }
}
