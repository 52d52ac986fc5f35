use crate::room::{Room, RoomCommand, SessionId};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use huddle_core::{ParticipantId, RoomId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::info;

/// Registry of live rooms. A room is spawned on the first command addressed
/// to it and removed once its actor reports it empty.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<DashMap<RoomId, mpsc::Sender<RoomCommand>>>,
    next_session: Arc<AtomicU64>,
    capacity: usize,
}

impl RoomManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            next_session: Arc::new(AtomicU64::new(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn next_session(&self) -> SessionId {
        self.next_session.fetch_add(1, Ordering::Relaxed)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Delivers `cmd` to the room, creating the room if needed. A room that
    /// is shutting down refuses commands; the command is retried once the
    /// room has been retired and replaced.
    pub async fn dispatch(&self, room_id: &RoomId, cmd: RoomCommand) {
        let mut cmd = cmd;
        loop {
            let sender = self.room_sender(room_id);
            match sender.send(cmd).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(back)) => {
                    cmd = back;
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    /// Forcibly removes a participant, as if its transport had dropped.
    pub async fn disconnect(&self, room_id: &RoomId, participant: &ParticipantId) {
        if !self.contains_room(room_id) {
            return;
        }
        self.dispatch(
            room_id,
            RoomCommand::Disconnect {
                participant: participant.clone(),
            },
        )
        .await;
    }

    /// Members of the room in join order; empty if the room does not exist.
    pub async fn members(&self, room_id: &RoomId) -> Vec<ParticipantId> {
        if !self.contains_room(room_id) {
            return Vec::new();
        }
        let (reply, rx) = oneshot::channel();
        self.dispatch(room_id, RoomCommand::Members { reply }).await;
        rx.await.unwrap_or_default()
    }

    fn room_sender(&self, room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        match self.rooms.entry(room_id.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let tx = self.spawn_room(room_id.clone(), Vec::new());
                entry.insert(tx.clone());
                tx
            }
        }
    }

    fn spawn_room(&self, room_id: RoomId, replay: Vec<RoomCommand>) -> mpsc::Sender<RoomCommand> {
        info!("Creating new room: {}", room_id);

        let (tx, rx) = mpsc::channel(self.capacity.max(replay.len()));
        for cmd in replay {
            // Fresh channel sized for the replay; cannot be full.
            let _ = tx.try_send(cmd);
        }

        let room = Room::new(room_id.clone(), rx);
        let manager = self.clone();
        tokio::spawn(async move {
            let leftovers = room.run().await;
            manager.retire(room_id, leftovers);
        });

        tx
    }

    /// Called when a room actor exits. Commands that raced the shutdown are
    /// replayed, in order, into a fresh room before anyone else can reach it.
    fn retire(&self, room_id: RoomId, leftovers: Vec<RoomCommand>) {
        let Entry::Occupied(mut entry) = self.rooms.entry(room_id.clone()) else {
            return;
        };
        if !entry.get().is_closed() {
            return;
        }

        if leftovers.is_empty() {
            entry.remove();
            info!("Room {} destroyed", room_id);
        } else {
            let tx = self.spawn_room(room_id, leftovers);
            entry.insert(tx);
        }
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(100)
    }
}
