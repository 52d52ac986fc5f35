use crate::error::Result;
use crate::model::{ParticipantId, RoomId, SignalMessage};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// An open, ordered, bidirectional signaling pipe.
///
/// Dropping `outgoing` closes the transport; `incoming` yields `None` once
/// the remote side is gone.
pub struct Link {
    pub outgoing: mpsc::UnboundedSender<SignalMessage>,
    pub incoming: mpsc::UnboundedReceiver<SignalMessage>,
}

/// Opens a raw signaling transport to the coordinator of `room`.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self, room: &RoomId, participant: &ParticipantId) -> Result<Link>;
}
