use crate::media::MediaStream;
use anyhow::Result;
use async_trait::async_trait;
use huddle_core::{IceCandidate, ParticipantId, SessionDescription};
use tokio::sync::mpsc;

/// What a media session reports on its own.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// A local candidate was gathered and must be trickled to the peer.
    LocalCandidate(IceCandidate),

    /// The remote stream gained a track; carries every track so far.
    RemoteStream(MediaStream),

    /// The media path failed for good.
    Failed(String),
}

/// The media session with one remote participant.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Creates an offer and applies it locally.
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Creates an answer to the applied remote offer and applies it locally.
    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Creates media sessions that send `local` to `peer` and report through
/// `events`.
#[async_trait]
pub trait PeerFactory: Send + Sync + 'static {
    async fn create(
        &self,
        peer: &ParticipantId,
        local: &MediaStream,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Box<dyn PeerConnection>>;
}
