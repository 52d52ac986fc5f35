use crate::channel::SignalSink;
use crate::media::{MediaStream, PeerConnection, PeerEvent, PeerFactory};
use crate::negotiator::{CLOSE_GRACE, NegotiationState, Role};
use huddle_core::{
    CallError, IceCandidate, ParticipantId, SdpType, SessionDescription, SignalMessage,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

type StepResult = std::result::Result<(), CallError>;

/// Everything negotiators of one call share.
#[derive(Clone)]
pub struct NegotiatorContext {
    pub local: ParticipantId,
    pub local_media: MediaStream,
    pub factory: Arc<dyn PeerFactory>,
    pub signals: Arc<dyn SignalSink>,
    pub events: mpsc::UnboundedSender<NegotiatorEvent>,
}

#[derive(Debug)]
pub enum NegotiatorInput {
    /// Create the media session; the initiator also sends its offer.
    Start,
    /// An `offer`, `answer` or `ice-candidate` from the peer.
    Signal(SignalMessage),
    Peer(PeerEvent),
    Close,
}

#[derive(Debug, Clone)]
pub enum NegotiatorEventKind {
    RemoteStream(MediaStream),
    /// The negotiator closed itself after an unrecoverable error.
    Failed(CallError),
}

/// Reported to the session. `generation` tells a negotiator apart from a
/// later one for the same peer.
#[derive(Debug, Clone)]
pub struct NegotiatorEvent {
    pub peer: ParticipantId,
    pub generation: u64,
    pub kind: NegotiatorEventKind,
}

/// Offer/answer state machine for one remote peer.
///
/// Inputs are handled one at a time. Remote candidates that arrive before
/// the remote description is applied are queued and applied, in arrival
/// order, right after it.
pub struct Negotiator {
    ctx: NegotiatorContext,
    peer: ParticipantId,
    role: Role,
    generation: u64,
    state: Arc<watch::Sender<NegotiationState>>,
    connection: Option<Box<dyn PeerConnection>>,
    remote_description_set: bool,
    pending_candidates: VecDeque<IceCandidate>,
    peer_events_tx: mpsc::UnboundedSender<PeerEvent>,
    peer_events_rx: mpsc::UnboundedReceiver<PeerEvent>,
}

impl Negotiator {
    pub fn new(ctx: NegotiatorContext, peer: ParticipantId, role: Role, generation: u64) -> Self {
        let (state, _) = watch::channel(NegotiationState::Idle);
        let (peer_events_tx, peer_events_rx) = mpsc::unbounded_channel();

        Self {
            ctx,
            peer,
            role,
            generation,
            state: Arc::new(state),
            connection: None,
            remote_description_set: false,
            pending_candidates: VecDeque::new(),
            peer_events_tx,
            peer_events_rx,
        }
    }

    pub fn peer(&self) -> &ParticipantId {
        &self.peer
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    pub fn subscribe(&self) -> watch::Receiver<NegotiationState> {
        self.state.subscribe()
    }

    pub(crate) fn state_sender(&self) -> Arc<watch::Sender<NegotiationState>> {
        self.state.clone()
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Starts and then processes inputs until closed. A closed inbox counts
    /// as `Close`. Once `cancel` turns true, or its sender is dropped, the
    /// step in progress is abandoned and the media session released.
    pub async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<NegotiatorInput>,
        mut cancel: watch::Receiver<bool>,
    ) {
        let mut next = Some(NegotiatorInput::Start);

        while !self.is_closed() {
            let input = match next.take() {
                Some(input) => input,
                None => tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel) => break,
                    input = inbox.recv() => input.unwrap_or(NegotiatorInput::Close),
                    Some(event) = self.peer_events_rx.recv() => NegotiatorInput::Peer(event),
                },
            };

            let interrupted = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => true,
                _ = self.handle(input) => false,
            };
            if interrupted {
                break;
            }
        }

        if !self.is_closed() && timeout(CLOSE_GRACE, self.close()).await.is_err() {
            warn!("Media session with {} did not close in time", self.peer);
            self.set_state(NegotiationState::Closed);
        }
        debug!("Negotiator for {} finished", self.peer);
    }

    /// Handles everything the media session has reported so far.
    pub async fn drain_peer_events(&mut self) {
        while let Ok(event) = self.peer_events_rx.try_recv() {
            self.handle(NegotiatorInput::Peer(event)).await;
        }
    }

    pub async fn handle(&mut self, input: NegotiatorInput) {
        if self.is_closed() {
            return;
        }

        let result = match input {
            NegotiatorInput::Start => self.start().await,
            NegotiatorInput::Signal(msg) => self.on_signal(msg).await,
            NegotiatorInput::Peer(event) => self.on_peer_event(event).await,
            NegotiatorInput::Close => {
                self.close().await;
                Ok(())
            }
        };

        if let Err(e) = result {
            self.fail(e).await;
        }
    }

    async fn start(&mut self) -> StepResult {
        if self.state() != NegotiationState::Idle {
            return Ok(());
        }
        self.ensure_connection().await?;

        match self.role {
            Role::Initiator => self.send_offer().await,
            Role::Responder => {
                self.set_state(NegotiationState::AwaitingOffer);
                Ok(())
            }
        }
    }

    async fn ensure_connection(&mut self) -> StepResult {
        if self.connection.is_some() {
            return Ok(());
        }
        let connection = self
            .ctx
            .factory
            .create(&self.peer, &self.ctx.local_media, self.peer_events_tx.clone())
            .await
            .map_err(|e| self.negotiation_error(e))?;
        self.connection = Some(connection);
        Ok(())
    }

    async fn send_offer(&mut self) -> StepResult {
        self.set_state(NegotiationState::Offering);

        let offer = self
            .connection()?
            .create_offer()
            .await
            .map_err(|e| self.negotiation_error(e))?;
        let msg = SignalMessage::offer(self.ctx.local.clone(), self.peer.clone(), &offer)?;
        self.ctx
            .signals
            .send(msg)
            .map_err(|e| self.negotiation_error(e))?;

        info!("Sent offer to {}", self.peer);
        self.set_state(NegotiationState::AwaitingAnswer);
        Ok(())
    }

    async fn on_signal(&mut self, msg: SignalMessage) -> StepResult {
        match msg {
            SignalMessage::Offer { .. } => self.on_offer(msg.payload()?).await,
            SignalMessage::Answer { .. } => self.on_answer(msg.payload()?).await,
            SignalMessage::IceCandidate { .. } => self.on_remote_candidate(msg.payload()?).await,
            other => {
                warn!("Negotiator for {} ignoring '{}'", self.peer, other.kind());
                Ok(())
            }
        }
    }

    async fn on_offer(&mut self, offer: SessionDescription) -> StepResult {
        if offer.sdp_type != SdpType::Offer {
            return Err(CallError::ProtocolViolation(format!(
                "offer from {} carries a {:?} description",
                self.peer, offer.sdp_type
            )));
        }

        match self.state() {
            NegotiationState::Idle
            | NegotiationState::AwaitingOffer
            | NegotiationState::Connected => {}
            state => {
                warn!("Discarding offer from {} while {}", self.peer, state);
                return Ok(());
            }
        }

        self.ensure_connection().await?;
        self.set_state(NegotiationState::Answering);

        self.connection()?
            .set_remote_description(offer)
            .await
            .map_err(|e| self.negotiation_error(e))?;
        self.remote_description_set = true;
        self.flush_candidates().await?;

        let answer = self
            .connection()?
            .create_answer()
            .await
            .map_err(|e| self.negotiation_error(e))?;
        let msg = SignalMessage::answer(self.ctx.local.clone(), self.peer.clone(), &answer)?;
        self.ctx
            .signals
            .send(msg)
            .map_err(|e| self.negotiation_error(e))?;

        info!("Answered offer from {}", self.peer);
        self.set_state(NegotiationState::Connected);
        Ok(())
    }

    async fn on_answer(&mut self, answer: SessionDescription) -> StepResult {
        if self.state() != NegotiationState::AwaitingAnswer {
            warn!("Discarding answer from {} while {}", self.peer, self.state());
            return Ok(());
        }
        if answer.sdp_type != SdpType::Answer {
            return Err(CallError::ProtocolViolation(format!(
                "answer from {} carries a {:?} description",
                self.peer, answer.sdp_type
            )));
        }

        self.connection()?
            .set_remote_description(answer)
            .await
            .map_err(|e| self.negotiation_error(e))?;
        self.remote_description_set = true;
        self.flush_candidates().await?;

        info!("Negotiation with {} complete", self.peer);
        self.set_state(NegotiationState::Connected);
        Ok(())
    }

    async fn on_remote_candidate(&mut self, candidate: IceCandidate) -> StepResult {
        if !self.remote_description_set {
            debug!("Queueing candidate from {} until the remote description is set", self.peer);
            self.pending_candidates.push_back(candidate);
            return Ok(());
        }
        self.apply_candidate(candidate).await
    }

    async fn flush_candidates(&mut self) -> StepResult {
        while let Some(candidate) = self.pending_candidates.pop_front() {
            self.apply_candidate(candidate).await?;
        }
        Ok(())
    }

    /// A candidate the media layer rejects is dropped; the others may still
    /// produce a path.
    async fn apply_candidate(&mut self, candidate: IceCandidate) -> StepResult {
        if let Err(e) = self.connection()?.add_ice_candidate(candidate).await {
            warn!("Failed to add ICE candidate from {}: {:#}", self.peer, e);
        }
        Ok(())
    }

    async fn on_peer_event(&mut self, event: PeerEvent) -> StepResult {
        match event {
            PeerEvent::LocalCandidate(candidate) => {
                let msg = SignalMessage::ice_candidate(
                    self.ctx.local.clone(),
                    self.peer.clone(),
                    &candidate,
                )?;
                if let Err(e) = self.ctx.signals.send(msg) {
                    warn!("Could not trickle candidate to {}: {}", self.peer, e);
                }
                Ok(())
            }
            PeerEvent::RemoteStream(stream) => {
                self.emit(NegotiatorEventKind::RemoteStream(stream));
                Ok(())
            }
            PeerEvent::Failed(reason) => Err(CallError::negotiation(&self.peer, reason)),
        }
    }

    async fn fail(&mut self, error: CallError) {
        warn!("Negotiation with {} failed: {}", self.peer, error);
        self.emit(NegotiatorEventKind::Failed(error));
        self.close().await;
    }

    /// Closes the media session. Calling it again does nothing.
    pub async fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.set_state(NegotiationState::Closed);
        self.pending_candidates.clear();
        self.remote_description_set = false;

        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                warn!("Error closing media session with {}: {:#}", self.peer, e);
            }
        }
        info!("Negotiator for {} closed", self.peer);
    }

    fn connection(&self) -> std::result::Result<&dyn PeerConnection, CallError> {
        self.connection
            .as_deref()
            .ok_or_else(|| CallError::negotiation(&self.peer, "no media session"))
    }

    fn negotiation_error(&self, e: impl std::fmt::Display) -> CallError {
        CallError::negotiation(&self.peer, format!("{:#}", e))
    }

    fn set_state(&self, next: NegotiationState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!("Negotiation with {}: {} -> {}", self.peer, prev, next);
        }
    }

    fn emit(&self, kind: NegotiatorEventKind) {
        let _ = self.ctx.events.send(NegotiatorEvent {
            peer: self.peer.clone(),
            generation: self.generation,
            kind,
        });
    }
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|cancelled| *cancelled).await;
}
