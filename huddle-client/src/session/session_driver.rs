use crate::channel::{ChannelEvent, SignalingChannel};
use crate::negotiator::{
    NegotiationState, Negotiator, NegotiatorContext, NegotiatorEvent, NegotiatorEventKind,
    NegotiatorHandle, Role,
};
use crate::session::CallEvent;
use futures::future::join_all;
use huddle_core::{CallError, ParticipantId, SignalMessage};
use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

pub(crate) enum DriverCommand {
    End,
    Peers {
        reply: oneshot::Sender<Vec<ParticipantId>>,
    },
    WatchNegotiation {
        peer: ParticipantId,
        reply: oneshot::Sender<Option<watch::Receiver<NegotiationState>>>,
    },
}

/// Event loop of an active call. Owns every negotiator; nothing else
/// touches them.
pub(crate) struct SessionDriver {
    channel: SignalingChannel,
    channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
    commands: mpsc::UnboundedReceiver<DriverCommand>,
    calls: mpsc::UnboundedSender<CallEvent>,
    context: NegotiatorContext,
    negotiator_events: mpsc::UnboundedReceiver<NegotiatorEvent>,
    on_terminated: Option<Box<dyn FnOnce() + Send>>,
    negotiators: HashMap<ParticipantId, NegotiatorHandle>,
    peers: Vec<ParticipantId>,
    departed: HashSet<ParticipantId>,
    next_generation: u64,
}

pub(crate) struct DriverParts {
    pub channel: SignalingChannel,
    pub channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
    pub commands: mpsc::UnboundedReceiver<DriverCommand>,
    pub calls: mpsc::UnboundedSender<CallEvent>,
    pub context: NegotiatorContext,
    pub negotiator_events: mpsc::UnboundedReceiver<NegotiatorEvent>,
    /// Runs once signaling is lost, before `Terminated` is emitted.
    pub on_terminated: Box<dyn FnOnce() + Send>,
}

impl SessionDriver {
    pub fn new(parts: DriverParts) -> Self {
        Self {
            channel: parts.channel,
            channel_events: parts.channel_events,
            commands: parts.commands,
            calls: parts.calls,
            context: parts.context,
            negotiator_events: parts.negotiator_events,
            on_terminated: Some(parts.on_terminated),
            negotiators: HashMap::new(),
            peers: Vec::new(),
            departed: HashSet::new(),
            next_generation: 0,
        }
    }

    pub async fn run(mut self) {
        info!("Call loop for {} started", self.context.local);

        loop {
            tokio::select! {
                biased;
                cmd = self.commands.recv() => match cmd {
                    Some(DriverCommand::End) | None => {
                        self.teardown().await;
                        break;
                    }
                    Some(DriverCommand::Peers { reply }) => {
                        let _ = reply.send(self.peers.clone());
                    }
                    Some(DriverCommand::WatchNegotiation { peer, reply }) => {
                        let _ = reply.send(self.negotiators.get(&peer).map(|h| h.watch_state()));
                    }
                },
                event = self.channel_events.recv() => match event {
                    Some(ChannelEvent::Message(msg)) => self.on_signal(msg),
                    Some(ChannelEvent::Closed) | None => {
                        warn!("Signaling lost for {}; ending call", self.context.local);
                        self.teardown().await;
                        if let Some(on_terminated) = self.on_terminated.take() {
                            on_terminated();
                        }
                        let _ = self.calls.send(CallEvent::Terminated(CallError::ChannelClosed));
                        break;
                    }
                },
                Some(event) = self.negotiator_events.recv() => self.on_negotiator_event(event),
            }
        }

        info!("Call loop for {} finished", self.context.local);
    }

    fn on_signal(&mut self, msg: SignalMessage) {
        let from = msg.sender().clone();
        if from == self.context.local {
            debug!("Ignoring '{}' about ourselves", msg.kind());
            return;
        }

        match msg {
            SignalMessage::PeerJoined { data, .. } => {
                let existing = data.is_some_and(|notice| notice.existing);
                self.on_peer_joined(from, Role::for_notice(existing));
            }
            SignalMessage::PeerLeft { .. } => self.on_peer_left(from),
            SignalMessage::Join { .. } => {
                warn!("Unexpected 'join' from {} on the client side", from);
            }
            unicast => self.on_unicast(from, unicast),
        }
    }

    fn on_peer_joined(&mut self, peer: ParticipantId, role: Role) {
        self.departed.remove(&peer);
        if self.negotiators.contains_key(&peer) {
            warn!("{} announced twice; keeping the running negotiator", peer);
            return;
        }

        info!("{} is in the call; negotiating as {:?}", peer, role);
        self.spawn_negotiator(peer.clone(), role);
        self.add_peer(peer);
    }

    fn on_peer_left(&mut self, peer: ParticipantId) {
        self.departed.insert(peer.clone());
        self.retire(&peer);

        if let Some(pos) = self.peers.iter().position(|p| p == &peer) {
            self.peers.remove(pos);
            info!("{} left the call", peer);
            let _ = self.calls.send(CallEvent::PeerLeft(peer));
        }
    }

    fn on_unicast(&mut self, from: ParticipantId, msg: SignalMessage) {
        if msg.recipient() != Some(&self.context.local) {
            warn!("Dropping '{}' from {} addressed to someone else", msg.kind(), from);
            return;
        }
        if self.departed.contains(&from) {
            debug!("Dropping '{}' from departed {}", msg.kind(), from);
            return;
        }

        if !self.negotiators.contains_key(&from) {
            match msg {
                // The offer beat the peer-joined notice, or negotiation
                // had failed and the peer is trying again.
                SignalMessage::Offer { .. } | SignalMessage::IceCandidate { .. } => {
                    self.spawn_negotiator(from.clone(), Role::Responder);
                    self.add_peer(from.clone());
                }
                _ => {
                    warn!("Discarding '{}' from {}: no negotiation in progress", msg.kind(), from);
                    return;
                }
            }
        }

        if let Some(handle) = self.negotiators.get(&from) {
            handle.deliver(msg);
        }
    }

    fn on_negotiator_event(&mut self, event: NegotiatorEvent) {
        let current = self
            .negotiators
            .get(&event.peer)
            .is_some_and(|h| h.generation() == event.generation);
        if !current {
            debug!("Dropping event from a retired negotiator for {}", event.peer);
            return;
        }

        match event.kind {
            NegotiatorEventKind::RemoteStream(stream) => {
                let _ = self.calls.send(CallEvent::RemoteStream {
                    peer: event.peer,
                    stream,
                });
            }
            NegotiatorEventKind::Failed(error) => {
                self.retire(&event.peer);
                let _ = self.calls.send(CallEvent::NegotiationFailed {
                    peer: event.peer,
                    error,
                });
            }
        }
    }

    fn spawn_negotiator(&mut self, peer: ParticipantId, role: Role) {
        self.next_generation += 1;
        let negotiator = Negotiator::new(self.context.clone(), peer.clone(), role, self.next_generation);
        self.negotiators
            .insert(peer, NegotiatorHandle::spawn(negotiator));
    }

    /// Drops the negotiator for `peer` without waiting for it; events it
    /// still emits fail the generation check.
    fn retire(&mut self, peer: &ParticipantId) {
        if let Some(handle) = self.negotiators.remove(peer) {
            handle.close();
        }
    }

    fn add_peer(&mut self, peer: ParticipantId) {
        if !self.peers.contains(&peer) {
            self.peers.push(peer.clone());
            let _ = self.calls.send(CallEvent::PeerJoined(peer));
        }
    }

    async fn teardown(&mut self) {
        let count = self.negotiators.len();
        join_all(self.negotiators.drain().map(|(_, handle)| handle.shutdown())).await;
        self.peers.clear();
        self.context.local_media.stop();
        self.channel.close();
        info!("Call torn down for {} ({} peers)", self.context.local, count);
    }
}
