use huddle_core::{CallError, Connector, Link, ParticipantId, Result, RoomId, SignalMessage};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Message(SignalMessage),
    /// The transport closed. Sent once, after the last message.
    Closed,
}

/// Anything outbound signaling can be written to.
pub trait SignalSink: Send + Sync + 'static {
    fn send(&self, msg: SignalMessage) -> Result<()>;
}

struct ChannelInner {
    state: ChannelState,
    outgoing: Option<mpsc::UnboundedSender<SignalMessage>>,
    reader: Option<JoinHandle<()>>,
}

/// The client's connection to the coordinator for one room.
#[derive(Clone)]
pub struct SignalingChannel {
    room: RoomId,
    participant: ParticipantId,
    inner: Arc<Mutex<ChannelInner>>,
}

impl SignalingChannel {
    pub fn new(room: RoomId, participant: ParticipantId) -> Self {
        Self {
            room,
            participant,
            inner: Arc::new(Mutex::new(ChannelInner {
                state: ChannelState::Connecting,
                outgoing: None,
                reader: None,
            })),
        }
    }

    /// Opens a channel and announces `join`.
    pub async fn connect(
        connector: &dyn Connector,
        room: RoomId,
        participant: ParticipantId,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ChannelEvent>)> {
        let channel = Self::new(room, participant);
        let events = channel.open(connector).await?;
        Ok((channel, events))
    }

    /// Opens the transport, sends `join` and starts delivering inbound
    /// messages, in arrival order, on the returned receiver.
    pub async fn open(&self, connector: &dyn Connector) -> Result<mpsc::UnboundedReceiver<ChannelEvent>> {
        if self.state() != ChannelState::Connecting {
            return Err(CallError::ChannelClosed);
        }

        let Link { outgoing, mut incoming } = connector.open(&self.room, &self.participant).await?;
        outgoing
            .send(SignalMessage::Join {
                from: self.participant.clone(),
            })
            .map_err(|_| CallError::ChannelClosed)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        if inner.state != ChannelState::Connecting {
            // Closed while the transport was opening.
            return Err(CallError::ChannelClosed);
        }

        let channel = self.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = incoming.recv().await {
                debug!("{} received '{}' from {}", channel.participant, msg.kind(), msg.sender());
                if events_tx.send(ChannelEvent::Message(msg)).is_err() {
                    break;
                }
            }
            channel.mark_closed();
            let _ = events_tx.send(ChannelEvent::Closed);
        });

        inner.state = ChannelState::Open;
        inner.outgoing = Some(outgoing);
        inner.reader = Some(reader);
        info!("{} joined room {}", self.participant, self.room);

        Ok(events_rx)
    }

    pub fn state(&self) -> ChannelState {
        self.lock().state
    }

    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Closes the transport. No further events are delivered.
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.state == ChannelState::Closed {
            return;
        }
        inner.state = ChannelState::Closed;
        inner.outgoing = None;
        if let Some(reader) = inner.reader.take() {
            reader.abort();
        }
        info!("{} closed signaling for room {}", self.participant, self.room);
    }

    fn mark_closed(&self) {
        let mut inner = self.lock();
        if inner.state != ChannelState::Closed {
            warn!("Signaling transport for {} closed by remote", self.participant);
        }
        inner.state = ChannelState::Closed;
        inner.outgoing = None;
        inner.reader = None;
    }

    fn lock(&self) -> MutexGuard<'_, ChannelInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SignalSink for SignalingChannel {
    /// Queues `msg` without waiting for the network.
    fn send(&self, msg: SignalMessage) -> Result<()> {
        let mut inner = self.lock();
        match inner.state {
            ChannelState::Connecting => Err(CallError::ChannelNotReady),
            ChannelState::Closed => Err(CallError::ChannelClosed),
            ChannelState::Open => {
                let sent = inner
                    .outgoing
                    .as_ref()
                    .is_some_and(|tx| tx.send(msg).is_ok());
                if sent {
                    Ok(())
                } else {
                    inner.state = ChannelState::Closed;
                    inner.outgoing = None;
                    Err(CallError::ChannelClosed)
                }
            }
        }
    }
}
