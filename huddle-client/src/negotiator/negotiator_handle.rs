use crate::negotiator::{NegotiationState, Negotiator, NegotiatorInput};
use huddle_core::{ParticipantId, SignalMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::warn;

/// How long a negotiator gets to release its media session once asked to
/// close.
pub const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// A negotiator running on its own task.
///
/// Dropping the handle closes the negotiator as well.
pub struct NegotiatorHandle {
    peer: ParticipantId,
    generation: u64,
    inbox: mpsc::UnboundedSender<NegotiatorInput>,
    cancel: watch::Sender<bool>,
    state: Arc<watch::Sender<NegotiationState>>,
    task: JoinHandle<()>,
}

impl NegotiatorHandle {
    pub fn spawn(negotiator: Negotiator) -> Self {
        let (inbox, inbox_rx) = mpsc::unbounded_channel();
        let (cancel, cancel_rx) = watch::channel(false);
        let peer = negotiator.peer().clone();
        let generation = negotiator.generation();
        let state = negotiator.state_sender();
        let task = tokio::spawn(negotiator.run(inbox_rx, cancel_rx));

        Self {
            peer,
            generation,
            inbox,
            cancel,
            state,
            task,
        }
    }

    pub fn peer(&self) -> &ParticipantId {
        &self.peer
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<NegotiationState> {
        self.state.subscribe()
    }

    /// Queues a signaling message without waiting for it to be handled.
    pub fn deliver(&self, msg: SignalMessage) {
        if self.inbox.send(NegotiatorInput::Signal(msg)).is_err() {
            warn!("Negotiator for {} is gone; dropping message", self.peer);
        }
    }

    /// Asks the negotiator to close and returns at once. A step in progress
    /// is abandoned; the media session is released on the negotiator's task.
    pub fn close(&self) {
        self.cancel.send_replace(true);
    }

    /// Closes the negotiator and waits, at most [`CLOSE_GRACE`], until its
    /// media session is released.
    pub async fn shutdown(self) {
        self.close();

        let mut task = self.task;
        if timeout(CLOSE_GRACE, &mut task).await.is_err() {
            warn!("Negotiator for {} did not stop in time; aborting", self.peer);
            task.abort();
            self.state.send_replace(NegotiationState::Closed);
        }
    }
}
