use crate::appointment::{AppointmentReporter, AppointmentStatus, HttpAppointmentReporter, NoopReporter};
use crate::channel::{SignalingChannel, WsConnector};
use crate::config::CallConfig;
use crate::media::{MediaDevices, MediaStream, PeerFactory, SyntheticDevices, TrackKind, WebrtcPeerFactory};
use crate::negotiator::{NegotiationState, NegotiatorContext};
use crate::session::CallEvent;
use crate::session::session_driver::{DriverCommand, DriverParts, SessionDriver};
use huddle_core::{CallError, Connector, ParticipantId, Result, RoomId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// The collaborators a call talks to.
#[derive(Clone)]
pub struct CallDeps {
    pub devices: Arc<dyn MediaDevices>,
    pub connector: Arc<dyn Connector>,
    pub peers: Arc<dyn PeerFactory>,
    pub reporter: Arc<dyn AppointmentReporter>,
}

impl CallDeps {
    /// Websocket signaling, webrtc-rs media sessions and synthetic capture
    /// tracks. Appointment status goes to `config.api_base` when set.
    pub fn headless(config: &CallConfig) -> Self {
        let reporter: Arc<dyn AppointmentReporter> = match &config.api_base {
            Some(api_base) => Arc::new(HttpAppointmentReporter::new(
                api_base.clone(),
                config.api_token.clone(),
            )),
            None => Arc::new(NoopReporter),
        };

        Self {
            devices: Arc::new(SyntheticDevices::new()),
            connector: Arc::new(WsConnector::new(config.signaling_url.clone())),
            peers: Arc::new(WebrtcPeerFactory::new(config.ice_servers.clone())),
            reporter,
        }
    }
}

enum Phase {
    Idle,
    Starting,
    Active {
        commands: mpsc::UnboundedSender<DriverCommand>,
        driver: JoinHandle<()>,
    },
    Ended,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Starting => "starting",
            Phase::Active { .. } => "active",
            Phase::Ended => "ended",
        }
    }
}

struct SessionShared {
    config: CallConfig,
    participant: ParticipantId,
    deps: CallDeps,
    phase: Mutex<Phase>,
    ended: watch::Sender<bool>,
    local_media: Mutex<Option<MediaStream>>,
    audio_enabled: AtomicBool,
    video_enabled: AtomicBool,
    calls: mpsc::UnboundedSender<CallEvent>,
}

impl SessionShared {
    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Signaling was lost under an active call. The call loop has already
    /// torn everything down; only the phase is left to settle.
    fn terminate(&self) {
        let mut phase = self.phase();
        if matches!(*phase, Phase::Active { .. }) {
            *phase = Phase::Ended;
            self.ended.send_replace(true);
            info!("Call for {} terminated", self.participant);
        }
    }
}

/// One participant's side of a call.
///
/// `start` acquires local media, joins the room and spawns the call loop.
/// Events arrive on the receiver returned by [`CallSession::new`].
#[derive(Clone)]
pub struct CallSession {
    shared: Arc<SessionShared>,
}

impl CallSession {
    pub fn new(
        config: CallConfig,
        participant: ParticipantId,
        deps: CallDeps,
    ) -> (Self, mpsc::UnboundedReceiver<CallEvent>) {
        let (calls, events) = mpsc::unbounded_channel();
        let (ended, _) = watch::channel(false);

        let session = Self {
            shared: Arc::new(SessionShared {
                config,
                participant,
                deps,
                phase: Mutex::new(Phase::Idle),
                ended,
                local_media: Mutex::new(None),
                audio_enabled: AtomicBool::new(true),
                video_enabled: AtomicBool::new(true),
                calls,
            }),
        };
        (session, events)
    }

    pub fn participant(&self) -> &ParticipantId {
        &self.shared.participant
    }

    pub fn is_active(&self) -> bool {
        matches!(*self.phase(), Phase::Active { .. })
    }

    pub fn local_media(&self) -> Option<MediaStream> {
        self.media().clone()
    }

    /// Joins `room`. Local media is acquired first; if that fails nothing
    /// is sent to the coordinator.
    pub async fn start(&self, room: RoomId) -> Result<()> {
        {
            let mut phase = self.phase();
            match *phase {
                Phase::Idle => *phase = Phase::Starting,
                Phase::Ended => return Err(CallError::ChannelClosed),
                ref other => {
                    return Err(CallError::InvalidState(format!("already {}", other.name())));
                }
            }
        }

        match self.connect(room.clone()).await {
            Ok(()) => {
                info!("{} is in room {}", self.shared.participant, room);
                self.report(AppointmentStatus::InProgress).await;
                Ok(())
            }
            Err(e) => {
                self.release_media();
                let mut phase = self.phase();
                if matches!(*phase, Phase::Starting) {
                    *phase = Phase::Idle;
                }
                warn!("{} could not start the call: {}", self.shared.participant, e);
                Err(e)
            }
        }
    }

    async fn connect(&self, room: RoomId) -> Result<()> {
        let mut ended = self.shared.ended.subscribe();
        let deps = &self.shared.deps;

        let acquired = tokio::select! {
            media = deps.devices.acquire(&self.shared.config.constraints) => Some(media),
            _ = ended.wait_for(|ended| *ended) => None,
        };
        let media = acquired.ok_or(CallError::ChannelClosed)??;
        self.install_media(media.clone());

        let connecting = tokio::select! {
            opened = SignalingChannel::connect(
                deps.connector.as_ref(),
                room,
                self.shared.participant.clone(),
            ) => Some(opened),
            _ = ended.wait_for(|ended| *ended) => None,
        };
        let (channel, channel_events) = connecting.ok_or(CallError::ChannelClosed)??;

        let (negotiator_tx, negotiator_events) = mpsc::unbounded_channel();
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let driver = SessionDriver::new(DriverParts {
            channel: channel.clone(),
            channel_events,
            commands,
            calls: self.shared.calls.clone(),
            context: NegotiatorContext {
                local: self.shared.participant.clone(),
                local_media: media,
                factory: deps.peers.clone(),
                signals: Arc::new(channel.clone()),
                events: negotiator_tx,
            },
            negotiator_events,
            on_terminated: terminate_hook(Arc::downgrade(&self.shared)),
        });

        let mut phase = self.phase();
        if !matches!(*phase, Phase::Starting) {
            // end() ran while the channel was opening.
            channel.close();
            return Err(CallError::ChannelClosed);
        }
        *phase = Phase::Active {
            commands: commands_tx,
            driver: tokio::spawn(driver.run()),
        };
        Ok(())
    }

    /// Mutes or unmutes the local microphone. Affects every peer at once and
    /// sends nothing over signaling.
    pub fn toggle_local_audio(&self, enabled: bool) {
        self.toggle(TrackKind::Audio, enabled);
    }

    pub fn toggle_local_video(&self, enabled: bool) {
        self.toggle(TrackKind::Video, enabled);
    }

    pub fn is_audio_enabled(&self) -> bool {
        self.shared.audio_enabled.load(Ordering::Acquire)
    }

    pub fn is_video_enabled(&self) -> bool {
        self.shared.video_enabled.load(Ordering::Acquire)
    }

    fn toggle(&self, kind: TrackKind, enabled: bool) {
        let media = self.media();
        self.preference(kind).store(enabled, Ordering::Release);
        if let Some(stream) = media.as_ref() {
            stream.set_enabled(kind, enabled);
        }
        info!("{} set local {:?} enabled={}", self.shared.participant, kind, enabled);
    }

    /// Participants currently in the call, in the order they were learned.
    pub async fn peers(&self) -> Vec<ParticipantId> {
        let (reply, rx) = oneshot::channel();
        if !self.command(DriverCommand::Peers { reply }) {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn negotiation_state(&self, peer: &ParticipantId) -> Option<NegotiationState> {
        self.watch_negotiation(peer).await.map(|rx| *rx.borrow())
    }

    /// Follows the negotiation with `peer`. The receiver keeps the last state
    /// after the negotiator is gone.
    pub async fn watch_negotiation(
        &self,
        peer: &ParticipantId,
    ) -> Option<watch::Receiver<NegotiationState>> {
        let (reply, rx) = oneshot::channel();
        if !self.command(DriverCommand::WatchNegotiation {
            peer: peer.clone(),
            reply,
        }) {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Leaves the call: closes every negotiator, stops local media and closes
    /// signaling. Emits no events. Later calls do nothing.
    pub async fn end(&self) {
        let previous = std::mem::replace(&mut *self.phase(), Phase::Ended);
        self.shared.ended.send_replace(true);

        match previous {
            Phase::Ended => return,
            Phase::Idle => {}
            Phase::Starting => self.release_media(),
            Phase::Active { commands, driver } => {
                let _ = commands.send(DriverCommand::End);
                if let Err(e) = driver.await {
                    warn!("Call loop for {} ended abnormally: {}", self.shared.participant, e);
                }
                self.release_media();
                self.report(AppointmentStatus::Completed).await;
            }
        }

        info!("{} ended the call", self.shared.participant);
    }

    fn command(&self, cmd: DriverCommand) -> bool {
        match &*self.phase() {
            Phase::Active { commands, .. } => commands.send(cmd).is_ok(),
            _ => false,
        }
    }

    fn install_media(&self, stream: MediaStream) {
        let mut media = self.media();
        stream.set_enabled(TrackKind::Audio, self.is_audio_enabled());
        stream.set_enabled(TrackKind::Video, self.is_video_enabled());
        *media = Some(stream);
    }

    fn release_media(&self) {
        if let Some(stream) = self.media().as_ref() {
            stream.stop();
        }
    }

    async fn report(&self, status: AppointmentStatus) {
        let Some(appointment_id) = self.shared.config.appointment_id.as_deref() else {
            return;
        };
        if let Err(e) = self.shared.deps.reporter.report(appointment_id, status).await {
            warn!("Failed to update appointment {}: {:#}", appointment_id, e);
        }
    }

    fn preference(&self, kind: TrackKind) -> &AtomicBool {
        match kind {
            TrackKind::Audio => &self.shared.audio_enabled,
            TrackKind::Video => &self.shared.video_enabled,
        }
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.shared.phase()
    }

    fn media(&self) -> MutexGuard<'_, Option<MediaStream>> {
        self.shared
            .local_media
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn terminate_hook(shared: Weak<SessionShared>) -> Box<dyn FnOnce() + Send> {
    Box::new(move || {
        if let Some(shared) = shared.upgrade() {
            shared.terminate();
        }
    })
}
