use anyhow::Result;
use huddle_client::{
    CallConfig, CallDeps, CallEvent, CallSession, NegotiationState, RecordingReporter, SyntheticDevices,
};
use huddle_core::{ParticipantId, RoomId};
use huddle_server::RoomManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{MockPeerFactory, SpyConnector};

/// Timeout for a single expected event (ms).
pub const EVENT_TIMEOUT_MS: u64 = 2000;

/// Window in which no event may arrive when quiet is expected (ms).
pub const QUIET_WINDOW_MS: u64 = 200;

/// A call participant wired to mocks and an in-process coordinator.
pub struct TestCaller {
    pub id: ParticipantId,
    pub session: CallSession,
    pub events: mpsc::UnboundedReceiver<CallEvent>,
    pub peers: MockPeerFactory,
    pub reporter: RecordingReporter,
}

impl TestCaller {
    pub fn new(connector: &SpyConnector, id: &str) -> Self {
        Self::with_devices(connector, id, SyntheticDevices::new(), CallConfig::default())
    }

    pub fn with_devices(
        connector: &SpyConnector,
        id: &str,
        devices: SyntheticDevices,
        config: CallConfig,
    ) -> Self {
        let peers = MockPeerFactory::new();
        let reporter = RecordingReporter::default();
        let deps = CallDeps {
            devices: Arc::new(devices),
            connector: Arc::new(connector.clone()),
            peers: Arc::new(peers.clone()),
            reporter: Arc::new(reporter.clone()),
        };
        let id = ParticipantId::from(id);
        let (session, events) = CallSession::new(config, id.clone(), deps);

        Self {
            id,
            session,
            events,
            peers,
            reporter,
        }
    }

    pub async fn start(&self, room: &str) -> huddle_core::Result<()> {
        self.session.start(RoomId::from(room)).await
    }

    pub async fn next_event(&mut self) -> Result<CallEvent> {
        match tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), self.events.recv()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => anyhow::bail!("{}: event stream closed", self.id),
            Err(_) => anyhow::bail!("{}: timeout waiting for call event", self.id),
        }
    }

    /// Skips events until one matches.
    pub async fn wait_for<F>(&mut self, mut matches: F) -> Result<CallEvent>
    where
        F: FnMut(&CallEvent) -> bool,
    {
        loop {
            let event = self.next_event().await?;
            if matches(&event) {
                return Ok(event);
            }
        }
    }

    pub async fn expect_quiet(&mut self) -> Result<()> {
        match tokio::time::timeout(Duration::from_millis(QUIET_WINDOW_MS), self.events.recv()).await {
            Ok(Some(event)) => anyhow::bail!("{}: unexpected event {:?}", self.id, event),
            _ => Ok(()),
        }
    }
}

/// Waits until the caller's negotiation with `peer` reaches `expected`,
/// including the time it takes for the negotiation to exist.
pub async fn wait_for_state(caller: &TestCaller, peer: &str, expected: NegotiationState) -> Result<()> {
    let peer = ParticipantId::from(peer);
    let deadline = tokio::time::Instant::now() + Duration::from_millis(EVENT_TIMEOUT_MS);

    let mut state = loop {
        if let Some(state) = caller.session.watch_negotiation(&peer).await {
            break state;
        }
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("{}: no negotiation with {}", caller.id, peer);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };

    tokio::time::timeout_at(deadline, state.wait_for(|s| *s == expected))
        .await
        .map_err(|_| anyhow::anyhow!("{}: {} never reached {:?}", caller.id, peer, expected))??;
    Ok(())
}

/// Waits until the coordinator lists `participant` in `room`.
pub async fn wait_for_member(rooms: &RoomManager, room: &str, participant: &str) -> Result<()> {
    let room = RoomId::from(room);
    let participant = ParticipantId::from(participant);
    let deadline = tokio::time::Instant::now() + Duration::from_millis(EVENT_TIMEOUT_MS);

    while !rooms.members(&room).await.contains(&participant) {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("{} never joined room {}", participant, room);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

/// Polls `condition` until it holds.
pub async fn wait_until<F>(what: &str, condition: F) -> Result<()>
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(EVENT_TIMEOUT_MS);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("timeout waiting until {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
