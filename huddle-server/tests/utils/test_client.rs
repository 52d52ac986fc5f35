use anyhow::{Context, Result};
use huddle_core::{Connector, Link, ParticipantId, RoomId, SignalMessage};
use huddle_server::{LocalConnector, RoomManager};
use std::time::Duration;
use tokio::sync::mpsc;

use super::signal_helpers::{SIGNAL_TIMEOUT_MS, SILENCE_WINDOW_MS, wait_for_member};

/// A participant speaking raw signaling to an in-process coordinator.
pub struct TestParticipant {
    pub id: ParticipantId,
    outgoing: Option<mpsc::UnboundedSender<SignalMessage>>,
    incoming: mpsc::UnboundedReceiver<SignalMessage>,
}

impl TestParticipant {
    /// Opens a transport without announcing `join`.
    pub async fn connect(rooms: &RoomManager, room: &str, id: &str) -> Result<Self> {
        let id = ParticipantId::from(id);
        let Link { outgoing, incoming } = LocalConnector::new(rooms.clone())
            .open(&RoomId::from(room), &id)
            .await?;

        Ok(Self {
            id,
            outgoing: Some(outgoing),
            incoming,
        })
    }

    /// Opens a transport, announces `join` and waits until the room has it.
    pub async fn join(rooms: &RoomManager, room: &str, id: &str) -> Result<Self> {
        let client = Self::connect(rooms, room, id).await?;
        client.send(SignalMessage::Join {
            from: client.id.clone(),
        })?;
        wait_for_member(rooms, room, &client.id).await?;
        Ok(client)
    }

    pub fn send(&self, msg: SignalMessage) -> Result<()> {
        self.outgoing
            .as_ref()
            .context("transport already dropped")?
            .send(msg)
            .context("coordinator side is gone")?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<SignalMessage> {
        match tokio::time::timeout(
            Duration::from_millis(SIGNAL_TIMEOUT_MS),
            self.incoming.recv(),
        )
        .await
        {
            Ok(Some(msg)) => Ok(msg),
            Ok(None) => anyhow::bail!("{}: transport closed", self.id),
            Err(_) => anyhow::bail!("{}: timeout waiting for signal", self.id),
        }
    }

    /// Asserts that nothing arrives for a short while.
    pub async fn expect_silence(&mut self) -> Result<()> {
        match tokio::time::timeout(
            Duration::from_millis(SILENCE_WINDOW_MS),
            self.incoming.recv(),
        )
        .await
        {
            Err(_) => Ok(()),
            Ok(Some(msg)) => anyhow::bail!("{}: unexpected {:?}", self.id, msg),
            Ok(None) => anyhow::bail!("{}: transport closed", self.id),
        }
    }

    /// Waits for the coordinator to close this participant's transport.
    pub async fn expect_closed(&mut self) -> Result<()> {
        loop {
            match tokio::time::timeout(
                Duration::from_millis(SIGNAL_TIMEOUT_MS),
                self.incoming.recv(),
            )
            .await
            {
                Ok(None) => return Ok(()),
                Ok(Some(_)) => continue,
                Err(_) => anyhow::bail!("{}: transport never closed", self.id),
            }
        }
    }

    /// Simulates an abrupt network drop.
    pub fn drop_transport(&mut self) {
        self.outgoing = None;
    }
}
