use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use huddle_core::{CallError, Connector, Link, ParticipantId, Result, RoomId, SignalMessage};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Opens signaling over a websocket at `{base_url}/{room}/{participant}`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    base_url: String,
}

impl WsConnector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn endpoint(&self, room: &RoomId, participant: &ParticipantId) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            room,
            participant
        )
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, room: &RoomId, participant: &ParticipantId) -> Result<Link> {
        let url = self.endpoint(room, participant);
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| CallError::Transport(format!("{}: {}", url, e)))?;
        info!("Connected to signaling at {}", url);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<SignalMessage>();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel::<SignalMessage>();

        tokio::spawn(async move {
            while let Some(msg) = outgoing_rx.recv().await {
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize signal message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = ws_sender.send(Message::Text(json)).await {
                    warn!("Failed to send signaling frame: {}", e);
                    return;
                }
            }
            let _ = ws_sender.send(Message::Close(None)).await;
        });

        let reader_peer = participant.clone();
        tokio::spawn(async move {
            // Pings are answered by tungstenite while reading.
            while let Some(frame) = ws_receiver.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<SignalMessage>(&text) {
                        Ok(msg) => {
                            if incoming_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid SignalMessage for {}: {}", reader_peer, e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Signaling read error for {}: {}", reader_peer, e);
                        break;
                    }
                }
            }
            debug!("Signaling socket for {} closed", reader_peer);
        });

        Ok(Link {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
        })
    }
}
