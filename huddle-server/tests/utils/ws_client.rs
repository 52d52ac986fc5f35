use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use huddle_core::SignalMessage;
use huddle_server::{CoordinatorConfig, SignalingService};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::signal_helpers::SIGNAL_TIMEOUT_MS;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serves `service` on an ephemeral local port.
pub async fn spawn_ws_server(config: CoordinatorConfig) -> Result<(SignalingService, SocketAddr)> {
    let service = SignalingService::new(config);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let router = service.router();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    Ok((service, addr))
}

pub async fn ws_connect(addr: SocketAddr, room: &str, participant: &str) -> Result<WsStream> {
    let url = format!("ws://{}/ws/{}/{}", addr, room, participant);
    let (stream, _) = connect_async(url.as_str())
        .await
        .context("WebSocket handshake failed")?;
    Ok(stream)
}

pub async fn ws_send(stream: &mut WsStream, msg: &SignalMessage) -> Result<()> {
    let json = serde_json::to_string(msg)?;
    stream.send(Message::Text(json)).await?;
    Ok(())
}

/// Next signaling frame, skipping control frames.
pub async fn ws_recv(stream: &mut WsStream) -> Result<SignalMessage> {
    let deadline = Duration::from_millis(SIGNAL_TIMEOUT_MS);
    loop {
        let frame = tokio::time::timeout(deadline, stream.next())
            .await
            .context("timeout waiting for frame")?
            .context("socket closed")??;

        if let Message::Text(text) = frame {
            return Ok(serde_json::from_str(&text)?);
        }
    }
}
