use crate::signaling::{SignalingService, SignalingSession};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use huddle_core::{ParticipantId, RoomId, SignalMessage};
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at, timeout};
use tracing::{error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path((room_id, participant)): Path<(String, String)>,
    State(service): State<SignalingService>,
) -> impl IntoResponse {
    let room_id = RoomId::from(room_id);
    let participant = ParticipantId::from(participant);

    ws.on_upgrade(move |socket| handle_socket(socket, room_id, participant, service))
}

async fn handle_socket(
    socket: WebSocket,
    room_id: RoomId,
    participant: ParticipantId,
    service: SignalingService,
) {
    info!("New WebSocket connection: {} in room {}", participant, room_id);

    let config = service.config();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<SignalMessage>();

    let mut session = SignalingSession::new(
        service.rooms().clone(),
        room_id,
        participant.clone(),
        tx,
    );

    let ping_period = config.ping_period;
    let write_wait = config.write_wait;
    let send_peer = participant.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = interval_at(Instant::now() + ping_period, ping_period);

        loop {
            let frame = tokio::select! {
                msg = rx.recv() => match msg {
                    Some(msg) => match serde_json::to_string(&msg) {
                        Ok(json) => Message::Text(json.into()),
                        Err(e) => {
                            error!("Failed to serialize signal message: {}", e);
                            continue;
                        }
                    },
                    None => Message::Close(None),
                },
                _ = heartbeat.tick() => Message::Ping(Default::default()),
            };

            let closing = matches!(frame, Message::Close(_));
            match timeout(write_wait, sender.send(frame)).await {
                Ok(Ok(())) if !closing => {}
                Ok(Ok(())) => break,
                Ok(Err(e)) => {
                    warn!("Failed to send WS message to {}: {}", send_peer, e);
                    break;
                }
                Err(_) => {
                    warn!("Write to {} timed out", send_peer);
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut send_task => break,
            frame = timeout(config.pong_wait, receiver.next()) => {
                let msg = match frame {
                    Ok(Some(Ok(msg))) => msg,
                    Ok(Some(Err(e))) => {
                        warn!("WebSocket read error from {}: {}", participant, e);
                        break;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        warn!("Heartbeat timeout for {}", participant);
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => match serde_json::from_str::<SignalMessage>(&text) {
                        Ok(signal) => session.accept(signal).await,
                        Err(e) => warn!("Invalid SignalMessage from {}: {}", participant, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    send_task.abort();
    session.finish().await;
    info!("WebSocket disconnected: {}", participant);
}
