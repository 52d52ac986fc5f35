use crate::config::CoordinatorConfig;
use crate::room::{LocalConnector, RoomManager};
use crate::signaling::ws_handler;
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use tracing::info;

struct SignalingInner {
    rooms: RoomManager,
    config: CoordinatorConfig,
}

/// Shared state of the coordinator's HTTP surface.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new(config: CoordinatorConfig) -> Self {
        let config = config.sanitized();
        Self {
            inner: Arc::new(SignalingInner {
                rooms: RoomManager::new(config.room_command_capacity),
                config,
            }),
        }
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.inner.rooms
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// A connector that joins rooms of this coordinator without a socket.
    pub fn local_connector(&self) -> LocalConnector {
        LocalConnector::new(self.inner.rooms.clone())
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws/{room_id}/{participant_id}", get(ws_handler))
            .with_state(self.clone())
    }

    pub async fn serve(self) -> Result<()> {
        let addr = self.config().bind_addr;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("Signaling server listening on http://{}", addr);

        axum::serve(listener, self.router())
            .await
            .context("Signaling server stopped")?;
        Ok(())
    }
}
