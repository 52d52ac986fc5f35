use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::warn;

/// Settings for the room coordinator and its WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub bind_addr: SocketAddr,
    /// Interval between heartbeat pings. Must stay below `pong_wait`.
    pub ping_period: Duration,
    /// A socket that stays silent this long is treated as disconnected.
    pub pong_wait: Duration,
    pub write_wait: Duration,
    pub room_command_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            ping_period: pong_wait * 9 / 10,
            pong_wait,
            write_wait: Duration::from_secs(10),
            room_command_capacity: 100,
        }
    }
}

impl CoordinatorConfig {
    /// Defaults overridden by `HUDDLE_BIND`, `HUDDLE_PING_SECS` and
    /// `HUDDLE_PONG_SECS`. Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(bind) = env::var("HUDDLE_BIND") {
            match bind.parse() {
                Ok(addr) => config.bind_addr = addr,
                Err(e) => warn!("Ignoring HUDDLE_BIND={}: {}", bind, e),
            }
        }
        if let Some(secs) = secs_var("HUDDLE_PONG_SECS") {
            config.pong_wait = Duration::from_secs(secs);
            config.ping_period = config.pong_wait * 9 / 10;
        }
        if let Some(secs) = secs_var("HUDDLE_PING_SECS") {
            config.ping_period = Duration::from_secs(secs);
        }

        config.sanitized()
    }

    /// Keeps the ping period strictly inside the pong window.
    pub fn sanitized(mut self) -> Self {
        if self.ping_period >= self.pong_wait {
            warn!(
                "ping period {:?} is not below pong wait {:?}; clamping",
                self.ping_period, self.pong_wait
            );
            self.ping_period = self.pong_wait * 9 / 10;
        }
        self.room_command_capacity = self.room_command_capacity.max(1);
        self
    }
}

fn secs_var(name: &str) -> Option<u64> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(secs) if secs > 0 => Some(secs),
        _ => {
            warn!("Ignoring {}={}", name, raw);
            None
        }
    }
}
