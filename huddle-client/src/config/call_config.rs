use huddle_core::IceServerConfig;
use std::env;

pub const DEFAULT_SIGNALING_URL: &str = "ws://localhost:3000/ws";

/// Capture settings for the local camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub facing_mode: String,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            facing_mode: "user".to_owned(),
        }
    }
}

/// What local media a call asks for. `video: None` means audio-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: Option<VideoConstraints>,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: Some(VideoConstraints::default()),
        }
    }
}

impl MediaConstraints {
    pub fn audio_only() -> Self {
        Self {
            audio: true,
            video: None,
        }
    }
}

/// Settings for one call participant.
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// Base websocket URL; the room and participant ids are appended as
    /// path segments.
    pub signaling_url: String,
    pub ice_servers: Vec<IceServerConfig>,
    pub constraints: MediaConstraints,
    /// Appointment whose status is reported as the call starts and ends.
    pub appointment_id: Option<String>,
    pub api_base: Option<String>,
    pub api_token: Option<String>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            signaling_url: DEFAULT_SIGNALING_URL.to_owned(),
            ice_servers: default_ice_servers(),
            constraints: MediaConstraints::default(),
            appointment_id: None,
            api_base: None,
            api_token: None,
        }
    }
}

impl CallConfig {
    /// Reads `HUDDLE_SIGNALING_URL`, `TURN_URL`, `TURN_USERNAME`,
    /// `TURN_CREDENTIAL`, `HUDDLE_APPOINTMENT_ID`, `HUDDLE_API_URL` and
    /// `HUDDLE_API_TOKEN`. Missing variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(url) = non_empty_var("HUDDLE_SIGNALING_URL") {
            config.signaling_url = url;
        }
        if let Some(turn) = turn_server_from_env() {
            config.ice_servers.push(turn);
        }
        config.appointment_id = non_empty_var("HUDDLE_APPOINTMENT_ID");
        config.api_base = non_empty_var("HUDDLE_API_URL");
        config.api_token = non_empty_var("HUDDLE_API_TOKEN");

        config
    }

    /// Websocket URL for `participant` in `room`.
    pub fn signaling_endpoint(&self, room: &str, participant: &str) -> String {
        format!(
            "{}/{}/{}",
            self.signaling_url.trim_end_matches('/'),
            room,
            participant
        )
    }
}

pub fn default_ice_servers() -> Vec<IceServerConfig> {
    vec![IceServerConfig {
        urls: vec![
            "stun:stun1.l.google.com:19302".to_owned(),
            "stun:stun2.l.google.com:19302".to_owned(),
        ],
        username: None,
        credential: None,
    }]
}

fn turn_server_from_env() -> Option<IceServerConfig> {
    let url = non_empty_var("TURN_URL")?;
    Some(IceServerConfig {
        urls: vec![url],
        username: non_empty_var("TURN_USERNAME"),
        credential: non_empty_var("TURN_CREDENTIAL"),
    })
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
