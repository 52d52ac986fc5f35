use crate::config::MediaConstraints;
use crate::media::{MediaStream, MediaTrack, TrackKind};
use async_trait::async_trait;
use huddle_core::{CallError, Result};
use uuid::Uuid;

/// Source of local capture tracks.
#[async_trait]
pub trait MediaDevices: Send + Sync + 'static {
    /// Opens the devices `constraints` ask for. Fails with
    /// [`CallError::MediaAcquisitionFailed`] if any requested kind is
    /// unavailable or access is denied.
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream>;
}

/// Devices that hand out track handles without opening hardware. Used by
/// headless participants; whoever owns the tracks feeds them through
/// [`MediaTrack::write_sample`].
#[derive(Debug, Clone, Default)]
pub struct SyntheticDevices {
    pub has_microphone: bool,
    pub has_camera: bool,
}

impl SyntheticDevices {
    pub fn new() -> Self {
        Self {
            has_microphone: true,
            has_camera: true,
        }
    }
}

#[async_trait]
impl MediaDevices for SyntheticDevices {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream> {
        let mut stream = MediaStream::new(Uuid::new_v4().to_string());

        if constraints.audio {
            if !self.has_microphone {
                return Err(CallError::MediaAcquisitionFailed(
                    "no microphone available".to_owned(),
                ));
            }
            stream.add_track(MediaTrack::new(Uuid::new_v4().to_string(), TrackKind::Audio));
        }

        if constraints.video.is_some() {
            if !self.has_camera {
                return Err(CallError::MediaAcquisitionFailed(
                    "no camera available".to_owned(),
                ));
            }
            stream.add_track(MediaTrack::new(Uuid::new_v4().to_string(), TrackKind::Video));
        }

        if stream.is_empty() {
            return Err(CallError::MediaAcquisitionFailed(
                "constraints request no media".to_owned(),
            ));
        }

        Ok(stream)
    }
}
