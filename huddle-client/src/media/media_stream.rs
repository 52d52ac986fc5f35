use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// One encoded frame of a local track.
#[derive(Debug, Clone)]
pub struct MediaSample {
    pub data: Bytes,
    pub duration: Duration,
}

/// Where a local track's samples go; one per peer connection sending it.
#[async_trait]
pub trait SampleSink: Send + Sync + 'static {
    async fn write_sample(&self, sample: &MediaSample) -> Result<()>;
}

struct TrackState {
    id: String,
    kind: TrackKind,
    enabled: AtomicBool,
    stopped: AtomicBool,
    sinks: Mutex<Vec<Weak<dyn SampleSink>>>,
}

impl fmt::Debug for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackState")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

/// Handle to one media track. Clones share state: disabling a local track
/// mutes it in every peer connection that sends it, without renegotiation.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    state: Arc<TrackState>,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            state: Arc::new(TrackState {
                id: id.into(),
                kind,
                enabled: AtomicBool::new(true),
                stopped: AtomicBool::new(false),
                sinks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.state.id
    }

    pub fn kind(&self) -> TrackKind {
        self.state.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.enabled.store(enabled, Ordering::Release);
    }

    /// Releases the underlying device. A stopped track stays stopped.
    pub fn stop(&self) {
        self.state.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::Acquire)
    }

    /// Feeds every later sample to `sink` until the sink is dropped.
    pub fn attach(&self, sink: &Arc<dyn SampleSink>) {
        let mut sinks = self.sinks();
        sinks.retain(|s| s.strong_count() > 0);
        sinks.push(Arc::downgrade(sink));
    }

    pub fn sink_count(&self) -> usize {
        self.sinks().iter().filter(|s| s.strong_count() > 0).count()
    }

    /// Writes `sample` to every attached sink and returns how many took it.
    /// A disabled or stopped track writes nothing.
    pub async fn write_sample(&self, sample: &MediaSample) -> usize {
        if !self.is_enabled() || self.is_stopped() {
            return 0;
        }

        let sinks: Vec<Arc<dyn SampleSink>> = self.sinks().iter().filter_map(Weak::upgrade).collect();
        let mut written = 0;
        for sink in sinks {
            match sink.write_sample(sample).await {
                Ok(()) => written += 1,
                Err(e) => warn!("Failed to write sample of track {}: {:#}", self.id(), e),
            }
        }
        written
    }

    fn sinks(&self) -> MutexGuard<'_, Vec<Weak<dyn SampleSink>>> {
        self.state
            .sinks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// An ordered set of tracks, local or received from one peer.
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tracks: Vec::new(),
        }
    }

    pub fn with_track(mut self, track: MediaTrack) -> Self {
        self.add_track(track);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Adds `track` unless a track with the same id is already present.
    pub fn add_track(&mut self, track: MediaTrack) -> bool {
        if self.tracks.iter().any(|t| t.id() == track.id()) {
            return false;
        }
        self.tracks.push(track);
        true
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(move |t| t.kind() == kind)
    }

    pub fn has(&self, kind: TrackKind) -> bool {
        self.tracks_of(kind).next().is_some()
    }

    pub fn set_enabled(&self, kind: TrackKind, enabled: bool) {
        for track in self.tracks_of(kind) {
            track.set_enabled(enabled);
        }
    }

    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
