use crate::media::{
    MediaSample, MediaStream, MediaTrack, PeerConnection, PeerEvent, PeerFactory, SampleSink,
    TrackKind,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use huddle_core::{IceCandidate, IceServerConfig, ParticipantId, SdpType, SessionDescription};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// Builds webrtc-rs peer connections.
#[derive(Debug, Clone, Default)]
pub struct WebrtcPeerFactory {
    ice_servers: Vec<IceServerConfig>,
}

impl WebrtcPeerFactory {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self { ice_servers }
    }

    fn rtc_configuration(&self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: self
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl PeerFactory for WebrtcPeerFactory {
    async fn create(
        &self,
        peer: &ParticipantId,
        local: &MediaStream,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Box<dyn PeerConnection>> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let peer_connection = Arc::new(api.new_peer_connection(self.rtc_configuration()).await?);

        let mut sinks = Vec::with_capacity(local.tracks().len());
        for track in local.tracks() {
            sinks.push(add_local_track(&peer_connection, local.id(), track).await?);
        }

        let state_tx = events.clone();
        let state_peer = peer.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let peer = state_peer.clone();

                Box::pin(async move {
                    info!("Peer connection state with {} changed: {}", peer, s);
                    if s == RTCPeerConnectionState::Failed {
                        let _ = tx.send(PeerEvent::Failed(format!("connection state {}", s)));
                    }
                })
            },
        ));

        let ice_tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                match candidate.to_json().map_err(anyhow::Error::from).and_then(to_candidate) {
                    Ok(candidate) => {
                        let _ = tx.send(PeerEvent::LocalCandidate(candidate));
                    }
                    Err(e) => warn!("Failed to encode local ICE candidate: {}", e),
                }
            })
        }));

        let remote = Arc::new(Mutex::new(MediaStream::new(peer.as_str())));
        let track_tx = events;
        let track_peer = peer.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                let remote = remote.clone();
                let peer = track_peer.clone();

                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        RTPCodecType::Video => TrackKind::Video,
                        _ => return,
                    };
                    debug!("Remote {:?} track {} from {}", kind, track.id(), peer);

                    let snapshot = match remote.lock() {
                        Ok(mut stream) => {
                            if !stream.add_track(MediaTrack::new(track.id(), kind)) {
                                return;
                            }
                            stream.clone()
                        }
                        Err(_) => return,
                    };
                    let _ = tx.send(PeerEvent::RemoteStream(snapshot));
                })
            },
        ));

        Ok(Box::new(WebrtcPeer {
            peer: peer.clone(),
            peer_connection,
            sinks: Mutex::new(sinks),
        }))
    }
}

/// Packetizes samples written to a local [`MediaTrack`] onto one
/// connection's RTP sender.
struct RtpSampleSink {
    track: Arc<TrackLocalStaticSample>,
}

#[async_trait]
impl SampleSink for RtpSampleSink {
    async fn write_sample(&self, sample: &MediaSample) -> Result<()> {
        self.track
            .write_sample(&Sample {
                data: sample.data.clone(),
                duration: sample.duration,
                timestamp: SystemTime::now(),
                ..Default::default()
            })
            .await
            .context("Failed to write sample")
    }
}

/// Adds `track` to the connection and attaches the sender to it, so muting
/// the track silences this connection too.
async fn add_local_track(
    peer_connection: &Arc<RTCPeerConnection>,
    stream_id: &str,
    track: &MediaTrack,
) -> Result<Arc<dyn SampleSink>> {
    let mime_type = match track.kind() {
        TrackKind::Audio => MIME_TYPE_OPUS,
        TrackKind::Video => MIME_TYPE_VP8,
    };
    let sample_track = Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: mime_type.to_owned(),
            ..Default::default()
        },
        track.id().to_owned(),
        stream_id.to_owned(),
    ));

    let rtp_sender = peer_connection
        .add_track(sample_track.clone() as Arc<dyn TrackLocal + Send + Sync>)
        .await
        .with_context(|| format!("Failed to add local track {}", track.id()))?;

    // RTCP has to be read for the interceptors to run.
    tokio::spawn(async move {
        let mut rtcp_buf = vec![0u8; 1500];
        while rtp_sender.read(&mut rtcp_buf).await.is_ok() {}
    });

    let sink: Arc<dyn SampleSink> = Arc::new(RtpSampleSink {
        track: sample_track,
    });
    track.attach(&sink);
    Ok(sink)
}

fn to_candidate(init: RTCIceCandidateInit) -> Result<IceCandidate> {
    Ok(serde_json::from_value(serde_json::to_value(&init)?)?)
}

fn to_candidate_init(candidate: &IceCandidate) -> Result<RTCIceCandidateInit> {
    serde_json::from_value(serde_json::to_value(candidate)?)
        .context("Failed to parse ICE candidate JSON")
}

struct WebrtcPeer {
    peer: ParticipantId,
    peer_connection: Arc<RTCPeerConnection>,
    sinks: Mutex<Vec<Arc<dyn SampleSink>>>,
}

#[async_trait]
impl PeerConnection for WebrtcPeer {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = match desc.sdp_type {
            SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
            SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
        };
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.peer_connection
            .add_ice_candidate(to_candidate_init(&candidate)?)
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing peer connection with {}", self.peer);
        if let Ok(mut sinks) = self.sinks.lock() {
            sinks.clear();
        }
        self.peer_connection.close().await?;
        Ok(())
    }
}
