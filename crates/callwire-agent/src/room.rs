use crate::audio::AudioFrame;
use crate::error::AgentError;
use crate::media::MediaBridge;
use async_trait::async_trait;
use callwire_sip::twirp::http_base_url;
use callwire_sip::LiveKitConfig;
use livekit_api::access_token::{AccessToken, VideoGrants};
use livekit_api::services::room::RoomClient;
use livekit_protocol::ParticipantInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

/// Capacity of the per-room audio broadcast channels.
const AUDIO_BROADCAST_CAPACITY: usize = 256;

/// The remote party an agent talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteParticipant {
    pub sid: String,
    pub identity: String,
    pub name: String,
}

/// Audio in and out of a room, as seen by a session.
#[async_trait]
pub trait RoomIo: Send + Sync {
    fn name(&self) -> &str;

    /// Remote audio, resampled to the pipeline format by the media bridge.
    fn subscribe_audio(&self) -> broadcast::Receiver<AudioFrame>;

    async fn publish_audio(&self, frame: AudioFrame) -> Result<(), AgentError>;
}

/// Handle on one dispatched job.
#[async_trait]
pub trait JobContext: Send + Sync {
    fn room(&self) -> Arc<dyn RoomIo>;

    async fn connect(&self) -> Result<(), AgentError>;

    async fn wait_for_participant(&self) -> Result<RemoteParticipant, AgentError>;
}

/// The session side of a room's media.
///
/// Inbound frames arrive through [`LiveKitRoom::ingest_audio`]; frames the
/// agent publishes are fanned out to [`LiveKitRoom::subscribe_outbound`],
/// which [`MediaBridge`] drains into the agent's WebRTC track.
#[derive(Debug)]
pub struct LiveKitRoom {
    name: String,
    inbound_tx: broadcast::Sender<AudioFrame>,
    outbound_tx: broadcast::Sender<AudioFrame>,
    connected: AtomicBool,
}

impl LiveKitRoom {
    pub fn new(name: impl Into<String>) -> Self {
        let (inbound_tx, _) = broadcast::channel(AUDIO_BROADCAST_CAPACITY);
        let (outbound_tx, _) = broadcast::channel(AUDIO_BROADCAST_CAPACITY);
        Self {
            name: name.into(),
            inbound_tx,
            outbound_tx,
            connected: AtomicBool::new(false),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Delivers remote audio to every subscribed session.
    pub fn ingest_audio(&self, frame: AudioFrame) {
        let _ = self.inbound_tx.send(frame);
    }

    /// Audio published by the agent, for the media bridge to send out.
    pub fn subscribe_outbound(&self) -> broadcast::Receiver<AudioFrame> {
        self.outbound_tx.subscribe()
    }
}

#[async_trait]
impl RoomIo for LiveKitRoom {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribe_audio(&self) -> broadcast::Receiver<AudioFrame> {
        self.inbound_tx.subscribe()
    }

    async fn publish_audio(&self, frame: AudioFrame) -> Result<(), AgentError> {
        if !self.is_connected() {
            return Err(AgentError::RoomService(
                "Agent is not connected to a room".to_string(),
            ));
        }

        debug!(
            room = %self.name,
            audio_ms = frame.duration().as_millis() as u64,
            "publishing agent audio"
        );
        self.outbound_tx.send(frame).map_err(|_| {
            AgentError::Media(format!("no media sink is attached to room '{}'", self.name))
        })?;
        Ok(())
    }
}

/// First participant that is not the agent itself.
fn remote_party(
    participants: Vec<ParticipantInfo>,
    agent_identity: &str,
) -> Option<RemoteParticipant> {
    participants
        .into_iter()
        .find(|p| p.identity != agent_identity)
        .map(|p| RemoteParticipant {
            sid: p.sid,
            identity: p.identity,
            name: p.name,
        })
}

/// Job backed by the LiveKit room service.
#[derive(Debug)]
pub struct LiveKitJob {
    config: LiveKitConfig,
    room_client: RoomClient,
    room: Arc<LiveKitRoom>,
    identity: String,
    name: String,
    participant_timeout: Option<Duration>,
    poll_interval: Duration,
    join_token: Mutex<Option<String>>,
    media: Mutex<Option<MediaBridge>>,
}

impl LiveKitJob {
    pub fn new(
        config: LiveKitConfig,
        room_name: &str,
        identity: &str,
        name: &str,
        participant_timeout: Option<Duration>,
        poll_interval: Duration,
    ) -> Self {
        let room_client = RoomClient::with_api_key(
            &http_base_url(&config.url),
            &config.api_key,
            &config.api_secret,
        );
        Self {
            config,
            room_client,
            room: Arc::new(LiveKitRoom::new(room_name)),
            identity: identity.to_string(),
            name: name.to_string(),
            participant_timeout,
            poll_interval,
            join_token: Mutex::new(None),
            media: Mutex::new(None),
        }
    }

    pub fn livekit_room(&self) -> Arc<LiveKitRoom> {
        self.room.clone()
    }

    /// Token the agent joined the room with; set by `connect`.
    pub async fn join_token(&self) -> Option<String> {
        self.join_token.lock().await.clone()
    }

    pub fn generate_join_token(&self) -> Result<String, AgentError> {
        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(&self.identity)
            .with_name(&self.name)
            .with_grants(VideoGrants {
                room_join: true,
                room: self.room.name().to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        token.to_jwt().map_err(AgentError::Token)
    }

    async fn room_exists(&self) -> Result<bool, AgentError> {
        let rooms = self
            .room_client
            .list_rooms(vec![self.room.name().to_string()])
            .await
            .map_err(|e| AgentError::RoomService(e.to_string()))?;
        Ok(rooms.iter().any(|room| room.name == self.room.name()))
    }

    async fn poll_participant(&self) -> Result<RemoteParticipant, AgentError> {
        loop {
            let participants = self
                .room_client
                .list_participants(self.room.name())
                .await
                .map_err(|e| AgentError::RoomService(e.to_string()))?;

            if let Some(participant) = remote_party(participants, &self.identity) {
                return Ok(participant);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Returns once the room has been deleted, e.g. after the callee hung up.
    pub async fn wait_until_room_closed(&self) -> Result<(), AgentError> {
        while self.room_exists().await? {
            tokio::time::sleep(self.poll_interval).await;
        }
        info!(room = %self.room.name(), "room closed");
        Ok(())
    }

    /// Leaves the room's media, if joined. Safe to call more than once.
    pub async fn disconnect(&self) {
        self.room.set_connected(false);
        if let Some(media) = self.media.lock().await.take() {
            media.close().await;
        }
    }
}

#[async_trait]
impl JobContext for LiveKitJob {
    fn room(&self) -> Arc<dyn RoomIo> {
        self.room.clone()
    }

    async fn connect(&self) -> Result<(), AgentError> {
        let token = self.generate_join_token()?;
        if !self.room_exists().await? {
            return Err(AgentError::RoomService(format!(
                "room '{}' does not exist",
                self.room.name()
            )));
        }

        let media = MediaBridge::join(&self.config.url, &token, self.room.clone()).await?;
        *self.media.lock().await = Some(media);
        *self.join_token.lock().await = Some(token);
        self.room.set_connected(true);
        info!(room = %self.room.name(), identity = %self.identity, "agent joined room");
        Ok(())
    }

    async fn wait_for_participant(&self) -> Result<RemoteParticipant, AgentError> {
        let participant = match self.participant_timeout {
            Some(after) => tokio::time::timeout(after, self.poll_participant())
                .await
                .map_err(|_| AgentError::Timeout {
                    after,
                    what: "a participant to join",
                })??,
            None => self.poll_participant().await?,
        };

        info!(
            room = %self.room.name(),
            participant = %participant.identity,
            "participant joined"
        );
        Ok(participant)
    }
}
