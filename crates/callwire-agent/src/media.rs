//! WebRTC media for an agent job.
//!
//! [`MediaBridge`] joins the LiveKit room as the agent participant, publishes
//! one microphone track fed from [`LiveKitRoom::subscribe_outbound`], and
//! forwards every subscribed remote audio track into
//! [`LiveKitRoom::ingest_audio`] at the pipeline format.

use crate::audio::{AudioFrame, PIPELINE_SAMPLE_RATE};
use crate::error::AgentError;
use crate::room::{LiveKitRoom, RoomIo};
use futures_util::StreamExt;
use livekit::options::TrackPublishOptions;
use livekit::prelude::{
    LocalAudioTrack, LocalTrack, RemoteTrack, Room, RoomEvent, RoomOptions, TrackSource,
};
use livekit::webrtc::audio_frame::AudioFrame as RtcAudioFrame;
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::audio_source::{AudioSourceOptions, RtcAudioSource};
use livekit::webrtc::audio_stream::native::NativeAudioStream;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const AGENT_TRACK_NAME: &str = "agent-voice";

/// Audio buffered by the native source ahead of the WebRTC encoder.
const SOURCE_QUEUE_MS: u32 = 1000;

/// WebRTC consumes audio in 10 ms frames.
const FRAMES_PER_SECOND: u32 = 100;

/// A live connection between a LiveKit room and a [`LiveKitRoom`] endpoint.
pub struct MediaBridge {
    room_name: String,
    room: Room,
    tasks: JoinSet<()>,
}

impl fmt::Debug for MediaBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaBridge")
            .field("room", &self.room_name)
            .finish_non_exhaustive()
    }
}

impl MediaBridge {
    /// Connects to `url` with `token` and starts moving audio both ways.
    ///
    /// The outbound subscription is taken before this returns, so agent audio
    /// published afterwards always has a sink.
    pub async fn join(
        url: &str,
        token: &str,
        endpoint: Arc<LiveKitRoom>,
    ) -> Result<Self, AgentError> {
        let room_name = endpoint.name().to_string();
        let (room, events) = Room::connect(url, token, RoomOptions::default())
            .await
            .map_err(|e| AgentError::Media(format!("failed to join '{}': {}", room_name, e)))?;

        let source = NativeAudioSource::new(
            AudioSourceOptions::default(),
            PIPELINE_SAMPLE_RATE,
            1,
            SOURCE_QUEUE_MS,
        );
        let track = LocalAudioTrack::create_audio_track(
            AGENT_TRACK_NAME,
            RtcAudioSource::Native(source.clone()),
        );
        room.local_participant()
            .publish_track(
                LocalTrack::Audio(track),
                TrackPublishOptions {
                    source: TrackSource::Microphone,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| AgentError::Media(format!("failed to publish agent track: {}", e)))?;

        let mut tasks = JoinSet::new();
        tasks.spawn(send_agent_audio(
            endpoint.subscribe_outbound(),
            source,
            room_name.clone(),
        ));
        tasks.spawn(receive_remote_audio(events, endpoint));

        info!(room = %room_name, "media connected");
        Ok(Self {
            room_name,
            room,
            tasks,
        })
    }

    /// Stops forwarding and leaves the room.
    pub async fn close(mut self) {
        self.tasks.shutdown().await;
        if let Err(e) = self.room.close().await {
            warn!(room = %self.room_name, error = %e, "failed to leave room cleanly");
        }
        info!(room = %self.room_name, "media disconnected");
    }
}

async fn send_agent_audio(
    mut outbound: broadcast::Receiver<AudioFrame>,
    source: NativeAudioSource,
    room: String,
) {
    loop {
        let frame = match outbound.recv().await {
            Ok(frame) => frame,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(room = %room, skipped, "agent audio dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if frame.sample_rate != PIPELINE_SAMPLE_RATE || frame.channels != 1 {
            warn!(
                room = %room,
                sample_rate = frame.sample_rate,
                channels = frame.channels,
                "skipping agent audio in an unexpected format"
            );
            continue;
        }

        for chunk in to_rtc_frames(&frame) {
            if let Err(e) = source.capture_frame(&chunk).await {
                warn!(room = %room, error = %e, "failed to capture agent audio");
                break;
            }
        }
    }
}

async fn receive_remote_audio(
    mut events: mpsc::UnboundedReceiver<RoomEvent>,
    endpoint: Arc<LiveKitRoom>,
) {
    let mut streams = JoinSet::new();
    while let Some(event) = events.recv().await {
        match event {
            RoomEvent::TrackSubscribed {
                track: RemoteTrack::Audio(track),
                participant,
                ..
            } => {
                debug!(
                    room = %endpoint.name(),
                    participant = ?participant.identity(),
                    "remote audio track subscribed"
                );
                let mut stream = NativeAudioStream::new(
                    track.rtc_track(),
                    PIPELINE_SAMPLE_RATE as i32,
                    1,
                );
                let endpoint = endpoint.clone();
                streams.spawn(async move {
                    while let Some(frame) = stream.next().await {
                        endpoint.ingest_audio(from_rtc_frame(&frame));
                    }
                });
            }
            RoomEvent::Disconnected { .. } => {
                info!(room = %endpoint.name(), "disconnected from room");
                break;
            }
            _ => {}
        }
    }
    streams.shutdown().await;
}

/// Splits a mono frame into 10 ms WebRTC frames, zero-padding the last one.
fn to_rtc_frames(frame: &AudioFrame) -> Vec<RtcAudioFrame<'static>> {
    let per_frame = (frame.sample_rate / FRAMES_PER_SECOND) as usize;
    if per_frame == 0 {
        return Vec::new();
    }

    frame
        .samples
        .chunks(per_frame)
        .map(|chunk| {
            let mut data = chunk.to_vec();
            data.resize(per_frame, 0);
            RtcAudioFrame {
                data: Cow::Owned(data),
                sample_rate: frame.sample_rate,
                num_channels: 1,
                samples_per_channel: per_frame as u32,
            }
        })
        .collect()
}

fn from_rtc_frame(frame: &RtcAudioFrame<'_>) -> AudioFrame {
    AudioFrame::new(
        frame.data.to_vec(),
        frame.sample_rate,
        frame.num_channels as u16,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_audio_is_cut_into_ten_ms_frames() {
        let frame = AudioFrame::new(vec![3; 400], PIPELINE_SAMPLE_RATE, 1);

        let chunks = to_rtc_frames(&frame);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.samples_per_channel == 160));
        assert!(chunks.iter().all(|c| c.data.len() == 160));
        assert_eq!(chunks[2].data[79], 3);
        assert_eq!(chunks[2].data[80], 0);
    }

    #[test]
    fn empty_audio_produces_no_frames() {
        let frame = AudioFrame::new(Vec::new(), PIPELINE_SAMPLE_RATE, 1);
        assert!(to_rtc_frames(&frame).is_empty());
    }

    #[test]
    fn remote_frames_keep_their_format() {
        let rtc = RtcAudioFrame {
            data: Cow::Owned(vec![1, -1, 2, -2]),
            sample_rate: PIPELINE_SAMPLE_RATE,
            num_channels: 1,
            samples_per_channel: 4,
        };
        let frame = from_rtc_frame(&rtc);
        assert_eq!(frame.samples, vec![1, -1, 2, -2]);
        assert_eq!(frame.sample_rate, PIPELINE_SAMPLE_RATE);
        assert_eq!(frame.channels, 1);
    }
}
