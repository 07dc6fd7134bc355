//! A conversational session bound to one room.
//!
//! Once started, a listener task consumes the room's audio, segments it into
//! utterances with the voice-activity detector and transcribes each one. The
//! transcript accumulates until the turn detector is confident the caller has
//! finished (or the endpointing delay runs out), at which point the language
//! model answers and the reply is synthesized and published to the room.

use crate::audio::AudioFrame;
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::provider::{
    ChatMessage, ChatRequest, LanguageModel, Providers, SpeechToText, TextToSpeech, TurnDetector,
    VadEvent, VoiceActivityDetector,
};
use crate::room::RoomIo;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Frames kept before speech onset so the first syllable is not clipped.
const PRE_ROLL_FRAMES: usize = 10;

/// Stand-in deadline for the disabled endpointing branch.
const IDLE_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

/// System prompt the language model speaks as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub instructions: String,
}

impl Persona {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    pub turn_threshold: f32,
    pub max_endpointing_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for SessionOptions {
    fn from(config: &AgentConfig) -> Self {
        Self {
            turn_threshold: config.turn_threshold,
            max_endpointing_delay: Duration::from_millis(config.max_endpointing_delay_ms),
        }
    }
}

struct Pipeline {
    stt: Arc<dyn SpeechToText>,
    llm: Arc<dyn LanguageModel>,
    tts: Arc<dyn TextToSpeech>,
    turn: Arc<dyn TurnDetector>,
    room: Arc<dyn RoomIo>,
    persona: Persona,
    options: SessionOptions,
    history: Mutex<Vec<ChatMessage>>,
    // Serializes replies so history and published audio stay in turn order.
    speaking: Mutex<()>,
}

impl Pipeline {
    async fn reply(&self, turn_instructions: Option<String>) -> Result<String, AgentError> {
        let _turn = self.speaking.lock().await;

        let request = ChatRequest {
            instructions: self.persona.instructions.clone(),
            history: self.history.lock().await.clone(),
            turn_instructions,
        };
        let text = self.llm.generate(&request).await?;
        if text.is_empty() {
            warn!(room = %self.room.name(), "language model returned an empty reply");
            return Ok(text);
        }

        let audio = self.tts.synthesize(&text).await?;
        self.room.publish_audio(audio).await?;
        self.history.lock().await.push(ChatMessage::assistant(&text));

        info!(room = %self.room.name(), chars = text.len(), "agent replied");
        Ok(text)
    }

    async fn commit_user_turn(&self, text: String) {
        info!(room = %self.room.name(), chars = text.len(), "user turn committed");
        self.history.lock().await.push(ChatMessage::user(text));
        if let Err(e) = self.reply(None).await {
            warn!(room = %self.room.name(), error = %e, "failed to answer user turn");
        }
    }

    async fn on_transcript(&self, pending: &mut String, text: &str) -> bool {
        if !pending.is_empty() {
            pending.push(' ');
        }
        pending.push_str(text);

        let history = self.history.lock().await.clone();
        let probability = self.turn.end_of_turn_probability(&history, pending);
        debug!(probability, "end-of-turn estimate");
        probability >= self.options.turn_threshold
    }

    async fn listen(
        self: Arc<Self>,
        mut audio: broadcast::Receiver<AudioFrame>,
        mut vad: Box<dyn VoiceActivityDetector>,
    ) {
        let mut pre_roll: VecDeque<AudioFrame> = VecDeque::with_capacity(PRE_ROLL_FRAMES);
        let mut utterance: Option<AudioFrame> = None;
        let mut pending = String::new();
        let mut deadline: Option<Instant> = None;

        loop {
            let endpoint_at = deadline.unwrap_or_else(|| Instant::now() + IDLE_DEADLINE);
            tokio::select! {
                received = audio.recv() => {
                    let frame = match received {
                        Ok(frame) => frame,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(room = %self.room.name(), skipped, "listener lagged behind room audio");
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    match vad.process(&frame) {
                        VadEvent::Silence => {
                            if pre_roll.len() == PRE_ROLL_FRAMES {
                                pre_roll.pop_front();
                            }
                            pre_roll.push_back(frame);
                        }
                        VadEvent::SpeechStart => {
                            let mut buffer =
                                AudioFrame::new(Vec::new(), frame.sample_rate, frame.channels);
                            for earlier in pre_roll.drain(..) {
                                buffer.extend(&earlier);
                            }
                            buffer.extend(&frame);
                            utterance = Some(buffer);
                            deadline = None;
                        }
                        VadEvent::Speaking => {
                            if let Some(buffer) = utterance.as_mut() {
                                buffer.extend(&frame);
                            }
                        }
                        VadEvent::SpeechEnd => {
                            let Some(buffer) = utterance.take() else {
                                continue;
                            };
                            let text = match self.stt.transcribe(&buffer).await {
                                Ok(text) => text,
                                Err(e) => {
                                    warn!(room = %self.room.name(), error = %e, "transcription failed");
                                    continue;
                                }
                            };
                            if text.is_empty() {
                                continue;
                            }
                            if self.on_transcript(&mut pending, &text).await {
                                deadline = None;
                                self.commit_user_turn(std::mem::take(&mut pending)).await;
                            } else {
                                deadline = Some(Instant::now() + self.options.max_endpointing_delay);
                            }
                        }
                    }
                }
                _ = tokio::time::sleep_until(endpoint_at), if deadline.is_some() => {
                    deadline = None;
                    if !pending.is_empty() {
                        self.commit_user_turn(std::mem::take(&mut pending)).await;
                    }
                }
            }
        }

        debug!(room = %self.room.name(), "room audio ended");
    }
}

/// Speech pipeline attached to a room.
pub struct AgentSession {
    options: SessionOptions,
    providers: Option<Providers>,
    pipeline: Option<Arc<Pipeline>>,
    listener: Option<JoinHandle<()>>,
}

impl AgentSession {
    pub fn new(providers: Providers, options: SessionOptions) -> Self {
        Self {
            options,
            providers: Some(providers),
            pipeline: None,
            listener: None,
        }
    }

    /// Binds the pipeline to `room` and starts listening.
    pub fn start(&mut self, room: Arc<dyn RoomIo>, persona: Persona) -> Result<(), AgentError> {
        let providers = self
            .providers
            .take()
            .ok_or_else(|| AgentError::Session("session already started".to_string()))?;

        let pipeline = Arc::new(Pipeline {
            stt: providers.stt,
            llm: providers.llm,
            tts: providers.tts,
            turn: providers.turn,
            room,
            persona,
            options: self.options,
            history: Mutex::new(Vec::new()),
            speaking: Mutex::new(()),
        });

        // Subscribe before returning so no frame sent after `start` is missed.
        let audio = pipeline.room.subscribe_audio();
        info!(room = %pipeline.room.name(), "agent session started");
        self.listener = Some(tokio::spawn(pipeline.clone().listen(audio, providers.vad)));
        self.pipeline = Some(pipeline);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Runs one model turn with extra `instructions` and speaks the result.
    pub async fn generate_reply(&self, instructions: &str) -> Result<String, AgentError> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| AgentError::Session("session not started".to_string()))?;
        pipeline.reply(Some(instructions.to_string())).await
    }

    pub async fn history(&self) -> Vec<ChatMessage> {
        match &self.pipeline {
            Some(pipeline) => pipeline.history.lock().await.clone(),
            None => Vec::new(),
        }
    }

    pub async fn close(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            let _ = listener.await;
        }
        if let Some(pipeline) = self.pipeline.take() {
            info!(room = %pipeline.room.name(), "agent session closed");
        }
    }
}

impl Drop for AgentSession {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PIPELINE_SAMPLE_RATE;
    use crate::provider::ChatRole;
    use crate::turn::HeuristicTurnDetector;
    use async_trait::async_trait;
    use tokio::sync::broadcast;

    struct ScriptedRoom {
        audio_tx: broadcast::Sender<AudioFrame>,
        published: std::sync::Mutex<Vec<AudioFrame>>,
    }

    impl ScriptedRoom {
        fn new() -> Arc<Self> {
            let (audio_tx, _) = broadcast::channel(64);
            Arc::new(Self {
                audio_tx,
                published: std::sync::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RoomIo for ScriptedRoom {
        fn name(&self) -> &str {
            "call-test"
        }

        fn subscribe_audio(&self) -> broadcast::Receiver<AudioFrame> {
            self.audio_tx.subscribe()
        }

        async fn publish_audio(&self, frame: AudioFrame) -> Result<(), AgentError> {
            self.published.lock().unwrap().push(frame);
            Ok(())
        }
    }

    struct FixedStt(&'static str);

    #[async_trait]
    impl SpeechToText for FixedStt {
        async fn transcribe(&self, _audio: &AudioFrame) -> Result<String, AgentError> {
            Ok(self.0.to_string())
        }
    }

    struct EchoLlm;

    #[async_trait]
    impl LanguageModel for EchoLlm {
        async fn generate(&self, request: &ChatRequest) -> Result<String, AgentError> {
            Ok(match request.history.last() {
                Some(last) if last.role == ChatRole::User => format!("You said: {}", last.text),
                _ => "Hello!".to_string(),
            })
        }
    }

    struct BeepTts;

    #[async_trait]
    impl TextToSpeech for BeepTts {
        async fn synthesize(&self, _text: &str) -> Result<AudioFrame, AgentError> {
            Ok(AudioFrame::new(vec![100; 160], PIPELINE_SAMPLE_RATE, 1))
        }
    }

    /// Treats any non-empty frame as speech for one frame.
    struct FrameVad {
        speaking: bool,
    }

    impl VoiceActivityDetector for FrameVad {
        fn process(&mut self, frame: &AudioFrame) -> VadEvent {
            let voiced = frame.samples.iter().any(|&s| s != 0);
            match (self.speaking, voiced) {
                (false, true) => {
                    self.speaking = true;
                    VadEvent::SpeechStart
                }
                (true, false) => {
                    self.speaking = false;
                    VadEvent::SpeechEnd
                }
                (true, true) => VadEvent::Speaking,
                (false, false) => VadEvent::Silence,
            }
        }
    }

    fn providers(transcript: &'static str) -> Providers {
        Providers {
            stt: Arc::new(FixedStt(transcript)),
            llm: Arc::new(EchoLlm),
            tts: Arc::new(BeepTts),
            vad: Box::new(FrameVad { speaking: false }),
            turn: Arc::new(HeuristicTurnDetector),
        }
    }

    fn voiced() -> AudioFrame {
        AudioFrame::new(vec![3000; 320], PIPELINE_SAMPLE_RATE, 1)
    }

    fn quiet() -> AudioFrame {
        AudioFrame::silence(Duration::from_millis(20))
    }

    async fn wait_for_history(session: &AgentSession, len: usize) -> Vec<ChatMessage> {
        for _ in 0..200 {
            let history = session.history().await;
            if history.len() >= len {
                return history;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        session.history().await
    }

    #[tokio::test]
    async fn greeting_is_spoken_and_recorded() {
        let room = ScriptedRoom::new();
        let mut session = AgentSession::new(providers(""), SessionOptions::default());
        session.start(room.clone(), Persona::new("Be brief.")).unwrap();

        let reply = session.generate_reply("Greet the caller.").await.unwrap();
        assert_eq!(reply, "Hello!");
        assert_eq!(session.history().await, vec![ChatMessage::assistant("Hello!")]);
        assert_eq!(room.published.lock().unwrap().len(), 1);

        session.close().await;
    }

    #[tokio::test]
    async fn complete_sentence_is_answered() {
        let room = ScriptedRoom::new();
        let mut session = AgentSession::new(
            providers("I'd like to book a table."),
            SessionOptions::default(),
        );
        session.start(room.clone(), Persona::new("Be brief.")).unwrap();

        room.audio_tx.send(voiced()).unwrap();
        room.audio_tx.send(voiced()).unwrap();
        room.audio_tx.send(quiet()).unwrap();

        let history = wait_for_history(&session, 2).await;
        assert_eq!(
            history,
            vec![
                ChatMessage::user("I'd like to book a table."),
                ChatMessage::assistant("You said: I'd like to book a table."),
            ]
        );
        assert_eq!(room.published.lock().unwrap().len(), 1);
        session.close().await;
    }

    #[tokio::test]
    async fn trailing_conjunction_waits_for_endpointing_delay() {
        let room = ScriptedRoom::new();
        let options = SessionOptions {
            turn_threshold: 0.5,
            max_endpointing_delay: Duration::from_millis(200),
        };
        let mut session = AgentSession::new(providers("I was wondering and"), options);
        session.start(room.clone(), Persona::new("Be brief.")).unwrap();

        room.audio_tx.send(voiced()).unwrap();
        room.audio_tx.send(quiet()).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(session.history().await.is_empty());

        let history = wait_for_history(&session, 2).await;
        assert_eq!(history[0], ChatMessage::user("I was wondering and"));
        session.close().await;
    }

    #[tokio::test]
    async fn session_cannot_start_twice() {
        let room = ScriptedRoom::new();
        let mut session = AgentSession::new(providers(""), SessionOptions::default());
        session.start(room.clone(), Persona::new("a")).unwrap();
        let err = session.start(room, Persona::new("b")).unwrap_err();
        assert!(matches!(err, AgentError::Session(_)));
    }

    #[tokio::test]
    async fn reply_before_start_is_rejected() {
        let session = AgentSession::new(providers(""), SessionOptions::default());
        let err = session.generate_reply("hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Session(_)));
    }
}
