//! Capability interfaces composed into a conversational pipeline.
//!
//! Each concern is a single-method trait so that a session can be assembled
//! from any mix of hosted services and local implementations.

use crate::audio::AudioFrame;
use crate::error::AgentError;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// Input of one language-model turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Persona system prompt.
    pub instructions: String,
    pub history: Vec<ChatMessage>,
    /// One-off guidance for this turn only, e.g. a greeting.
    pub turn_instructions: Option<String>,
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &AudioFrame) -> Result<String, AgentError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: &ChatRequest) -> Result<String, AgentError>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioFrame, AgentError>;
}

/// Result of feeding one frame to a voice-activity detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    Silence,
    SpeechStart,
    Speaking,
    SpeechEnd,
}

/// Stateful per-stream detector; a session owns its instance exclusively.
pub trait VoiceActivityDetector: Send + Sync {
    fn process(&mut self, frame: &AudioFrame) -> VadEvent;
}

pub trait TurnDetector: Send + Sync {
    /// Probability that `pending` user text completes the speaker's turn.
    fn end_of_turn_probability(&self, history: &[ChatMessage], pending: &str) -> f32;
}

/// One instance of each capability, owned by a single session.
pub struct Providers {
    pub stt: Arc<dyn SpeechToText>,
    pub llm: Arc<dyn LanguageModel>,
    pub tts: Arc<dyn TextToSpeech>,
    pub vad: Box<dyn VoiceActivityDetector>,
    pub turn: Arc<dyn TurnDetector>,
}

/// Builds a fresh provider set for every job.
pub trait ProviderFactory: Send + Sync {
    fn build(&self) -> Result<Providers, AgentError>;
}
