//! Voice agent for callwire.
//!
//! A worker watches the LiveKit room service for call rooms and runs an
//! entrypoint per room: join, wait for the caller, build a speech pipeline
//! (STT, LLM, TTS, VAD, turn detection), start it and speak a greeting.

pub mod audio;
pub mod config;
pub mod entrypoint;
pub mod error;
pub mod llm;
pub mod media;
pub mod provider;
pub mod room;
pub mod session;
mod sigv4;
pub mod stt;
pub mod tts;
pub mod turn;
pub mod vad;
pub mod worker;

pub use audio::{AudioFrame, PIPELINE_SAMPLE_RATE};
pub use config::{
    AgentConfig, DeepgramConfig, GeminiConfig, PollyConfig, ProvidersConfig, VadConfig,
};
pub use entrypoint::{entrypoint, PluginFactory};
pub use error::AgentError;
pub use llm::GeminiLlm;
pub use media::MediaBridge;
pub use provider::{
    ChatMessage, ChatRequest, ChatRole, LanguageModel, ProviderFactory, Providers, SpeechToText,
    TextToSpeech, TurnDetector, VadEvent, VoiceActivityDetector,
};
pub use room::{JobContext, LiveKitJob, LiveKitRoom, RemoteParticipant, RoomIo};
pub use session::{AgentSession, Persona, SessionOptions};
pub use stt::DeepgramStt;
pub use tts::PollyTts;
pub use turn::HeuristicTurnDetector;
pub use vad::EnergyVad;
pub use worker::{Dispatcher, LiveKitDispatcher, Worker};
