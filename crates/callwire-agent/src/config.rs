use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful AI assistant on a phone call. \
Keep responses SHORT and conversational (1-3 sentences). \
No formatting, emojis, or special characters. \
Be friendly and professional.";

pub const DEFAULT_GREETING: &str = "Greet the person warmly by saying: \
'Hello! This is an AI assistant. How can I help you today?'";

/// Behaviour of the agent worker and of each call session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Identity the agent joins rooms with.
    pub identity: String,
    pub name: String,
    /// System prompt of the agent persona.
    pub instructions: String,
    /// Instructions for the single greeting turn issued after start.
    pub greeting: String,
    /// Pause between session start and the greeting.
    pub greeting_delay_ms: u64,
    /// Bound on waiting for the remote party. Unset waits indefinitely.
    pub participant_timeout_secs: Option<u64>,
    /// Rooms whose name starts with this prefix are picked up as jobs.
    pub room_prefix: String,
    pub poll_interval_ms: u64,
    /// Commit a user turn once the turn detector reaches this probability.
    pub turn_threshold: f32,
    /// Commit a user turn after this much silence regardless of the detector.
    pub max_endpointing_delay_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            identity: "ai-agent".to_string(),
            name: "AI Assistant".to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            greeting_delay_ms: 500,
            participant_timeout_secs: None,
            room_prefix: "call-".to_string(),
            poll_interval_ms: 1000,
            turn_threshold: 0.5,
            max_endpointing_delay_ms: 3000,
        }
    }
}

impl AgentConfig {
    pub fn participant_timeout(&self) -> Option<Duration> {
        self.participant_timeout_secs.map(Duration::from_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "[REDACTED]"
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepgramConfig {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub language: String,
    pub base_url: String,
}

impl Default for DeepgramConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "nova-2".to_string(),
            language: "en".to_string(),
            base_url: "https://api.deepgram.com".to_string(),
        }
    }
}

impl fmt::Debug for DeepgramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepgramConfig")
            .field("api_key", &redacted(&self.api_key))
            .field("model", &self.model)
            .field("language", &self.language)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.0-flash-001".to_string(),
            temperature: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &redacted(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollyConfig {
    pub region: String,
    pub access_key_id: String,
    #[serde(skip_serializing)]
    pub secret_access_key: String,
    pub voice: String,
    pub engine: String,
    pub sample_rate: u32,
    /// Overrides `https://polly.<region>.amazonaws.com`.
    pub endpoint: Option<String>,
}

impl Default for PollyConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            voice: "Joanna".to_string(),
            engine: "neural".to_string(),
            sample_rate: 16_000,
            endpoint: None,
        }
    }
}

impl PollyConfig {
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) if !endpoint.is_empty() => endpoint.trim_end_matches('/').to_string(),
            _ => format!("https://polly.{}.amazonaws.com", self.region),
        }
    }
}

impl fmt::Debug for PollyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollyConfig")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &redacted(&self.secret_access_key))
            .field("voice", &self.voice)
            .field("engine", &self.engine)
            .field("sample_rate", &self.sample_rate)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Frames louder than this are treated as speech.
    pub threshold_dbfs: f32,
    /// Continuous speech needed before a segment starts.
    pub min_speech_ms: u64,
    /// Continuous silence needed before a segment ends.
    pub min_silence_ms: u64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold_dbfs: -45.0,
            min_speech_ms: 60,
            min_silence_ms: 550,
        }
    }
}

/// Settings of the five pipeline providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub deepgram: DeepgramConfig,
    pub gemini: GeminiConfig,
    pub polly: PollyConfig,
    pub vad: VadConfig,
}
