use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LiveKit access token error: {0}")]
    Token(#[from] livekit_api::access_token::AccessTokenError),

    #[error("Room service error: {0}")]
    RoomService(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("timed out after {}s waiting for {what}", .after.as_secs())]
    Timeout { after: Duration, what: &'static str },
}
