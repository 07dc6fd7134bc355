use crate::audio::AudioFrame;
use crate::config::DeepgramConfig;
use crate::error::AgentError;
use crate::provider::SpeechToText;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Maximum audio input size for STT (10 MiB). Prevents OOM from oversized payloads.
const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Timeout for a single transcription request.
const STT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize, Default)]
#[serde(default)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ListenResults {
    channels: Vec<ListenChannel>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ListenChannel {
    alternatives: Vec<ListenAlternative>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ListenAlternative {
    transcript: String,
}

/// Deepgram pre-recorded transcription of buffered utterances.
#[derive(Debug, Clone)]
pub struct DeepgramStt {
    config: DeepgramConfig,
    http: reqwest::Client,
}

impl DeepgramStt {
    pub fn new(config: DeepgramConfig, http: reqwest::Client) -> Result<Self, AgentError> {
        if config.api_key.is_empty() {
            return Err(AgentError::Config("Deepgram API key is not set".to_string()));
        }
        Ok(Self { config, http })
    }
}

#[async_trait]
impl SpeechToText for DeepgramStt {
    async fn transcribe(&self, audio: &AudioFrame) -> Result<String, AgentError> {
        let body = audio.to_le_bytes();
        if body.len() > MAX_STT_INPUT_BYTES {
            return Err(AgentError::Stt(format!(
                "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                body.len(),
                MAX_STT_INPUT_BYTES
            )));
        }
        if body.is_empty() {
            return Ok(String::new());
        }

        let url = format!("{}/v1/listen", self.config.base_url.trim_end_matches('/'));
        let sample_rate = audio.sample_rate.to_string();
        let channels = audio.channels.to_string();

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Token {}", self.config.api_key))
            .header("Content-Type", "application/octet-stream")
            .query(&[
                ("model", self.config.model.as_str()),
                ("language", self.config.language.as_str()),
                ("encoding", "linear16"),
                ("sample_rate", sample_rate.as_str()),
                ("channels", channels.as_str()),
                ("smart_format", "true"),
            ])
            .timeout(STT_TIMEOUT)
            .body(body)
            .send()
            .await
            .map_err(|e| AgentError::Stt(format!("Deepgram request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::Stt(format!(
                "Deepgram returned {}: {}",
                status.as_u16(),
                text.trim()
            )));
        }

        let parsed: ListenResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Stt(format!("invalid Deepgram response: {}", e)))?;

        let transcript = parsed
            .results
            .channels
            .into_iter()
            .next()
            .and_then(|channel| channel.alternatives.into_iter().next())
            .map(|alt| alt.transcript.trim().to_string())
            .unwrap_or_default();

        tracing::debug!(
            chars = transcript.len(),
            audio_ms = audio.duration().as_millis() as u64,
            "transcribed utterance"
        );
        Ok(transcript)
    }
}
