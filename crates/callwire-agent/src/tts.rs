use crate::audio::AudioFrame;
use crate::config::PollyConfig;
use crate::error::AgentError;
use crate::provider::TextToSpeech;
use crate::sigv4::{sign_json_post, Credentials, SignedHeaders};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Polly rejects longer plain-text input.
const MAX_TTS_INPUT_CHARS: usize = 3000;

/// Timeout for a synthesis request.
const TTS_TIMEOUT: Duration = Duration::from_secs(30);

const SPEECH_PATH: &str = "/v1/speech";

#[derive(Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct SynthesizeSpeechRequest<'a> {
    engine: &'a str,
    output_format: &'static str,
    sample_rate: String,
    text: &'a str,
    voice_id: &'a str,
}

/// Amazon Polly `SynthesizeSpeech`, returning mono 16-bit PCM.
#[derive(Debug, Clone)]
pub struct PollyTts {
    config: PollyConfig,
    http: reqwest::Client,
}

impl PollyTts {
    pub fn new(config: PollyConfig, http: reqwest::Client) -> Result<Self, AgentError> {
        if config.access_key_id.is_empty() || config.secret_access_key.is_empty() {
            return Err(AgentError::Config(
                "AWS access key id and secret are required for Polly".to_string(),
            ));
        }
        Ok(Self { config, http })
    }
}

/// Authority (`host[:port]`) of an endpoint URL and the path of the speech
/// resource beneath it, as sent on the wire and signed.
fn speech_target(endpoint: &str) -> (&str, String) {
    let without_scheme = endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint);
    let (host, base) = match without_scheme.find('/') {
        Some(i) => without_scheme.split_at(i),
        None => (without_scheme, ""),
    };
    (host, format!("{}{}", base.trim_end_matches('/'), SPEECH_PATH))
}

impl PollyTts {
    fn sign(&self, body: &[u8], now: chrono::DateTime<chrono::Utc>) -> (String, SignedHeaders) {
        let endpoint = self.config.endpoint();
        let (host, path) = speech_target(&endpoint);
        let signed = sign_json_post(
            &Credentials {
                access_key_id: &self.config.access_key_id,
                secret_access_key: &self.config.secret_access_key,
                region: &self.config.region,
                service: "polly",
            },
            host,
            &path,
            body,
            now,
        );
        (format!("{}{}", endpoint.trim_end_matches('/'), SPEECH_PATH), signed)
    }
}

#[async_trait]
impl TextToSpeech for PollyTts {
    async fn synthesize(&self, text: &str) -> Result<AudioFrame, AgentError> {
        if text.chars().count() > MAX_TTS_INPUT_CHARS {
            return Err(AgentError::Tts(format!(
                "text exceeds maximum length: {} characters (limit: {})",
                text.chars().count(),
                MAX_TTS_INPUT_CHARS
            )));
        }

        let request = SynthesizeSpeechRequest {
            engine: &self.config.engine,
            output_format: "pcm",
            sample_rate: self.config.sample_rate.to_string(),
            text,
            voice_id: &self.config.voice,
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| AgentError::Tts(format!("failed to encode Polly request: {}", e)))?;

        let (url, signed) = self.sign(&body, chrono::Utc::now());

        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .header("X-Amz-Date", signed.amz_date)
            .header("Authorization", signed.authorization)
            .timeout(TTS_TIMEOUT)
            .body(body)
            .send()
            .await
            .map_err(|e| AgentError::Tts(format!("Polly request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::Tts(format!(
                "Polly returned {}: {}",
                status.as_u16(),
                text.trim()
            )));
        }

        let pcm = response
            .bytes()
            .await
            .map_err(|e| AgentError::Tts(format!("failed to read Polly audio: {}", e)))?;

        Ok(AudioFrame::from_le_bytes(&pcm, self.config.sample_rate, 1))
    }
}
