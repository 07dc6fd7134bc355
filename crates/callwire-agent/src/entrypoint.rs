use crate::config::{AgentConfig, ProvidersConfig};
use crate::error::AgentError;
use crate::llm::GeminiLlm;
use crate::provider::{ProviderFactory, Providers};
use crate::room::JobContext;
use crate::session::{AgentSession, Persona, SessionOptions};
use crate::stt::DeepgramStt;
use crate::tts::PollyTts;
use crate::turn::HeuristicTurnDetector;
use crate::vad::EnergyVad;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Hosted Deepgram, Gemini and Polly plus the local VAD and turn detector.
#[derive(Debug, Clone)]
pub struct PluginFactory {
    config: ProvidersConfig,
    http: reqwest::Client,
}

impl PluginFactory {
    pub fn new(config: ProvidersConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Fails early when a provider is missing its credentials.
    pub fn validate(&self) -> Result<(), AgentError> {
        self.build().map(|_| ())
    }
}

impl ProviderFactory for PluginFactory {
    fn build(&self) -> Result<Providers, AgentError> {
        Ok(Providers {
            stt: Arc::new(DeepgramStt::new(
                self.config.deepgram.clone(),
                self.http.clone(),
            )?),
            llm: Arc::new(GeminiLlm::new(self.config.gemini.clone(), self.http.clone())?),
            tts: Arc::new(PollyTts::new(self.config.polly.clone(), self.http.clone())?),
            vad: Box::new(EnergyVad::new(&self.config.vad)),
            turn: Arc::new(HeuristicTurnDetector),
        })
    }
}

/// Runs one job: join, wait for the caller, build and start the session,
/// then greet. The returned session keeps listening until closed.
pub async fn entrypoint(
    ctx: &dyn JobContext,
    factory: &dyn ProviderFactory,
    config: &AgentConfig,
) -> Result<AgentSession, AgentError> {
    ctx.connect().await?;

    let participant = ctx.wait_for_participant().await?;
    info!(
        participant = %participant.identity,
        name = %participant.name,
        "starting agent session"
    );

    let providers = factory.build()?;
    let mut session = AgentSession::new(providers, SessionOptions::from(config));
    session.start(ctx.room(), Persona::new(config.instructions.clone()))?;

    tokio::time::sleep(Duration::from_millis(config.greeting_delay_ms)).await;
    session.generate_reply(&config.greeting).await?;

    Ok(session)
}
