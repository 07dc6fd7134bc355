use crate::config::GeminiConfig;
use crate::error::AgentError;
use crate::provider::{ChatRequest, ChatRole, LanguageModel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const LLM_TIMEOUT: Duration = Duration::from_secs(30);

/// Sent as the user turn when a reply is requested before anyone spoke.
const CONVERSATION_OPENER: &str = "(The call has just connected.)";

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
#[serde(default)]
struct Part {
    text: String,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
#[serde(default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Candidate {
    content: Content,
}

/// Google Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiLlm {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiLlm {
    pub fn new(config: GeminiConfig, http: reqwest::Client) -> Result<Self, AgentError> {
        if config.api_key.is_empty() {
            return Err(AgentError::Config("Gemini API key is not set".to_string()));
        }
        Ok(Self { config, http })
    }
}

fn text_content(role: Option<&str>, text: &str) -> Content {
    Content {
        role: role.map(str::to_string),
        parts: vec![Part {
            text: text.to_string(),
        }],
    }
}

fn build_request(request: &ChatRequest, temperature: Option<f32>) -> GenerateContentRequest {
    let mut system = request.instructions.clone();
    if let Some(turn) = &request.turn_instructions {
        system.push_str("\n\n");
        system.push_str(turn);
    }

    let mut contents: Vec<Content> = request
        .history
        .iter()
        .map(|message| {
            let role = match message.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "model",
            };
            text_content(Some(role), &message.text)
        })
        .collect();

    if contents.is_empty() {
        contents.push(text_content(Some("user"), CONVERSATION_OPENER));
    }

    GenerateContentRequest {
        system_instruction: text_content(None, &system),
        contents,
        generation_config: GenerationConfig { temperature },
    }
}

#[async_trait]
impl LanguageModel for GeminiLlm {
    async fn generate(&self, request: &ChatRequest) -> Result<String, AgentError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let body = build_request(request, self.config.temperature);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .timeout(LLM_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Llm(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::Llm(format!(
                "Gemini returned {}: {}",
                status.as_u16(),
                text.trim()
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Llm(format!("invalid Gemini response: {}", e)))?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Llm("Gemini returned no candidates".to_string()))?;

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect();
        Ok(text.trim().to_string())
    }
}
