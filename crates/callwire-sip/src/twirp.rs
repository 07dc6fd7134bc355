use crate::config::LiveKitConfig;
use crate::error::{SipError, TwirpCode, TwirpError};
use livekit_api::access_token::{AccessToken, SIPGrants};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Maximum number of body bytes echoed into an error message.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// JSON transport for LiveKit's Twirp services.
///
/// Every request carries a freshly minted bearer token scoped to SIP
/// administration and outbound calling.
#[derive(Debug)]
pub struct TwirpClient {
    config: LiveKitConfig,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct TwirpErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    meta: HashMap<String, String>,
}

impl TwirpClient {
    pub fn new(config: LiveKitConfig) -> Result<Self, SipError> {
        if config.url.trim().is_empty() {
            return Err(SipError::Config("LiveKit URL is empty".to_string()));
        }
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(SipError::Config(
                "LiveKit API key and secret are required".to_string(),
            ));
        }

        let base_url = http_base_url(&config.url);
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            config,
            base_url,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn access_token(&self) -> Result<String, SipError> {
        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_sip_grants(SIPGrants {
                admin: true,
                call: true,
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        Ok(token.to_jwt()?)
    }

    /// Invokes `service/method` with a JSON body and decodes the JSON response.
    pub async fn call<Req, Resp>(
        &self,
        service: &str,
        method: &str,
        body: &Req,
    ) -> Result<Resp, SipError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/twirp/{}/{}", self.base_url, service, method);
        let token = self.access_token()?;

        tracing::debug!(%url, "sending control plane request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let err = decode_error(status.as_u16(), &bytes);
            tracing::debug!(%url, status = status.as_u16(), code = %err.code, "control plane returned error");
            return Err(SipError::Twirp(err));
        }

        serde_json::from_slice(&bytes).map_err(|e| SipError::Decode(format!("{}: {}", method, e)))
    }
}

/// Maps a signalling URL (`ws://`, `wss://`) to the HTTP base of the API.
pub fn http_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if let Some(rest) = url.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = url.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        url.to_string()
    }
}

fn decode_error(status: u16, body: &[u8]) -> TwirpError {
    match serde_json::from_slice::<TwirpErrorBody>(body) {
        Ok(parsed) if !parsed.code.is_empty() => TwirpError {
            code: TwirpCode::parse(&parsed.code),
            msg: parsed.msg,
            meta: parsed.meta,
        },
        _ => {
            let text: String = String::from_utf8_lossy(body)
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect();
            TwirpError::new(
                TwirpCode::from_http_status(status),
                format!("HTTP {}: {}", status, text.trim()),
            )
        }
    }
}
