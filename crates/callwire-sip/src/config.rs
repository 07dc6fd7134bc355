use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

fn default_token_ttl_seconds() -> u64 {
    600
}

/// Connection settings for the LiveKit control plane.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveKitConfig {
    pub url: String,
    pub api_key: String,
    #[serde(skip_serializing)]
    pub api_secret: String,
    /// TTL in seconds for the access tokens minted per control-plane request. Default: 600.
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
}

impl Default for LiveKitConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

impl LiveKitConfig {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

/// Outbound trunk pointing at the carrier's SIP domain.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundTrunkConfig {
    pub name: String,
    /// Carrier SIP address, e.g. `example.pstn.twilio.com`.
    pub address: String,
    /// Caller-id numbers in E.164 form.
    pub numbers: Vec<String>,
    pub auth_username: String,
    #[serde(skip_serializing)]
    pub auth_password: String,
    /// Id of a trunk provisioned earlier. Used for `dial`, and to resolve the
    /// trunk when creation reports that it already exists.
    pub trunk_id: Option<String>,
}

impl Default for OutboundTrunkConfig {
    fn default() -> Self {
        Self {
            name: "Twilio Outbound".to_string(),
            address: String::new(),
            numbers: Vec::new(),
            auth_username: String::new(),
            auth_password: String::new(),
            trunk_id: None,
        }
    }
}

impl fmt::Debug for OutboundTrunkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundTrunkConfig")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("numbers", &self.numbers)
            .field("auth_username", &self.auth_username)
            .field("auth_password", &"[REDACTED]")
            .field("trunk_id", &self.trunk_id)
            .finish()
    }
}

/// Inbound trunk accepting calls for the owned numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundTrunkConfig {
    pub name: String,
    pub numbers: Vec<String>,
}

impl Default for InboundTrunkConfig {
    fn default() -> Self {
        Self {
            name: "Twilio Inbound".to_string(),
            numbers: Vec::new(),
        }
    }
}

/// Dispatch rule placing every inbound caller in a fresh room named
/// `<room_prefix><suffix>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchRuleConfig {
    pub name: String,
    pub room_prefix: String,
    pub hide_phone_number: bool,
}

impl Default for DispatchRuleConfig {
    fn default() -> Self {
        Self {
            name: "Route to AI Agent".to_string(),
            room_prefix: "call-".to_string(),
            hide_phone_number: false,
        }
    }
}

/// Parameters of an outbound call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Destination number in E.164 form.
    pub to: String,
    /// Target room. Defaults to `call-<digits of to>`.
    pub room_name: Option<String>,
    pub participant_identity: String,
    pub participant_name: String,
    /// Request Krisp noise suppression on the call leg.
    pub krisp_enabled: bool,
    /// Block the create request until the callee answers or the call fails.
    pub wait_until_answered: bool,
    /// Upper bound on ringing. Unset leaves the platform default in place.
    pub ringing_timeout_secs: Option<u64>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            to: String::new(),
            room_name: None,
            participant_identity: "ai-caller".to_string(),
            participant_name: "AI Assistant".to_string(),
            krisp_enabled: true,
            wait_until_answered: true,
            ringing_timeout_secs: None,
        }
    }
}

impl CallConfig {
    /// Resolves the room the call is placed into.
    pub fn room_name(&self) -> String {
        match &self.room_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("call-{}", self.to.replace('+', "")),
        }
    }

    pub fn ringing_timeout(&self) -> Option<Duration> {
        self.ringing_timeout_secs.map(Duration::from_secs)
    }
}
