//! Configuration loading from file and environment variables.

use callwire_agent::{AgentConfig, ProvidersConfig};
use callwire_sip::{
    CallConfig, DispatchRuleConfig, InboundTrunkConfig, LiveKitConfig, OutboundTrunkConfig,
};
use serde::Deserialize;
use thiserror::Error;

/// Config file used when neither `--config` nor `CALLWIRE_CONFIG_PATH` is set.
pub const DEFAULT_CONFIG_PATH: &str = "callwire.toml";

/// Top-level configuration, built once at startup and passed down.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub livekit: LiveKitConfig,

    /// Outbound trunk towards the carrier.
    #[serde(default)]
    pub trunk: OutboundTrunkConfig,

    #[serde(default)]
    pub inbound: InboundTrunkConfig,

    #[serde(default)]
    pub dispatch: DispatchRuleConfig,

    /// The outbound call to place.
    #[serde(default)]
    pub call: CallConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "callwire_sip=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A setting the selected command needs is empty.
    #[error("missing required setting {0}; set it in the environment or the config file")]
    Missing(&'static str),

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Which settings a command needs before any remote call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Outbound trunk plus a destination number.
    OutboundCall,
    /// Existing trunk id plus a destination number.
    Dial,
    OutboundTrunk,
    InboundSetup,
    Agent,
}

/// Where the loaded settings came from, before environment overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// No config file was found at the path.
    Defaults,
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies environment overrides.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// an environment override cannot be parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with_source(path).map(|(config, _)| config)
}

/// Like [`load_config`], also reporting whether the file was found. Runs
/// before logging is set up, so the caller logs the outcome.
pub fn load_config_with_source(
    path: Option<&str>,
) -> Result<(Config, ConfigSource), ConfigError> {
    let (mut config, source) = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => (toml::from_str(&contents)?, ConfigSource::File),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (Config::default(), ConfigSource::Defaults)
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => (Config::default(), ConfigSource::Defaults),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok((config, source))
}

fn first_set(lookup: &impl Fn(&str) -> Option<String>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .copied()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Overlays environment settings onto `config`. Empty values count as unset.
///
/// | Variable | Setting |
/// |---|---|
/// | `LIVEKIT_URL`, `LIVEKIT_API_KEY`, `LIVEKIT_API_SECRET` | `livekit.*` |
/// | `TWILIO_SIP_DOMAIN` (or `TWILIO_SIP_URI`) | `trunk.address` |
/// | `TWILIO_PHONE_NUMBER` (or `Number`) | `trunk.numbers`, `inbound.numbers` |
/// | `TWILIO_SIP_USERNAME`, `TWILIO_SIP_PASSWORD` | `trunk.auth_*` |
/// | `SIP_TRUNK_ID` | `trunk.trunk_id` |
/// | `SIP_CALL_TO` | `call.to` |
/// | `DEEPGRAM_API_KEY`, `GEMINI_API_KEY` | provider API keys |
/// | `AWS_DEFAULT_REGION`, `AWS_API_KEY_ID`, `AWS_API_SECRET_KEY` | `providers.polly.*` |
/// | `CALLWIRE_LOG_LEVEL`, `CALLWIRE_LOG_JSON` | `logging.*` |
pub fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let get = |names: &[&str]| first_set(&lookup, names);

    if let Some(url) = get(&["LIVEKIT_URL"]) {
        config.livekit.url = url;
    }
    if let Some(key) = get(&["LIVEKIT_API_KEY"]) {
        config.livekit.api_key = key;
    }
    if let Some(secret) = get(&["LIVEKIT_API_SECRET"]) {
        config.livekit.api_secret = secret;
    }

    if let Some(address) = get(&["TWILIO_SIP_DOMAIN", "TWILIO_SIP_URI"]) {
        config.trunk.address = address;
    }
    if let Some(number) = get(&["TWILIO_PHONE_NUMBER", "Number"]) {
        config.trunk.numbers = vec![number.clone()];
        config.inbound.numbers = vec![number];
    }
    if let Some(username) = get(&["TWILIO_SIP_USERNAME"]) {
        config.trunk.auth_username = username;
    }
    if let Some(password) = get(&["TWILIO_SIP_PASSWORD"]) {
        config.trunk.auth_password = password;
    }
    if let Some(trunk_id) = get(&["SIP_TRUNK_ID"]) {
        config.trunk.trunk_id = Some(trunk_id);
    }
    if let Some(to) = get(&["SIP_CALL_TO"]) {
        config.call.to = to;
    }

    if let Some(key) = get(&["DEEPGRAM_API_KEY"]) {
        config.providers.deepgram.api_key = key;
    }
    if let Some(key) = get(&["GEMINI_API_KEY"]) {
        config.providers.gemini.api_key = key;
    }
    if let Some(region) = get(&["AWS_DEFAULT_REGION"]) {
        config.providers.polly.region = region;
    }
    if let Some(key_id) = get(&["AWS_API_KEY_ID"]) {
        config.providers.polly.access_key_id = key_id;
    }
    if let Some(secret) = get(&["AWS_API_SECRET_KEY"]) {
        config.providers.polly.secret_access_key = secret;
    }

    if let Some(level) = get(&["CALLWIRE_LOG_LEVEL"]) {
        config.logging.level = level;
    }
    if let Some(json) = get(&["CALLWIRE_LOG_JSON"]) {
        config.logging.json = match json.to_ascii_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => {
                return Err(ConfigError::Invalid {
                    var: "CALLWIRE_LOG_JSON",
                    value: json,
                })
            }
        };
    }

    Ok(())
}

fn require(value: &str, var: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Missing(var))
    } else {
        Ok(())
    }
}

impl Config {
    /// Checks that everything `requirement` needs is present.
    pub fn validate(&self, requirement: Requirement) -> Result<(), ConfigError> {
        require(&self.livekit.url, "LIVEKIT_URL")?;
        require(&self.livekit.api_key, "LIVEKIT_API_KEY")?;
        require(&self.livekit.api_secret, "LIVEKIT_API_SECRET")?;

        match requirement {
            Requirement::OutboundCall => {
                self.validate_trunk()?;
                require(&self.call.to, "SIP_CALL_TO")
            }
            Requirement::Dial => {
                require(self.trunk.trunk_id.as_deref().unwrap_or(""), "SIP_TRUNK_ID")?;
                require(&self.call.to, "SIP_CALL_TO")
            }
            Requirement::OutboundTrunk => self.validate_trunk(),
            Requirement::InboundSetup => {
                if self.inbound.numbers.iter().all(|n| n.trim().is_empty()) {
                    return Err(ConfigError::Missing("TWILIO_PHONE_NUMBER"));
                }
                Ok(())
            }
            Requirement::Agent => {
                require(&self.providers.deepgram.api_key, "DEEPGRAM_API_KEY")?;
                require(&self.providers.gemini.api_key, "GEMINI_API_KEY")?;
                require(&self.providers.polly.access_key_id, "AWS_API_KEY_ID")?;
                require(&self.providers.polly.secret_access_key, "AWS_API_SECRET_KEY")
            }
        }
    }

    fn validate_trunk(&self) -> Result<(), ConfigError> {
        require(&self.trunk.address, "TWILIO_SIP_DOMAIN")?;
        if self.trunk.numbers.iter().all(|n| n.trim().is_empty()) {
            return Err(ConfigError::Missing("TWILIO_PHONE_NUMBER"));
        }
        require(&self.trunk.auth_username, "TWILIO_SIP_USERNAME")?;
        require(&self.trunk.auth_password, "TWILIO_SIP_PASSWORD")
    }
}
