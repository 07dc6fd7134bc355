//! The operations behind each `callwire` subcommand.

use crate::config::{Config, ConfigError, Requirement};
use callwire_agent::{AgentError, LiveKitDispatcher, PluginFactory, Worker};
use callwire_sip::{
    run_create_trunk, run_dial, run_inbound_setup, run_outbound_call, FailureReport,
    InboundOutcome, OutboundCall, PlacedCall, ProvisionError, SipClient, SipError, TrunkOutcome,
};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] SipError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl CommandError {
    /// Operator-facing description, including the SIP status when a call was
    /// rejected by the telephony layer.
    pub fn report(&self) -> String {
        let sip = match self {
            Self::Client(e) => Some(e),
            Self::Provision(e) => e.sip_error(),
            Self::Config(_) | Self::Agent(_) => None,
        };
        match sip {
            Some(e) => format!("{}\n{}", self, FailureReport::from_error(e)),
            None => self.to_string(),
        }
    }
}

/// Creates the outbound trunk, then dials `call.to` through it.
pub async fn outbound_call(config: &Config) -> Result<OutboundCall, CommandError> {
    config.validate(Requirement::OutboundCall)?;
    let client = SipClient::new(config.livekit.clone())?;
    Ok(run_outbound_call(client, &config.trunk, &config.call).await?)
}

/// Dials `call.to` through the trunk named by `SIP_TRUNK_ID`.
pub async fn dial(config: &Config) -> Result<PlacedCall, CommandError> {
    config.validate(Requirement::Dial)?;
    let trunk_id = config.trunk.trunk_id.clone().unwrap_or_default();
    let client = SipClient::new(config.livekit.clone())?;
    Ok(run_dial(client, &trunk_id, &config.call).await?)
}

pub async fn create_trunk(config: &Config) -> Result<TrunkOutcome, CommandError> {
    config.validate(Requirement::OutboundTrunk)?;
    let client = SipClient::new(config.livekit.clone())?;
    Ok(run_create_trunk(client, &config.trunk).await?)
}

/// Creates the inbound trunk and the dispatch rule routing calls to the agent.
pub async fn setup(config: &Config) -> Result<InboundOutcome, CommandError> {
    config.validate(Requirement::InboundSetup)?;
    let client = SipClient::new(config.livekit.clone())?;
    Ok(run_inbound_setup(client, &config.inbound, &config.dispatch).await?)
}

/// Runs the agent worker until `shutdown` resolves.
pub async fn agent<F>(config: &Config, shutdown: F) -> Result<(), CommandError>
where
    F: Future<Output = ()>,
{
    config.validate(Requirement::Agent)?;
    let factory = PluginFactory::new(config.providers.clone());
    factory.validate()?;

    let dispatcher =
        LiveKitDispatcher::new(config.livekit.clone(), config.agent.clone(), Arc::new(factory));
    Worker::new(
        dispatcher,
        config.agent.room_prefix.clone(),
        config.agent.poll_interval(),
    )
    .run(shutdown)
    .await;
    Ok(())
}

/// Human-readable summary of a successful command.
pub fn describe_trunk(outcome: &TrunkOutcome) -> String {
    match outcome {
        TrunkOutcome::Created(id) => format!("Outbound trunk created: {}", id),
        TrunkOutcome::Existing(id) => format!("Outbound trunk already exists: {}", id),
    }
}

pub fn describe_inbound(outcome: &InboundOutcome) -> String {
    match outcome {
        InboundOutcome::Configured { trunk_id, rule_id } => format!(
            "Inbound trunk created: {}\nDispatch rule created: {}",
            trunk_id, rule_id
        ),
        InboundOutcome::AlreadyConfigured { trunk_id: Some(id) } => format!(
            "Inbound trunk created: {}\nDispatch rule already exists; inbound calls are already routed",
            id
        ),
        InboundOutcome::AlreadyConfigured { trunk_id: None } => {
            "Inbound trunk already exists; inbound calls are already routed".to_string()
        }
    }
}
