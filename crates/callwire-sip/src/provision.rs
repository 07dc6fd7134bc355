//! Provisioning sequences built on top of [`ControlPlane`].
//!
//! Outbound calls move through `Unprovisioned -> TrunkReady -> CallPlaced`;
//! the trunk id obtained in the first step is the only input carried into the
//! second. Inbound setup creates a trunk and then a dispatch rule for it.
//!
//! The `run_*` functions take ownership of the client and close it on every
//! exit path before returning the sequence's result.

use crate::client::{CallRequest, ControlPlane, PlacedCall};
use crate::config::{CallConfig, DispatchRuleConfig, InboundTrunkConfig, OutboundTrunkConfig};
use crate::error::SipError;
use thiserror::Error;

/// How the outbound trunk id was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrunkOutcome {
    Created(String),
    /// Creation reported `already_exists`; the id was resolved from
    /// configuration or from the existing trunks.
    Existing(String),
}

impl TrunkOutcome {
    pub fn trunk_id(&self) -> &str {
        match self {
            Self::Created(id) | Self::Existing(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallState {
    Unprovisioned,
    TrunkReady(TrunkOutcome),
    CallPlaced {
        trunk: TrunkOutcome,
        call: PlacedCall,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    Configured { trunk_id: String, rule_id: String },
    /// The trunk or rule existed already. `trunk_id` is set when the trunk was
    /// created in this run and only the rule conflicted.
    AlreadyConfigured { trunk_id: Option<String> },
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("outbound trunk provisioning failed: {0}")]
    Trunk(#[source] SipError),

    #[error("outbound trunk already exists and no matching trunk id could be resolved")]
    TrunkUnresolved,

    #[error("no trunk provisioned; create or configure a trunk before placing a call")]
    NotProvisioned,

    #[error("call through trunk {trunk_id} failed: {source}")]
    Call {
        trunk_id: String,
        #[source]
        source: SipError,
    },

    #[error("inbound trunk provisioning failed: {0}")]
    InboundTrunk(#[source] SipError),

    #[error("dispatch rule for trunk {trunk_id} failed: {source}")]
    DispatchRule {
        trunk_id: String,
        #[source]
        source: SipError,
    },
}

impl ProvisionError {
    /// Underlying control-plane error, if the failure came from a remote call.
    pub fn sip_error(&self) -> Option<&SipError> {
        match self {
            Self::Trunk(e) | Self::InboundTrunk(e) => Some(e),
            Self::Call { source, .. } | Self::DispatchRule { source, .. } => Some(source),
            Self::TrunkUnresolved | Self::NotProvisioned => None,
        }
    }
}

/// Outbound call sequence over a borrowed client.
pub struct OutboundSequence<'a, C: ?Sized> {
    client: &'a C,
    trunk: &'a OutboundTrunkConfig,
    call: &'a CallConfig,
    state: CallState,
}

impl<'a, C: ControlPlane + ?Sized> OutboundSequence<'a, C> {
    pub fn new(client: &'a C, trunk: &'a OutboundTrunkConfig, call: &'a CallConfig) -> Self {
        Self {
            client,
            trunk,
            call,
            state: CallState::Unprovisioned,
        }
    }

    /// Starts in `TrunkReady` with a trunk provisioned by an earlier run.
    pub fn with_existing_trunk(
        client: &'a C,
        trunk: &'a OutboundTrunkConfig,
        call: &'a CallConfig,
        trunk_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            trunk,
            call,
            state: CallState::TrunkReady(TrunkOutcome::Existing(trunk_id.into())),
        }
    }

    pub fn state(&self) -> &CallState {
        &self.state
    }

    pub fn into_state(self) -> CallState {
        self.state
    }

    /// `Unprovisioned -> TrunkReady`. A no-op when a trunk is already ready.
    pub async fn provision_trunk(&mut self) -> Result<&TrunkOutcome, ProvisionError> {
        if let CallState::Unprovisioned = self.state {
            tracing::info!(name = %self.trunk.name, address = %self.trunk.address, "creating outbound trunk");
            let outcome = match self.client.create_outbound_trunk(self.trunk).await {
                Ok(trunk_id) => TrunkOutcome::Created(trunk_id),
                Err(e) if e.is_already_exists() => {
                    tracing::info!("outbound trunk already exists, resolving its id");
                    TrunkOutcome::Existing(self.resolve_existing_trunk().await?)
                }
                Err(e) => return Err(ProvisionError::Trunk(e)),
            };
            self.state = CallState::TrunkReady(outcome);
        }

        match &self.state {
            CallState::TrunkReady(trunk) | CallState::CallPlaced { trunk, .. } => Ok(trunk),
            CallState::Unprovisioned => Err(ProvisionError::NotProvisioned),
        }
    }

    /// `TrunkReady -> CallPlaced`. On failure the sequence stays in `TrunkReady`.
    pub async fn place_call(&mut self) -> Result<&PlacedCall, ProvisionError> {
        if let CallState::TrunkReady(trunk) = &self.state {
            let trunk = trunk.clone();
            let request = call_request(trunk.trunk_id(), self.call);
            tracing::info!(to = %request.to, room = %request.room_name, trunk_id = %request.trunk_id, "placing call");

            let placed = self
                .client
                .create_call_participant(&request)
                .await
                .map_err(|source| ProvisionError::Call {
                    trunk_id: request.trunk_id.clone(),
                    source,
                })?;

            self.state = CallState::CallPlaced {
                trunk,
                call: placed,
            };
        }

        match &self.state {
            CallState::CallPlaced { call, .. } => Ok(call),
            _ => Err(ProvisionError::NotProvisioned),
        }
    }

    async fn resolve_existing_trunk(&self) -> Result<String, ProvisionError> {
        if let Some(id) = self.trunk.trunk_id.as_deref().filter(|id| !id.is_empty()) {
            return Ok(id.to_string());
        }

        let trunks = self
            .client
            .list_outbound_trunks()
            .await
            .map_err(ProvisionError::Trunk)?;

        trunks
            .into_iter()
            .find(|existing| {
                existing.address == self.trunk.address
                    && self
                        .trunk
                        .numbers
                        .iter()
                        .all(|number| existing.numbers.contains(number))
            })
            .map(|existing| existing.sip_trunk_id)
            .filter(|id| !id.is_empty())
            .ok_or(ProvisionError::TrunkUnresolved)
    }
}

/// Builds the dial request for `call` through `trunk_id`.
pub fn call_request(trunk_id: &str, call: &CallConfig) -> CallRequest {
    CallRequest {
        trunk_id: trunk_id.to_string(),
        to: call.to.clone(),
        room_name: call.room_name(),
        participant_identity: call.participant_identity.clone(),
        participant_name: call.participant_name.clone(),
        krisp_enabled: call.krisp_enabled,
        wait_until_answered: call.wait_until_answered,
        ringing_timeout: call.ringing_timeout(),
    }
}

/// Creates the inbound trunk and its dispatch rule.
pub async fn setup_inbound<C: ControlPlane + ?Sized>(
    client: &C,
    trunk: &InboundTrunkConfig,
    rule: &DispatchRuleConfig,
) -> Result<InboundOutcome, ProvisionError> {
    tracing::info!(name = %trunk.name, "creating inbound trunk");
    let trunk_id = match client.create_inbound_trunk(trunk).await {
        Ok(id) => id,
        Err(e) if e.is_already_exists() => {
            tracing::info!("inbound trunk already exists");
            return Ok(InboundOutcome::AlreadyConfigured { trunk_id: None });
        }
        Err(e) => return Err(ProvisionError::InboundTrunk(e)),
    };

    tracing::info!(name = %rule.name, trunk_id = %trunk_id, "creating dispatch rule");
    match client.create_dispatch_rule(&trunk_id, rule).await {
        Ok(rule_id) => Ok(InboundOutcome::Configured { trunk_id, rule_id }),
        Err(e) if e.is_already_exists() => {
            tracing::info!("dispatch rule already exists");
            Ok(InboundOutcome::AlreadyConfigured {
                trunk_id: Some(trunk_id),
            })
        }
        Err(source) => Err(ProvisionError::DispatchRule { trunk_id, source }),
    }
}

/// Completed outbound sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCall {
    pub trunk: TrunkOutcome,
    pub call: PlacedCall,
}

/// Provisions the trunk, places the call, then closes the client.
pub async fn run_outbound_call<C: ControlPlane>(
    client: C,
    trunk: &OutboundTrunkConfig,
    call: &CallConfig,
) -> Result<OutboundCall, ProvisionError> {
    let result = outbound_call(&client, trunk, call).await;
    client.close().await;
    result
}

async fn outbound_call<C: ControlPlane>(
    client: &C,
    trunk: &OutboundTrunkConfig,
    call: &CallConfig,
) -> Result<OutboundCall, ProvisionError> {
    let mut sequence = OutboundSequence::new(client, trunk, call);
    sequence.provision_trunk().await?;
    sequence.place_call().await?;
    match sequence.into_state() {
        CallState::CallPlaced { trunk, call } => Ok(OutboundCall { trunk, call }),
        _ => Err(ProvisionError::NotProvisioned),
    }
}

/// Places a call through an already provisioned trunk, then closes the client.
pub async fn run_dial<C: ControlPlane>(
    client: C,
    trunk_id: &str,
    call: &CallConfig,
) -> Result<PlacedCall, ProvisionError> {
    let trunk = OutboundTrunkConfig::default();
    let result = {
        let mut sequence = OutboundSequence::with_existing_trunk(&client, &trunk, call, trunk_id);
        sequence.place_call().await.map(|placed| placed.clone())
    };
    client.close().await;
    result
}

/// Creates (or resolves) the outbound trunk only, then closes the client.
pub async fn run_create_trunk<C: ControlPlane>(
    client: C,
    trunk: &OutboundTrunkConfig,
) -> Result<TrunkOutcome, ProvisionError> {
    let call = CallConfig::default();
    let result = {
        let mut sequence = OutboundSequence::new(&client, trunk, &call);
        sequence.provision_trunk().await.map(|outcome| outcome.clone())
    };
    client.close().await;
    result
}

/// Runs inbound setup, then closes the client.
pub async fn run_inbound_setup<C: ControlPlane>(
    client: C,
    trunk: &InboundTrunkConfig,
    rule: &DispatchRuleConfig,
) -> Result<InboundOutcome, ProvisionError> {
    let result = setup_inbound(&client, trunk, rule).await;
    client.close().await;
    result
}
