use crate::config::{DispatchRuleConfig, InboundTrunkConfig, LiveKitConfig, OutboundTrunkConfig};
use crate::error::SipError;
use crate::twirp::TwirpClient;
use crate::types::{
    CreateSipDispatchRuleRequest, CreateSipInboundTrunkRequest, CreateSipOutboundTrunkRequest,
    CreateSipParticipantRequest, ListSipOutboundTrunkRequest, ListSipOutboundTrunkResponse,
    SipDispatchRule, SipDispatchRuleIndividual, SipDispatchRuleInfo, SipInboundTrunkInfo,
    SipOutboundTrunkInfo, SipParticipantInfo,
};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

const SIP_SERVICE: &str = "livekit.SIP";

/// A request to dial out through a provisioned trunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub trunk_id: String,
    pub to: String,
    pub room_name: String,
    pub participant_identity: String,
    pub participant_name: String,
    pub krisp_enabled: bool,
    pub wait_until_answered: bool,
    pub ringing_timeout: Option<Duration>,
}

/// Identifiers of a call the control plane accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacedCall {
    pub call_id: String,
    pub participant_id: String,
    pub participant_identity: String,
    pub room_name: String,
}

impl fmt::Display for PlacedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SIP Call ID: {}", self.call_id)?;
        writeln!(f, "Participant ID: {}", self.participant_id)?;
        write!(f, "Room: {}", self.room_name)
    }
}

impl From<SipParticipantInfo> for PlacedCall {
    fn from(info: SipParticipantInfo) -> Self {
        Self {
            call_id: info.sip_call_id,
            participant_id: info.participant_id,
            participant_identity: info.participant_identity,
            room_name: info.room_name,
        }
    }
}

/// Management operations against the telephony control plane.
///
/// The handle owns a network connection. `close` consumes it, so a handle is
/// released at most once and cannot be used afterwards.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn create_outbound_trunk(&self, trunk: &OutboundTrunkConfig) -> Result<String, SipError>;

    async fn create_inbound_trunk(&self, trunk: &InboundTrunkConfig) -> Result<String, SipError>;

    async fn create_dispatch_rule(
        &self,
        trunk_id: &str,
        rule: &DispatchRuleConfig,
    ) -> Result<String, SipError>;

    /// Dials out. With `wait_until_answered` this resolves only once the
    /// callee picks up or the call fails.
    async fn create_call_participant(&self, request: &CallRequest) -> Result<PlacedCall, SipError>;

    async fn list_outbound_trunks(&self) -> Result<Vec<SipOutboundTrunkInfo>, SipError>;

    async fn close(self);
}

/// LiveKit implementation of [`ControlPlane`].
#[derive(Debug)]
pub struct SipClient {
    twirp: TwirpClient,
}

impl SipClient {
    pub fn new(config: LiveKitConfig) -> Result<Self, SipError> {
        let twirp = TwirpClient::new(config)?;
        tracing::debug!(base_url = twirp.base_url(), "opened control plane client");
        Ok(Self { twirp })
    }
}

#[async_trait]
impl ControlPlane for SipClient {
    async fn create_outbound_trunk(&self, trunk: &OutboundTrunkConfig) -> Result<String, SipError> {
        let request = CreateSipOutboundTrunkRequest {
            trunk: SipOutboundTrunkInfo {
                sip_trunk_id: String::new(),
                name: trunk.name.clone(),
                address: trunk.address.clone(),
                numbers: trunk.numbers.clone(),
                auth_username: trunk.auth_username.clone(),
                auth_password: trunk.auth_password.clone(),
            },
        };

        let info: SipOutboundTrunkInfo = self
            .twirp
            .call(SIP_SERVICE, "CreateSIPOutboundTrunk", &request)
            .await?;
        tracing::info!(trunk_id = %info.sip_trunk_id, address = %trunk.address, "outbound trunk created");
        Ok(info.sip_trunk_id)
    }

    async fn create_inbound_trunk(&self, trunk: &InboundTrunkConfig) -> Result<String, SipError> {
        let request = CreateSipInboundTrunkRequest {
            trunk: SipInboundTrunkInfo {
                sip_trunk_id: String::new(),
                name: trunk.name.clone(),
                numbers: trunk.numbers.clone(),
            },
        };

        let info: SipInboundTrunkInfo = self
            .twirp
            .call(SIP_SERVICE, "CreateSIPInboundTrunk", &request)
            .await?;
        tracing::info!(trunk_id = %info.sip_trunk_id, "inbound trunk created");
        Ok(info.sip_trunk_id)
    }

    async fn create_dispatch_rule(
        &self,
        trunk_id: &str,
        rule: &DispatchRuleConfig,
    ) -> Result<String, SipError> {
        let request = CreateSipDispatchRuleRequest {
            dispatch_rule: SipDispatchRuleInfo {
                sip_dispatch_rule_id: String::new(),
                name: rule.name.clone(),
                trunk_ids: vec![trunk_id.to_string()],
                rule: Some(SipDispatchRule {
                    dispatch_rule_individual: Some(SipDispatchRuleIndividual {
                        room_prefix: rule.room_prefix.clone(),
                    }),
                }),
                hide_phone_number: rule.hide_phone_number,
            },
        };

        let info: SipDispatchRuleInfo = self
            .twirp
            .call(SIP_SERVICE, "CreateSIPDispatchRule", &request)
            .await?;
        tracing::info!(rule_id = %info.sip_dispatch_rule_id, trunk_id, "dispatch rule created");
        Ok(info.sip_dispatch_rule_id)
    }

    async fn create_call_participant(&self, request: &CallRequest) -> Result<PlacedCall, SipError> {
        let body = CreateSipParticipantRequest {
            sip_trunk_id: request.trunk_id.clone(),
            sip_call_to: request.to.clone(),
            room_name: request.room_name.clone(),
            participant_identity: request.participant_identity.clone(),
            participant_name: request.participant_name.clone(),
            krisp_enabled: request.krisp_enabled,
            wait_until_answered: request.wait_until_answered,
            ringing_timeout: request
                .ringing_timeout
                .map(|timeout| format!("{}s", timeout.as_secs())),
        };

        let info: SipParticipantInfo = self
            .twirp
            .call(SIP_SERVICE, "CreateSIPParticipant", &body)
            .await?;
        tracing::info!(
            call_id = %info.sip_call_id,
            room = %info.room_name,
            "call participant created"
        );
        Ok(info.into())
    }

    async fn list_outbound_trunks(&self) -> Result<Vec<SipOutboundTrunkInfo>, SipError> {
        let response: ListSipOutboundTrunkResponse = self
            .twirp
            .call(SIP_SERVICE, "ListSIPOutboundTrunk", &ListSipOutboundTrunkRequest {})
            .await?;
        Ok(response.items)
    }

    async fn close(self) {
        tracing::debug!(base_url = self.twirp.base_url(), "closing control plane client");
    }
}
