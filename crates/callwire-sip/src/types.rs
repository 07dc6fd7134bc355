//! Request and response bodies of the `livekit.SIP` Twirp service.
//!
//! Field names follow the protobuf names; the server emits them in
//! snake_case. Every response field is defaulted so that fields added by
//! newer servers, or omitted zero values, never fail decoding.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SipOutboundTrunkInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sip_trunk_id: String,
    pub name: String,
    pub address: String,
    pub numbers: Vec<String>,
    pub auth_username: String,
    pub auth_password: String,
}

impl fmt::Debug for SipOutboundTrunkInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SipOutboundTrunkInfo")
            .field("sip_trunk_id", &self.sip_trunk_id)
            .field("name", &self.name)
            .field("address", &self.address)
            .field("numbers", &self.numbers)
            .field("auth_username", &self.auth_username)
            .field("auth_password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSipOutboundTrunkRequest {
    pub trunk: SipOutboundTrunkInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SipInboundTrunkInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sip_trunk_id: String,
    pub name: String,
    pub numbers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSipInboundTrunkRequest {
    pub trunk: SipInboundTrunkInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SipDispatchRuleIndividual {
    pub room_prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SipDispatchRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_rule_individual: Option<SipDispatchRuleIndividual>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SipDispatchRuleInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sip_dispatch_rule_id: String,
    pub name: String,
    pub trunk_ids: Vec<String>,
    pub rule: Option<SipDispatchRule>,
    pub hide_phone_number: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSipDispatchRuleRequest {
    pub dispatch_rule: SipDispatchRuleInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSipParticipantRequest {
    pub sip_trunk_id: String,
    pub sip_call_to: String,
    pub room_name: String,
    pub participant_identity: String,
    pub participant_name: String,
    pub krisp_enabled: bool,
    pub wait_until_answered: bool,
    /// Protobuf JSON duration, e.g. `"30s"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ringing_timeout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SipParticipantInfo {
    pub participant_id: String,
    pub participant_identity: String,
    pub room_name: String,
    pub sip_call_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListSipOutboundTrunkRequest {}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListSipOutboundTrunkResponse {
    pub items: Vec<SipOutboundTrunkInfo>,
}
