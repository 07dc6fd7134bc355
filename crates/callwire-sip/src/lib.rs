//! SIP control plane for callwire.
//!
//! Talks to LiveKit's `livekit.SIP` Twirp service to provision outbound and
//! inbound trunks, create dispatch rules and dial out. Errors keep the
//! structured Twirp code and metadata so callers can tell an idempotent
//! "already exists" or a busy callee apart from authentication and network
//! failures.

pub mod client;
pub mod config;
pub mod error;
pub mod provision;
pub mod report;
pub mod twirp;
pub mod types;

pub use client::{CallRequest, ControlPlane, PlacedCall, SipClient};
pub use config::{
    CallConfig, DispatchRuleConfig, InboundTrunkConfig, LiveKitConfig, OutboundTrunkConfig,
};
pub use error::{SipError, SipStatus, TwirpCode, TwirpError};
pub use provision::{
    call_request, run_create_trunk, run_dial, run_inbound_setup, run_outbound_call,
    setup_inbound, CallState, InboundOutcome, OutboundCall, OutboundSequence, ProvisionError,
    TrunkOutcome,
};
pub use report::FailureReport;
