use async_trait::async_trait;
use callwire_sip::types::SipOutboundTrunkInfo;
use callwire_sip::{
    run_create_trunk, run_dial, run_inbound_setup, run_outbound_call, CallConfig, CallRequest,
    CallState, ControlPlane, DispatchRuleConfig, FailureReport, InboundOutcome,
    InboundTrunkConfig, OutboundSequence, OutboundTrunkConfig, PlacedCall, ProvisionError,
    SipError, TrunkOutcome, TwirpCode, TwirpError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
enum Recorded {
    OutboundTrunk(OutboundTrunkConfig),
    InboundTrunk(InboundTrunkConfig),
    DispatchRule(String, DispatchRuleConfig),
    Call(CallRequest),
    ListTrunks,
}

/// Scripted control plane that records every request it receives.
struct MockControlPlane {
    log: Arc<Mutex<Vec<Recorded>>>,
    closes: Arc<AtomicUsize>,
    outbound_trunk: Result<String, TwirpError>,
    inbound_trunk: Result<String, TwirpError>,
    dispatch_rule: Result<String, TwirpError>,
    call: Result<PlacedCall, TwirpError>,
    existing_trunks: Vec<SipOutboundTrunkInfo>,
}

impl MockControlPlane {
    fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
            outbound_trunk: Ok("TR_1".to_string()),
            inbound_trunk: Ok("ST_IN".to_string()),
            dispatch_rule: Ok("SDR_1".to_string()),
            call: Ok(PlacedCall {
                call_id: "SCL_1".to_string(),
                participant_id: "PA_1".to_string(),
                participant_identity: "ai-caller".to_string(),
                room_name: "call-15559870000".to_string(),
            }),
            existing_trunks: Vec::new(),
        }
    }

    fn record(&self, entry: Recorded) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn create_outbound_trunk(&self, trunk: &OutboundTrunkConfig) -> Result<String, SipError> {
        self.record(Recorded::OutboundTrunk(trunk.clone()));
        self.outbound_trunk.clone().map_err(SipError::from)
    }

    async fn create_inbound_trunk(&self, trunk: &InboundTrunkConfig) -> Result<String, SipError> {
        self.record(Recorded::InboundTrunk(trunk.clone()));
        self.inbound_trunk.clone().map_err(SipError::from)
    }

    async fn create_dispatch_rule(
        &self,
        trunk_id: &str,
        rule: &DispatchRuleConfig,
    ) -> Result<String, SipError> {
        self.record(Recorded::DispatchRule(trunk_id.to_string(), rule.clone()));
        self.dispatch_rule.clone().map_err(SipError::from)
    }

    async fn create_call_participant(&self, request: &CallRequest) -> Result<PlacedCall, SipError> {
        self.record(Recorded::Call(request.clone()));
        self.call.clone().map_err(SipError::from)
    }

    async fn list_outbound_trunks(&self) -> Result<Vec<SipOutboundTrunkInfo>, SipError> {
        self.record(Recorded::ListTrunks);
        Ok(self.existing_trunks.clone())
    }

    async fn close(self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn demo_trunk() -> OutboundTrunkConfig {
    OutboundTrunkConfig {
        name: "Twilio Outbound".to_string(),
        address: "demo.pstn.example.com".to_string(),
        numbers: vec!["+15551230000".to_string()],
        auth_username: "user".to_string(),
        auth_password: "pass".to_string(),
        trunk_id: None,
    }
}

fn demo_call() -> CallConfig {
    CallConfig {
        to: "+15559870000".to_string(),
        ..Default::default()
    }
}

fn calls(log: &Arc<Mutex<Vec<Recorded>>>) -> Vec<CallRequest> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|entry| match entry {
            Recorded::Call(request) => Some(request.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn trunk_id_flows_into_call_request() {
    let mock = MockControlPlane::new();
    let log = mock.log.clone();
    let closes = mock.closes.clone();

    let trunk = demo_trunk();
    let outcome = run_outbound_call(mock, &trunk, &demo_call())
        .await
        .expect("sequence should succeed");

    assert_eq!(outcome.trunk, TrunkOutcome::Created("TR_1".to_string()));
    assert_eq!(outcome.call.call_id, "SCL_1");

    let log = log.lock().unwrap().clone();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], Recorded::OutboundTrunk(trunk));
    match &log[1] {
        Recorded::Call(request) => {
            assert_eq!(request.trunk_id, "TR_1");
            assert_eq!(request.to, "+15559870000");
            assert_eq!(request.room_name, "call-15559870000");
            assert!(request.krisp_enabled);
            assert!(request.wait_until_answered);
        }
        other => panic!("expected call request, got {:?}", other),
    }
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn trunk_request_carries_every_configured_field() {
    let mock = MockControlPlane::new();
    let log = mock.log.clone();

    run_create_trunk(mock, &demo_trunk()).await.unwrap();

    let log = log.lock().unwrap();
    let Recorded::OutboundTrunk(sent) = &log[0] else {
        panic!("expected trunk request, got {:?}", log[0]);
    };
    assert_eq!(sent.name, "Twilio Outbound");
    assert_eq!(sent.address, "demo.pstn.example.com");
    assert_eq!(sent.numbers, vec!["+15551230000".to_string()]);
    assert_eq!(sent.auth_username, "user");
    assert_eq!(sent.auth_password, "pass");
}

#[tokio::test]
async fn trunk_failure_prevents_call_and_still_closes() {
    let mut mock = MockControlPlane::new();
    mock.outbound_trunk = Err(TwirpError::new(
        TwirpCode::Unauthenticated,
        "invalid API key",
    ));
    let log = mock.log.clone();
    let closes = mock.closes.clone();

    let err = run_outbound_call(mock, &demo_trunk(), &demo_call())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Trunk(_)));
    assert_eq!(
        err.sip_error().and_then(SipError::code),
        Some(TwirpCode::Unauthenticated)
    );
    assert!(calls(&log).is_empty(), "no call may be attempted");
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn already_exists_text_with_other_code_aborts() {
    let mut mock = MockControlPlane::new();
    mock.outbound_trunk = Err(TwirpError::new(
        TwirpCode::InvalidArgument,
        "trunk already exists",
    ));
    let log = mock.log.clone();

    let err = run_outbound_call(mock, &demo_trunk(), &demo_call())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Trunk(_)));
    assert!(calls(&log).is_empty());
}

#[tokio::test]
async fn already_exists_uses_configured_trunk_id() {
    let mut mock = MockControlPlane::new();
    mock.outbound_trunk = Err(TwirpError::new(TwirpCode::AlreadyExists, "conflict"));
    let log = mock.log.clone();

    let trunk = OutboundTrunkConfig {
        trunk_id: Some("ST_KNOWN".to_string()),
        ..demo_trunk()
    };
    let outcome = run_outbound_call(mock, &trunk, &demo_call()).await.unwrap();

    assert_eq!(outcome.trunk, TrunkOutcome::Existing("ST_KNOWN".to_string()));
    assert_eq!(calls(&log)[0].trunk_id, "ST_KNOWN");
    assert!(!log.lock().unwrap().contains(&Recorded::ListTrunks));
}

#[tokio::test]
async fn already_exists_resolves_trunk_from_listing() {
    let mut mock = MockControlPlane::new();
    mock.outbound_trunk = Err(TwirpError::new(TwirpCode::AlreadyExists, "conflict"));
    mock.existing_trunks = vec![
        SipOutboundTrunkInfo {
            sip_trunk_id: "ST_OTHER".to_string(),
            address: "other.example.com".to_string(),
            numbers: vec!["+15551230000".to_string()],
            ..Default::default()
        },
        SipOutboundTrunkInfo {
            sip_trunk_id: "ST_MATCH".to_string(),
            address: "demo.pstn.example.com".to_string(),
            numbers: vec!["+15551230000".to_string(), "+15551239999".to_string()],
            ..Default::default()
        },
    ];
    let log = mock.log.clone();

    let outcome = run_outbound_call(mock, &demo_trunk(), &demo_call()).await.unwrap();

    assert_eq!(outcome.trunk.trunk_id(), "ST_MATCH");
    assert_eq!(calls(&log)[0].trunk_id, "ST_MATCH");
}

#[tokio::test]
async fn already_exists_without_match_is_unresolved() {
    let mut mock = MockControlPlane::new();
    mock.outbound_trunk = Err(TwirpError::new(TwirpCode::AlreadyExists, "conflict"));
    let log = mock.log.clone();
    let closes = mock.closes.clone();

    let err = run_outbound_call(mock, &demo_trunk(), &demo_call())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::TrunkUnresolved));
    assert!(calls(&log).is_empty());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn busy_callee_leaves_sequence_trunk_ready() {
    let mut mock = MockControlPlane::new();
    mock.call = Err(TwirpError::new(TwirpCode::Unavailable, "call rejected")
        .with_meta("sip_status_code", "486")
        .with_meta("sip_status", "Busy Here"));

    let trunk = demo_trunk();
    let call = demo_call();
    let mut sequence = OutboundSequence::new(&mock, &trunk, &call);
    sequence.provision_trunk().await.unwrap();

    let err = sequence.place_call().await.unwrap_err();
    assert_eq!(
        sequence.state(),
        &CallState::TrunkReady(TrunkOutcome::Created("TR_1".to_string()))
    );

    let report = FailureReport::from_error(err.sip_error().unwrap());
    assert!(report.is_telephony_failure());
    assert!(report.to_string().contains("busy"));
}

#[tokio::test]
async fn place_call_before_provisioning_is_rejected() {
    let mock = MockControlPlane::new();
    let trunk = demo_trunk();
    let call = demo_call();
    let mut sequence = OutboundSequence::new(&mock, &trunk, &call);

    let err = sequence.place_call().await.unwrap_err();
    assert!(matches!(err, ProvisionError::NotProvisioned));
    assert!(calls(&mock.log).is_empty());
}

#[tokio::test]
async fn dial_uses_given_trunk_and_closes_once() {
    let mock = MockControlPlane::new();
    let log = mock.log.clone();
    let closes = mock.closes.clone();

    let call = CallConfig {
        room_name: Some("outbound-test-call".to_string()),
        participant_identity: "outbound-caller".to_string(),
        participant_name: "Test Caller".to_string(),
        ..demo_call()
    };
    let placed = run_dial(mock, "ST_EXISTING", &call).await.unwrap();
    assert_eq!(placed.participant_id, "PA_1");

    let sent = calls(&log);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].trunk_id, "ST_EXISTING");
    assert_eq!(sent[0].room_name, "outbound-test-call");
    assert_eq!(sent[0].participant_identity, "outbound-caller");
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn inbound_setup_creates_rule_for_new_trunk() {
    let mock = MockControlPlane::new();
    let log = mock.log.clone();
    let closes = mock.closes.clone();

    let trunk = InboundTrunkConfig {
        numbers: vec!["+15551230000".to_string()],
        ..Default::default()
    };
    let outcome = run_inbound_setup(mock, &trunk, &DispatchRuleConfig::default())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        InboundOutcome::Configured {
            trunk_id: "ST_IN".to_string(),
            rule_id: "SDR_1".to_string()
        }
    );
    let log = log.lock().unwrap();
    assert_eq!(
        log[1],
        Recorded::DispatchRule("ST_IN".to_string(), DispatchRuleConfig::default())
    );
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn inbound_setup_treats_existing_trunk_as_configured() {
    let mut mock = MockControlPlane::new();
    mock.inbound_trunk = Err(TwirpError::new(TwirpCode::AlreadyExists, "conflict"));
    let log = mock.log.clone();

    let outcome = run_inbound_setup(
        mock,
        &InboundTrunkConfig::default(),
        &DispatchRuleConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(outcome, InboundOutcome::AlreadyConfigured { trunk_id: None });
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn inbound_setup_surfaces_unknown_trunk_reference() {
    let mut mock = MockControlPlane::new();
    mock.dispatch_rule = Err(TwirpError::new(TwirpCode::NotFound, "trunk not found"));
    let closes = mock.closes.clone();

    let err = run_inbound_setup(
        mock,
        &InboundTrunkConfig::default(),
        &DispatchRuleConfig::default(),
    )
    .await
    .unwrap_err();

    match err {
        ProvisionError::DispatchRule { trunk_id, source } => {
            assert_eq!(trunk_id, "ST_IN");
            assert_eq!(source.code(), Some(TwirpCode::NotFound));
        }
        other => panic!("expected dispatch rule error, got {:?}", other),
    }
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}
