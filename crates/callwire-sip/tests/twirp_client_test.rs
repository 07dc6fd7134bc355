use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use callwire_sip::{
    CallRequest, ControlPlane, DispatchRuleConfig, FailureReport, LiveKitConfig,
    OutboundTrunkConfig, SipClient, TwirpCode,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const API_KEY: &str = "devkey";
const API_SECRET: &str = "devsecret-devsecret-devsecret-00";

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string()
}

async fn create_trunk(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    captured
        .requests
        .lock()
        .unwrap()
        .push((bearer(&headers), body.clone()));
    let mut trunk = body["trunk"].clone();
    trunk["sip_trunk_id"] = json!("TR_1");
    Json(trunk)
}

async fn create_participant(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["sip_call_to"] == "+15550000486" {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "code": "unavailable",
                "msg": "twirp error unknown: INVITE failed",
                "meta": { "sip_status_code": "486", "sip_status": "Busy Here" }
            })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "participant_id": "PA_1",
            "participant_identity": body["participant_identity"],
            "room_name": body["room_name"],
            "sip_call_id": "SCL_1"
        })),
    )
}

async fn create_rule_conflict() -> (StatusCode, Json<Value>) {
    (
        StatusCode::CONFLICT,
        Json(json!({ "code": "already_exists", "msg": "dispatch rule already exists" })),
    )
}

fn app(captured: Captured) -> Router {
    Router::new()
        .route("/twirp/livekit.SIP/CreateSIPOutboundTrunk", post(create_trunk))
        .route(
            "/twirp/livekit.SIP/CreateSIPParticipant",
            post(create_participant),
        )
        .route(
            "/twirp/livekit.SIP/CreateSIPDispatchRule",
            post(create_rule_conflict),
        )
        .with_state(captured)
}

fn client(url: &str) -> SipClient {
    SipClient::new(LiveKitConfig::new(url, API_KEY, API_SECRET)).expect("client")
}

fn call_request(to: &str) -> CallRequest {
    CallRequest {
        trunk_id: "TR_1".to_string(),
        to: to.to_string(),
        room_name: "call-test".to_string(),
        participant_identity: "ai-caller".to_string(),
        participant_name: "AI Assistant".to_string(),
        krisp_enabled: true,
        wait_until_answered: true,
        ringing_timeout: None,
    }
}

#[tokio::test]
async fn outbound_trunk_request_is_sent_with_sip_grants() {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
    use serde::Deserialize;

    let captured = Captured::default();
    let url = spawn_server(app(captured.clone())).await;
    let client = client(&url);

    let trunk = OutboundTrunkConfig {
        address: "demo.pstn.example.com".to_string(),
        numbers: vec!["+15551230000".to_string()],
        auth_username: "user".to_string(),
        auth_password: "pass".to_string(),
        ..Default::default()
    };
    let trunk_id = client.create_outbound_trunk(&trunk).await.unwrap();
    assert_eq!(trunk_id, "TR_1");
    client.close().await;

    let requests = captured.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let (token, body) = &requests[0];
    assert_eq!(
        body,
        &json!({
            "trunk": {
                "name": "Twilio Outbound",
                "address": "demo.pstn.example.com",
                "numbers": ["+15551230000"],
                "auth_username": "user",
                "auth_password": "pass"
            }
        })
    );

    #[derive(Deserialize)]
    struct Claims {
        iss: String,
        sip: SipClaims,
    }

    #[derive(Deserialize)]
    struct SipClaims {
        admin: bool,
        call: bool,
    }

    let key = DecodingKey::from_secret(API_SECRET.as_bytes());
    let data = decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256))
        .expect("token should verify with the API secret");
    assert_eq!(data.claims.iss, API_KEY);
    assert!(data.claims.sip.admin);
    assert!(data.claims.sip.call);
}

#[tokio::test]
async fn participant_response_is_mapped() {
    let url = spawn_server(app(Captured::default())).await;
    let client = client(&url);

    let placed = client
        .create_call_participant(&call_request("+15559870000"))
        .await
        .unwrap();
    assert_eq!(placed.call_id, "SCL_1");
    assert_eq!(placed.participant_id, "PA_1");
    assert_eq!(placed.room_name, "call-test");
}

#[tokio::test]
async fn busy_callee_surfaces_sip_status() {
    let url = spawn_server(app(Captured::default())).await;
    let client = client(&url);

    let err = client
        .create_call_participant(&call_request("+15550000486"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(TwirpCode::Unavailable));
    let status = err.sip_status().expect("sip status in metadata");
    assert_eq!(status.code, 486);
    assert_eq!(status.reason, "Busy Here");
    assert!(FailureReport::from_error(&err).hint().is_some());
}

#[tokio::test]
async fn conflict_is_classified_as_already_exists() {
    let url = spawn_server(app(Captured::default())).await;
    let client = client(&url);

    let err = client
        .create_dispatch_rule("TR_1", &DispatchRuleConfig::default())
        .await
        .unwrap_err();
    assert!(err.is_already_exists());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let url = spawn_server(app(Captured::default())).await;
    let client = client(&url);

    let err = client.list_outbound_trunks().await.unwrap_err();
    assert_eq!(err.code(), Some(TwirpCode::NotFound));
}
