//! URL probe and notification sender behavior against a local HTTP stub.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Redirect;
use axum::routing::{get, head, post};
use axum::{Json, Router};
use serde_json::Value;

use ipmon::notifications::models::ChannelConfig;
use ipmon::notifications::senders::ntfy::NtfySender;
use ipmon::notifications::senders::smsbox::SmsboxSender;
use ipmon::notifications::senders::{NotificationSender, SenderError};
use ipmon::notifications::service::NotificationService;
use ipmon::probe::{Prober, SystemProber};

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn probe_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}

fn check_stub() -> Router {
    Router::new()
        .route("/ok", get(|| async { "ok" }))
        .route(
            "/get-only",
            head(|| async { StatusCode::METHOD_NOT_ALLOWED }).get(|| async { "ok" }),
        )
        .route("/down", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
        .route("/redirect", get(|| async { Redirect::permanent("/ok") }))
}

#[tokio::test]
async fn head_200_is_reachable() {
    let addr = serve(check_stub()).await;
    let prober = SystemProber::new(probe_client());
    assert!(prober.check_url(&format!("http://{addr}/ok")).await);
}

#[tokio::test]
async fn head_rejected_falls_back_to_get() {
    let addr = serve(check_stub()).await;
    let prober = SystemProber::new(probe_client());
    assert!(prober.check_url(&format!("http://{addr}/get-only")).await);
}

#[tokio::test]
async fn non_200_on_both_is_unreachable() {
    let addr = serve(check_stub()).await;
    let prober = SystemProber::new(probe_client());
    assert!(!prober.check_url(&format!("http://{addr}/down")).await);
}

#[tokio::test]
async fn redirects_are_followed() {
    let addr = serve(check_stub()).await;
    let prober = SystemProber::new(probe_client());
    assert!(prober.check_url(&format!("http://{addr}/redirect")).await);
}

#[tokio::test]
async fn bare_host_gets_a_scheme() {
    let addr = serve(check_stub()).await;
    let prober = SystemProber::new(probe_client());
    assert!(prober.check_url(&format!("{addr}/ok")).await);
}

type Captured = Arc<Mutex<Option<Value>>>;

async fn capture_ntfy(State(captured): State<Captured>, Json(body): Json<Value>) -> StatusCode {
    *captured.lock().unwrap() = Some(body);
    StatusCode::OK
}

#[tokio::test]
async fn ntfy_sender_publishes_the_expected_payload() {
    let captured: Captured = Arc::new(Mutex::new(None));
    let app = Router::new()
        .route("/", post(capture_ntfy))
        .with_state(captured.clone());
    let addr = serve(app).await;

    let config = ChannelConfig::Ntfy {
        server: format!("http://{addr}"),
        topic: "monitoring".to_string(),
    };
    NtfySender::new(probe_client())
        .send(&config, "gateway down")
        .await
        .unwrap();

    let body = captured.lock().unwrap().clone().expect("payload captured");
    assert_eq!(body["topic"], "monitoring");
    assert_eq!(body["title"], "IP Monitor");
    assert_eq!(body["message"], "gateway down");
    assert_eq!(body["priority"], 4);
}

#[tokio::test]
async fn ntfy_sender_surfaces_server_errors() {
    let app = Router::new().route(
        "/",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let addr = serve(app).await;

    let config = ChannelConfig::Ntfy {
        server: format!("http://{addr}"),
        topic: "monitoring".to_string(),
    };
    let err = NtfySender::new(probe_client())
        .send(&config, "gateway down")
        .await
        .unwrap_err();
    assert!(matches!(err, SenderError::SendFailed(_)));
}

#[tokio::test]
async fn ntfy_sender_rejects_mismatched_config() {
    let config = ChannelConfig::Smsbox {
        api_key: "key".to_string(),
        recipient: "+33600000000".to_string(),
    };
    let err = NtfySender::new(probe_client())
        .send(&config, "gateway down")
        .await
        .unwrap_err();
    assert!(matches!(err, SenderError::InvalidConfiguration(_)));
}

type SmsCaptured = Arc<Mutex<Option<(String, HashMap<String, String>)>>>;

async fn capture_sms(
    State(captured): State<SmsCaptured>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> String {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    *captured.lock().unwrap() = Some((authorization, params));
    "OK 1 message(s) sent".to_string()
}

#[tokio::test]
async fn smsbox_sender_posts_expert_mode_form() {
    let captured: SmsCaptured = Arc::new(Mutex::new(None));
    let app = Router::new()
        .route("/api.php", post(capture_sms))
        .with_state(captured.clone());
    let addr = serve(app).await;

    let config = ChannelConfig::Smsbox {
        api_key: "secret".to_string(),
        recipient: "+33600000000".to_string(),
    };
    SmsboxSender::new(probe_client())
        .with_api_url(format!("http://{addr}/api.php"))
        .send(&config, "gateway down")
        .await
        .unwrap();

    let (authorization, params) = captured.lock().unwrap().clone().expect("form captured");
    assert_eq!(authorization, "App secret");
    assert_eq!(params["dest"], "+33600000000");
    assert_eq!(params["msg"], "gateway down");
    assert_eq!(params["mode"], "expert");
    assert_eq!(params["strategy"], "2");
    assert_eq!(params["id"], "1");
}

#[tokio::test]
async fn dispatch_delivers_through_the_configured_channel() {
    let captured: Captured = Arc::new(Mutex::new(None));
    let app = Router::new()
        .route("/", post(capture_ntfy))
        .with_state(captured.clone());
    let addr = serve(app).await;

    let service = NotificationService::new(
        ChannelConfig::Ntfy {
            server: format!("http://{addr}"),
            topic: "monitoring".to_string(),
        },
        probe_client(),
    );
    service.dispatch("gateway down").await;

    let body = captured.lock().unwrap().clone().expect("payload captured");
    assert_eq!(body["message"], "gateway down");
}

#[tokio::test]
async fn dispatch_contains_backend_failures() {
    let app = Router::new().route(
        "/",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let addr = serve(app).await;

    let service = NotificationService::new(
        ChannelConfig::Ntfy {
            server: format!("http://{addr}"),
            topic: "monitoring".to_string(),
        },
        probe_client(),
    );
    // A backend failure is logged, never raised
    service.dispatch("gateway down").await;
}

#[tokio::test]
async fn smsbox_sender_treats_error_body_as_failure() {
    let app = Router::new().route("/api.php", post(|| async { "ERROR 02 invalid key" }));
    let addr = serve(app).await;

    let config = ChannelConfig::Smsbox {
        api_key: "secret".to_string(),
        recipient: "+33600000000".to_string(),
    };
    let err = SmsboxSender::new(probe_client())
        .with_api_url(format!("http://{addr}/api.php"))
        .send(&config, "gateway down")
        .await
        .unwrap_err();
    assert!(matches!(err, SenderError::SendFailed(_)));
}
