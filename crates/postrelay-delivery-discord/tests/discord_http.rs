//! HTTP-level tests against a mock webhook, including the core retry loop

use postrelay_core::traits::{DeliveryResponse, DeliveryTransport, Item};
use postrelay_core::{DeliveryClient, Error, FormattedPayload, PostFormatter, RetryPolicy};
use postrelay_delivery_discord::DiscordTransport;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOOK_PATH: &str = "/api/webhooks/1/token";

fn transport(server: &MockServer) -> DiscordTransport {
    DiscordTransport::new(format!("{}{}", server.uri(), HOOK_PATH)).unwrap()
}

fn payload() -> FormattedPayload {
    let item = Item::new("abc123", "https://www.instagram.com/p/abc123/").with_caption(Some("caption".into()));
    PostFormatter::new("somehandle", 4).format(&item)
}

#[tokio::test]
async fn no_content_is_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HOOK_PATH))
        .and(body_partial_json(json!({
            "allowed_mentions": { "parse": [] },
            "embeds": [ { "footer": { "text": "Post abc123" } } ]
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let response = transport(&server).send(&payload()).await.unwrap();
    assert_eq!(response, DeliveryResponse::Delivered);
}

#[tokio::test]
async fn rate_limit_reads_retry_after_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HOOK_PATH))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0.5"))
        .mount(&server)
        .await;

    let response = transport(&server).send(&payload()).await.unwrap();
    assert_eq!(
        response,
        DeliveryResponse::RateLimited {
            retry_after: Duration::from_millis(500)
        }
    );
}

#[tokio::test]
async fn rate_limit_reads_body_when_header_missing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HOOK_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({ "retry_after": 0.1, "global": false })))
        .mount(&server)
        .await;

    let response = transport(&server).send(&payload()).await.unwrap();
    assert_eq!(
        response,
        DeliveryResponse::RateLimited {
            retry_after: Duration::from_millis(100)
        }
    );
}

#[tokio::test]
async fn server_error_is_transient_and_client_error_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HOOK_PATH))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(HOOK_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("Invalid Form Body"))
        .mount(&server)
        .await;

    let transport = transport(&server);

    let first = transport.send(&payload()).await.unwrap();
    assert!(matches!(first, DeliveryResponse::Transient { status: Some(502), .. }));

    let second = transport.send(&payload()).await.unwrap();
    assert!(matches!(second, DeliveryResponse::Rejected { status: 400, ref message } if message.contains("Invalid Form Body")));
}

#[tokio::test]
async fn unreachable_endpoint_is_transient() {
    let transport = DiscordTransport::new("http://127.0.0.1:9/api/webhooks/1/token")
        .unwrap()
        .with_timeout(Duration::from_millis(500));

    let response = transport.send(&payload()).await.unwrap();
    assert!(matches!(response, DeliveryResponse::Transient { status: None, .. }));
}

#[tokio::test]
async fn client_retries_rate_limit_then_delivers_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HOOK_PATH))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(HOOK_PATH))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = DeliveryClient::new(
        Box::new(transport(&server)),
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(50)),
    );

    let attempts = client.deliver(&payload()).await.unwrap();
    assert_eq!(attempts, 2);
}

#[tokio::test]
async fn client_gives_up_after_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HOOK_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let client = DeliveryClient::new(
        Box::new(transport(&server)),
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(10)),
    );

    let err = client.deliver(&payload()).await.unwrap_err();
    assert!(matches!(err, Error::DeliveryExhausted { attempts: 3, .. }), "got {err}");
    assert!(!err.to_string().contains("token"));
}
