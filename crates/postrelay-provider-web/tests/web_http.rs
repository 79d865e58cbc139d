//! HTTP-level tests against a mock web profile endpoint

use postrelay_core::Error;
use postrelay_core::traits::ProviderClient;
use postrelay_provider_web::WebProfileProvider;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROFILE_PATH: &str = "/api/v1/users/web_profile_info/";

fn provider(server: &MockServer, session: Option<&str>) -> WebProfileProvider {
    WebProfileProvider::new(session.map(str::to_string))
        .unwrap()
        .with_endpoint(format!("{}{}", server.uri(), PROFILE_PATH))
}

fn profile_body() -> serde_json::Value {
    json!({
        "data": { "user": {
            "is_private": false,
            "edge_owner_to_timeline_media": { "edges": [
                { "node": {
                    "shortcode": "Cnew",
                    "display_url": "https://cdn.example.com/new.jpg",
                    "edge_media_to_caption": { "edges": [ { "node": { "text": "Derby day" } } ] }
                } },
                { "node": { "shortcode": "Cold", "is_video": true } },
                { "node": { "shortcode": "Colder" } }
            ] }
        } },
        "status": "ok"
    })
}

#[tokio::test]
async fn reads_timeline_newest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .and(query_param("username", "somehandle"))
        .and(header("x-ig-app-id", "936619743392459"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .expect(1)
        .mount(&server)
        .await;

    let items = provider(&server, None)
        .fetch_latest("somehandle", 2, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].key, "Cnew");
    assert_eq!(items[0].caption.as_deref(), Some("Derby day"));
    assert_eq!(items[0].image_url.as_deref(), Some("https://cdn.example.com/new.jpg"));
    assert_eq!(items[1].key, "Cold");
}

#[tokio::test]
async fn session_cookie_is_sent_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .and(header("cookie", "sessionid=abc%3A123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .expect(1)
        .mount(&server)
        .await;

    let items = provider(&server, Some("abc%3A123"))
        .fetch_latest("somehandle", 1, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn rate_limit_is_an_upstream_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = provider(&server, None)
        .fetch_latest("somehandle", 1, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ProviderUpstream { ref provider, .. } if provider == "web"));
    assert!(err.to_string().contains("429"), "{err}");
}

#[tokio::test]
async fn missing_user_is_profile_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "user": null }, "status": "ok" })))
        .mount(&server)
        .await;

    let err = provider(&server, None)
        .fetch_latest("ghost", 1, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Profile not found: ghost"), "{err}");
}

#[tokio::test]
async fn private_profile_without_posts_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "user": { "is_private": true, "edge_owner_to_timeline_media": { "edges": [] } } }
        })))
        .mount(&server)
        .await;

    let err = provider(&server, None)
        .fetch_latest("locked", 1, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("private"), "{err}");
}
