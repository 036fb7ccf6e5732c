//! Relay configuration fetch against a mock server.

#![cfg(feature = "http")]

use std::time::Duration;

use pairkit_lib::ice::RelayConfigClient;
use pairkit_lib::{IceConfig, IceTransportPolicy};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> RelayConfigClient {
    RelayConfigClient::new(Duration::from_millis(500)).unwrap()
}

#[tokio::test]
async fn test_fetches_ice_conf_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ice-conf.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "iceServers": [
                { "urls": "stun:stun.example.com:3478" },
                {
                    "urls": ["turn:turn.example.com:3478?transport=udp"],
                    "username": "user",
                    "credential": "pass"
                }
            ],
            "iceTransportPolicy": "relay"
        })))
        .mount(&mock_server)
        .await;

    let config = client().fetch_or_default(Some(&mock_server.uri())).await;

    assert_eq!(config.ice_servers.len(), 2);
    assert_eq!(config.ice_servers[1].username.as_deref(), Some("user"));
    assert_eq!(config.ice_transport_policy, Some(IceTransportPolicy::Relay));
    assert!(config.is_relay_only());
}

#[tokio::test]
async fn test_policy_is_optional() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/custom.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "iceServers": [{ "urls": "stun:stun.example.com:3478" }]
        })))
        .mount(&mock_server)
        .await;

    let url = format!("{}/custom.json", mock_server.uri());
    let config = client().fetch(&url).await.unwrap();
    assert_eq!(config.ice_transport_policy, None);
}

#[tokio::test]
async fn test_not_found_falls_back_to_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ice-conf.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = client();
    assert!(client.fetch(&mock_server.uri()).await.is_err());
    assert_eq!(
        client.fetch_or_default(Some(&mock_server.uri())).await,
        IceConfig::default()
    );
}

#[tokio::test]
async fn test_malformed_body_falls_back_to_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ice-conf.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&mock_server)
        .await;

    let config = client().fetch_or_default(Some(&mock_server.uri())).await;
    assert_eq!(config, IceConfig::default());
}

#[tokio::test]
async fn test_slow_endpoint_falls_back_to_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ice-conf.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "iceServers": [] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let config = client().fetch_or_default(Some(&mock_server.uri())).await;
    assert_eq!(config, IceConfig::default());
}
