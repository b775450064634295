//! Integration tests for the Smartlogic client against a fake API.

use chrono::TimeZone;
use notifier_core::{ConceptStore, Error};
use notifier_smartlogic::{SmartlogicClient, SmartlogicConfig};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> SmartlogicConfig {
    SmartlogicConfig::new(format!("{}/api", server.uri()), "ModelName", "api-key")
        .with_credentials_url(format!("{}/token", server.uri()))
}

/// Mounts a credentials endpoint handing out the given token.
async fn mount_token_endpoint(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=apikey"))
        .and(body_string_contains("key=api-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "access_token": token })),
        )
        .mount(server)
        .await;
}

async fn api_request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/api")
        .count()
}

#[tokio::test]
async fn test_new_client_acquires_token() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "1234567890").await;

    let client = SmartlogicClient::new(config_for(&server)).await.unwrap();
    assert_eq!(client.access_token().await, "1234567890");
}

#[tokio::test]
async fn test_new_client_tolerates_missing_token_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "1": 1 })))
        .mount(&server)
        .await;

    let client = SmartlogicClient::new(config_for(&server)).await.unwrap();
    assert_eq!(client.access_token().await, "");
}

#[tokio::test]
async fn test_new_client_fails_on_malformed_token_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"1\":}"))
        .mount(&server)
        .await;

    let err = SmartlogicClient::new(config_for(&server)).await.unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));
}

#[tokio::test]
async fn test_new_client_fails_when_credentials_unreachable() {
    let server = MockServer::start().await;
    let config = config_for(&server).with_credentials_url("http://127.0.0.1:1/token");

    let err = SmartlogicClient::new(config).await.unwrap_err();
    assert!(matches!(err, Error::Request(_)));
}

#[tokio::test]
async fn test_get_concept_returns_raw_body() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok").await;

    let concept_body = r#"{"@graph":[{"@id":"http://www.ft.com/thing/u1","skosxl:prefLabel":"One"}]}"#;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_string(concept_body))
        .mount(&server)
        .await;

    let client = SmartlogicClient::new(config_for(&server)).await.unwrap();
    let body = client.get_concept("u1").await.unwrap();
    assert_eq!(body, concept_body.as_bytes());

    // The IRI must survive a double escape inside the path parameter.
    let requests = server.received_requests().await.unwrap();
    let api_req = requests.iter().find(|r| r.url.path() == "/api").unwrap();
    let query = api_req.url.query().unwrap();
    assert!(query.starts_with("path=model:ModelName/%253C"), "query was {}", query);
    assert!(query.contains("&properties=%5B%5D,skosxl:prefLabel/skosxl:literalForm"));
}

#[tokio::test]
async fn test_get_concept_sends_bearer_token() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "sekrit").await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .and(wiremock::matchers::header("Authorization", "Bearer sekrit"))
        .respond_with(ResponseTemplate::new(200).set_body_string("response"))
        .expect(1)
        .mount(&server)
        .await;

    let client = SmartlogicClient::new(config_for(&server)).await.unwrap();
    client.get_concept("u1").await.unwrap();
}

#[tokio::test]
async fn test_get_concept_distinguishes_missing_concept() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok").await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"@graph":[]}"#))
        .mount(&server)
        .await;

    let client = SmartlogicClient::new(config_for(&server)).await.unwrap();
    let err = client.get_concept("missing-uuid").await.unwrap_err();
    match err {
        Error::ConceptNotFound(uuid) => assert_eq!(uuid, "missing-uuid"),
        other => panic!("expected ConceptNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_get_concept_propagates_upstream_status() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok").await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = SmartlogicClient::new(config_for(&server)).await.unwrap();
    let err = client.get_concept("u1").await.unwrap_err();
    assert!(matches!(err, Error::UpstreamStatus { status: 503 }));
}

#[tokio::test]
async fn test_unauthorized_triggers_one_refresh_and_retry() {
    let server = MockServer::start().await;

    // First token for construction, a fresh one for the refresh.
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "access_token": "token-1" })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "access_token": "token-2" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_string("response"))
        .mount(&server)
        .await;

    let client = SmartlogicClient::new(config_for(&server)).await.unwrap();
    let body = client.get_concept("u1").await.unwrap();

    assert_eq!(body, b"response");
    assert_eq!(client.access_token().await, "token-2");
    assert_eq!(api_request_count(&server).await, 2);

    // The counter reset on the 200; the next call goes straight through.
    client.get_concept("u1").await.unwrap();
    assert_eq!(api_request_count(&server).await, 3);
}

#[tokio::test]
async fn test_consecutive_unauthorized_trips_hard_failure() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok").await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = SmartlogicClient::new(config_for(&server)).await.unwrap();

    let err = client.get_concept("u1").await.unwrap_err();
    assert!(matches!(err, Error::TokenExhausted));
    assert_eq!(api_request_count(&server).await, 5);

    // Once tripped, no further upstream traffic happens.
    let err = client.get_concept("u1").await.unwrap_err();
    assert!(matches!(err, Error::TokenExhausted));
    assert_eq!(api_request_count(&server).await, 5);

    let err = client
        .get_changed_concept_list(chrono::Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TokenExhausted));
    assert_eq!(api_request_count(&server).await, 5);
}

#[tokio::test]
async fn test_get_changed_concept_list_filters_and_dedupes() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok").await;

    let graph = serde_json::json!({
        "@graph": [
            { "sem:about": [
                { "@id": "http://www.ft.com/thing/u1" },
                { "@id": "http://www.ft.com/thing/ConceptScheme/s1" }
            ]},
            { "sem:about": [
                { "@id": "http://www.ft.com/thing/u1" },
                { "@id": "http://www.ft.com/ontology/managedlocation/u2" },
                { "@id": "http://example.org/thing/u3" }
            ]}
        ]
    });
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&graph))
        .mount(&server)
        .await;

    let client = SmartlogicClient::new(config_for(&server)).await.unwrap();
    let since = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 3).unwrap();
    let mut uuids = client.get_changed_concept_list(since).await.unwrap();
    uuids.sort();

    assert_eq!(uuids, vec!["u1".to_string(), "u2".to_string()]);
}

#[tokio::test]
async fn test_get_changed_concept_list_query_parameters() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok").await;

    let since = chrono::Utc
        .with_ymd_and_hms(2024, 6, 1, 12, 0, 3)
        .unwrap()
        + chrono::Duration::milliseconds(990);

    Mock::given(method("GET"))
        .and(path("/api"))
        .and(wiremock::matchers::query_param(
            "path",
            "tchmodel:ModelName/teamwork:Change/rdf:instance",
        ))
        .and(wiremock::matchers::query_param("properties", "sem:about"))
        .and(wiremock::matchers::query_param(
            "filters",
            "subject(sem:committed>\"2024-06-01T12:00:03.990Z\"^^xsd:dateTime)",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "@graph": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SmartlogicClient::new(config_for(&server)).await.unwrap();
    let uuids = client.get_changed_concept_list(since).await.unwrap();
    assert!(uuids.is_empty());
}

#[tokio::test]
async fn test_get_changed_concept_list_malformed_body() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok").await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = SmartlogicClient::new(config_for(&server)).await.unwrap();
    let err = client
        .get_changed_concept_list(chrono::Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));
}
