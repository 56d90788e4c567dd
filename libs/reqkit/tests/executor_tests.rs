mod common;

use httpmock::prelude::*;
use reqkit::{
    ApiError, CallOptions, CancellationToken, ContractError, ErrorKind, Notice, Outcome, Route,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item {
    id: u64,
    name: String,
}

#[derive(Debug, Clone, Serialize)]
struct NewItem {
    name: String,
}

const GET_ITEM: Route<(), Item> = Route::get("/api/v1/items/{id}/");
const CREATE_ITEM: Route<NewItem, Item> = Route::post("/api/v1/items/");
const HEALTH: Route<(), serde_json::Value> = Route::get("/health/").without_auth();

#[tokio::test]
async fn not_found_is_classified_and_reported_once() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/items/42/");
            then.status(404)
                .header("content-type", "application/json")
                .json_body(json!({"detail": "Not Found"}));
        })
        .await;

    let client = common::client(&server.base_url());
    let (policy, rec) = common::policy();

    let err = client
        .execute(&GET_ITEM, CallOptions::new().path_param("id", 42))
        .await
        .unwrap_err();
    mock.assert_async().await;

    let classified = err.classified().expect("classified error");
    assert_eq!(classified.kind, ErrorKind::NotFound);
    assert_eq!(classified.status.map(|s| s.as_u16()), Some(404));
    assert_eq!(classified.cause, Some(json!({"detail": "Not Found"})));

    assert_eq!(policy.handle(&err), Outcome::Notified(1));
    assert_eq!(*rec.notices.lock(), vec![Notice::general("Not Found")]);
}

#[tokio::test]
async fn success_decodes_response_and_sends_bearer_token() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/items/7/")
                .query_param("expand", "true")
                .header("authorization", "Bearer abc")
                .header("accept", "application/json");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"id": 7, "name": "Ward A"}));
        })
        .await;

    let client = common::client_with_token(&server.base_url(), "abc");
    let item = client
        .execute(
            &GET_ITEM,
            CallOptions::new()
                .path_param("id", 7)
                .query("expand", true)
                .query_opt::<&str>("search", None),
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(
        item,
        Item {
            id: 7,
            name: "Ward A".into()
        }
    );
}

#[tokio::test]
async fn no_auth_route_omits_authorization() {
    let server = MockServer::start_async().await;
    let with_auth = server
        .mock_async(|when, then| {
            when.method(GET).path("/health/").header_exists("authorization");
            then.status(500);
        })
        .await;
    let without_auth = server
        .mock_async(|when, then| {
            when.method(GET).path("/health/");
            then.status(200).json_body(json!({"status": "ok"}));
        })
        .await;

    let client = common::client_with_token(&server.base_url(), "abc");
    let body = client.execute(&HEALTH, CallOptions::new()).await.unwrap();

    assert_eq!(body, json!({"status": "ok"}));
    with_auth.assert_hits_async(0).await;
    without_auth.assert_async().await;
}

#[tokio::test]
async fn explicit_header_override_is_sent() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/items/1/")
                .header("x-facility", "f-9");
            then.status(200).json_body(json!({"id": 1, "name": "n"}));
        })
        .await;

    let client = common::client(&server.base_url());
    client
        .execute(
            &GET_ITEM,
            CallOptions::new()
                .path_param("id", 1)
                .header("X-Facility", "f-9"),
        )
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn post_serializes_body_as_json() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v1/items/")
                .header("content-type", "application/json")
                .json_body(json!({"name": "Bed 3"}));
            then.status(201).json_body(json!({"id": 3, "name": "Bed 3"}));
        })
        .await;

    let client = common::client(&server.base_url());
    let created = client
        .execute(
            &CREATE_ITEM,
            CallOptions::new().body(NewItem {
                name: "Bed 3".into(),
            }),
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(created.id, 3);
}

#[tokio::test]
async fn validation_failure_produces_field_notices() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/items/");
            then.status(400)
                .json_body(json!({"name": ["This field is required.", "This field is required."]}));
        })
        .await;

    let client = common::client(&server.base_url());
    let (policy, rec) = common::policy();
    let err = client
        .execute(
            &CREATE_ITEM,
            CallOptions::new().body(NewItem { name: String::new() }),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Validation));
    assert_eq!(policy.handle(&err), Outcome::Notified(1));
    assert_eq!(
        *rec.notices.lock(),
        vec![Notice::for_field("name", "This field is required.")]
    );
}

#[tokio::test]
async fn expired_token_redirects_to_session_expired() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/items/5/");
            then.status(401).json_body(json!({"code": "token_not_valid"}));
        })
        .await;

    let client = common::client_with_token(&server.base_url(), "stale");
    let (policy, rec) = common::policy();
    let err = client
        .execute(&GET_ITEM, CallOptions::new().path_param("id", 5).silent())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::SessionExpired));
    assert_eq!(policy.handle(&err), Outcome::Redirected);
    assert_eq!(
        *rec.redirects.lock(),
        vec!["/session-expired?redirect=%2Ffacility%2F1%2Fpatients".to_string()]
    );
    assert!(rec.notices.lock().is_empty());
}

#[tokio::test]
async fn silent_call_classifies_without_notices() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/items/9/");
            then.status(500).body("<html>boom</html>");
        })
        .await;

    let client = common::client(&server.base_url());
    let (policy, rec) = common::policy();
    let err = client
        .execute(&GET_ITEM, CallOptions::new().path_param("id", 9).silent())
        .await
        .unwrap_err();

    let classified = err.classified().unwrap();
    assert_eq!(classified.kind, ErrorKind::Unknown);
    assert!(classified.silent);
    assert_eq!(classified.cause, None);
    assert_eq!(policy.handle(&err), Outcome::Suppressed);
    assert!(rec.notices.lock().is_empty());
}

#[tokio::test]
async fn unexpected_success_body_is_unknown() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/items/2/");
            then.status(200).json_body(json!({"unexpected": true}));
        })
        .await;

    let client = common::client(&server.base_url());
    let err = client
        .execute(&GET_ITEM, CallOptions::new().path_param("id", 2))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Unknown));
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let client = common::client(&common::unreachable_base_url());
    let (policy, rec) = common::policy();

    let err = client
        .execute(&GET_ITEM, CallOptions::new().path_param("id", 1).silent())
        .await
        .unwrap_err();

    let classified = err.classified().unwrap();
    assert_eq!(classified.kind, ErrorKind::Network);
    assert_eq!(classified.status, None);
    assert_eq!(policy.handle(&err), Outcome::Notified(1));
    assert_eq!(rec.notices.lock().len(), 1);
}

#[tokio::test]
async fn missing_path_param_fails_before_network() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200);
        })
        .await;

    let client = common::client(&server.base_url());
    let err = client.execute(&GET_ITEM, CallOptions::new()).await.unwrap_err();

    assert_eq!(
        err,
        ApiError::Contract(ContractError::MissingPathParam {
            path: "/api/v1/items/{id}/".into(),
            name: "id".into(),
        })
    );
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn cancelled_call_is_silent() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/items/1/");
            then.status(200)
                .delay(Duration::from_secs(5))
                .json_body(json!({"id": 1, "name": "slow"}));
        })
        .await;

    let client = common::client(&server.base_url());
    let (policy, rec) = common::policy();
    let signal = CancellationToken::new();
    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = client
        .execute(
            &GET_ITEM,
            CallOptions::new().path_param("id", 1).signal(signal),
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(policy.handle(&err), Outcome::Suppressed);
    assert!(rec.notices.lock().is_empty());
}

#[tokio::test]
async fn already_cancelled_signal_never_reaches_network() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200);
        })
        .await;

    let signal = CancellationToken::new();
    signal.cancel();
    let client = common::client(&server.base_url());
    let err = client
        .execute(
            &GET_ITEM,
            CallOptions::new().path_param("id", 1).signal(signal),
        )
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::Cancelled);
    mock.assert_hits_async(0).await;
}
