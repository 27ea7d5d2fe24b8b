//! HTTP API tests through the full router (tracing and Sentry layers included).

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use sika_integration_tests::sample_user;
use sika_server::db::{MemoryUserStore, Store, UserStore};
use sika_server::state::AppState;

const KNOWN_ID: &str = "0b9f6a3e-5c1d-4f7a-9e2b-3c4d5e6f7a8b";

async fn app_with_known_user() -> axum::Router {
    let store = MemoryUserStore::new();
    store
        .create(sample_user(KNOWN_ID, "Marta"))
        .await
        .unwrap();
    sika_server::app(AppState::from_store(Store::Memory(store)))
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_get_existing_user() {
    let app = app_with_known_user().await;

    let (status, body) = get(app, &format!("/{KNOWN_ID}")).await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["user"]["id"], KNOWN_ID);
    assert_eq!(json["user"]["name"], "Marta");
    assert_eq!(json["user"]["phone_number"], "+1 555 0100");
    assert_eq!(json["user"]["addresses"][0]["zip_code"], "1100-148");
}

#[tokio::test]
async fn test_non_uuid_id_is_bad_request() {
    let app = app_with_known_user().await;

    let (status, body) = get(app, "/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["message"], "invalid user id");
}

#[tokio::test]
async fn test_unknown_user_is_bad_request_not_404() {
    let app = app_with_known_user().await;

    let (status, body) = get(app, &format!("/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["message"], "invalid user id");
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = app_with_known_user().await;

    let (status, body) = get(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");

    let (status, _) = get(app, "/health/ready").await;
    assert_eq!(status, StatusCode::OK);
}
