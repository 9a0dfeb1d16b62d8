//! Router-level tests of the update API.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use pressmill_server::config::{CacheBackendKind, ServerConfig};
use pressmill_server::{routes, AppState};
use serde_json::Value;
use tower::util::ServiceExt;

const ZIP_BYTES: &[u8] = b"PK\x03\x04fake-zip-payload";

async fn test_state(dir: &std::path::Path) -> AppState {
    std::fs::write(
        dir.join("plugin-x.json"),
        r#"{"name": "Plugin X", "version": "1.2", "requires": "6.0"}"#,
    )
    .expect("sidecar");
    std::fs::write(dir.join("plugin-x.zip"), ZIP_BYTES).expect("archive");

    let mut config = ServerConfig::default();
    config.packages.dir = dir.to_path_buf();
    config.cache.backend = CacheBackendKind::None;
    AppState::new(&config).await.expect("state")
}

fn license_header() -> String {
    format!("Basic {}", BASE64.encode("998:123openup"))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn metadata_without_license_has_no_download_url() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = routes::create_router(test_state(dir.path()).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/updates?action=get_metadata&slug=plugin-x")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let meta = body_json(response).await;
    assert_eq!(meta["name"], "Plugin X");
    assert_eq!(meta["slug"], "plugin-x");
    assert!(meta.get("download_url").is_none());
    assert!(meta.get("auth_key").is_none());
}

#[tokio::test]
async fn metadata_with_license_signs_the_download_url() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = routes::create_router(test_state(dir.path()).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/updates?action=get_metadata&slug=plugin-x")
                .header(header::AUTHORIZATION, license_header())
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let meta = body_json(response).await;
    assert_eq!(meta["auth_key"], BASE64.encode("998:123openup"));
    let url = meta["download_url"].as_str().expect("download_url");
    assert!(url.contains("action=download"));
    assert!(url.contains("uid="));
}

#[tokio::test]
async fn signed_download_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = test_state(dir.path()).await;
    let app = routes::create_router(state);

    // Fetch the signed link the way a licensed site would.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/updates?action=get_metadata&slug=plugin-x")
                .header(header::AUTHORIZATION, license_header())
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let meta = body_json(response).await;
    let url = meta["download_url"].as_str().expect("download_url");
    let uid = url.split("uid=").nth(1).expect("uid");

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/updates?action=download&slug=plugin-x&uid={uid}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/zip")
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(&bytes[..], ZIP_BYTES);
}

#[tokio::test]
async fn download_without_uid_is_refused() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = routes::create_router(test_state(dir.path()).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/updates?action=download&slug=plugin-x")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(
        body["error"]["message"],
        "You must provide a license key to download this plugin."
    );
}

#[tokio::test]
async fn download_with_tampered_uid_is_refused() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = routes::create_router(test_state(dir.path()).await);

    let uid = urlencoding::encode(&BASE64.encode("forged-signature")).into_owned();
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/updates?action=download&slug=plugin-x&uid={uid}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "Sorry, your license is not valid.");
}

#[tokio::test]
async fn unknown_action_is_a_bad_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = routes::create_router(test_state(dir.path()).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/updates?action=become_admin&slug=plugin-x")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_slug_is_a_bad_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = routes::create_router(test_state(dir.path()).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/updates?action=get_metadata")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_slug_is_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = routes::create_router(test_state(dir.path()).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/updates?action=get_metadata&slug=ghost")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_cache_diagnostics_respond() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = routes::create_router(test_state(dir.path()).await);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/internal/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/internal/cache")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let info = body_json(response).await;
    assert_eq!(info["backend"], "none");

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/internal/cache")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["flushed"], true);
}
