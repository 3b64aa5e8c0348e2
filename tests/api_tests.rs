//! Endpoint adapter tests: token checks happen before the upgrade.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use tower::ServiceExt;

use hostlink::api::create_router;

use common::test_app;

fn ws_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(Method::GET)
        .header(header::HOST, "localhost")
        .header(header::CONNECTION, "upgrade")
        .header(header::UPGRADE, "websocket")
        .header(header::SEC_WEBSOCKET_VERSION, "13")
        .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_endpoint_needs_no_token() {
    let app = test_app();
    let router = create_router(app.state);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn screen_socket_requires_a_token() {
    let app = test_app();
    let router = create_router(app.state);

    let response = router.oneshot(ws_request("/ws/screen")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn screen_socket_rejects_a_bad_token() {
    let app = test_app();
    let router = create_router(app.state);

    let response = router
        .oneshot(ws_request("/ws/screen?token=not-a-jwt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn screen_socket_upgrades_with_a_valid_token() {
    let app = test_app();
    let token = app
        .state
        .auth
        .issue_token("alice", chrono::Duration::hours(1))
        .unwrap();
    let router = create_router(app.state);

    let response = router
        .oneshot(ws_request(&format!("/ws/screen?token={token}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
}

#[tokio::test]
async fn terminal_socket_requires_a_token() {
    let app = test_app();
    let router = create_router(app.state);

    let response = router.oneshot(ws_request("/ws/terminal/t1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn chat_socket_requires_a_token() {
    let app = test_app();
    let router = create_router(app.state);

    let response = router.oneshot(ws_request("/ws/chat")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn chat_socket_upgrades_with_a_valid_token() {
    let app = test_app();
    let token = app
        .state
        .auth
        .issue_token("bob", chrono::Duration::hours(1))
        .unwrap();
    let router = create_router(app.state);

    let response = router
        .oneshot(ws_request(&format!("/ws/chat?token={token}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
}
