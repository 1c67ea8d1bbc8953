//! Tests for the HTTP surface.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use four_in_a_row::{Analytics, Orchestrator, OrchestratorSettings, router};
use http_body_util::BodyExt;
use tower::ServiceExt;

fn app() -> axum::Router {
    router(Orchestrator::new(
        OrchestratorSettings::default(),
        Analytics::disabled(),
        None,
    ))
}

#[tokio::test]
async fn test_health_reports_ok() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_plain_get_on_ws_is_rejected() {
    let response = app()
        .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = app()
        .oneshot(Request::builder().uri("/lobby").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
