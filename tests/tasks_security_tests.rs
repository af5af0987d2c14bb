// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task route security tests.
//!
//! `/tasks/*` must only be reachable from Cloud Tasks; Cloud Run strips the
//! queue-name header from external requests, so a missing or wrong header
//! means the caller is not our queue.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

fn reconcile_request(queue_header: Option<&str>) -> Request<Body> {
    let body = json!({ "source": "schedule", "coach_id": null });
    let mut builder = Request::builder()
        .method("POST")
        .uri("/tasks/reconcile")
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(name) = queue_header {
        builder = builder.header("x-cloudtasks-queuename", name);
    }

    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_reconcile_without_queue_header_is_forbidden() {
    let (app, _) = common::create_test_app();

    let response = app.oneshot(reconcile_request(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_reconcile_with_wrong_queue_is_forbidden() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(reconcile_request(Some("some-other-queue")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_reconcile_with_queue_header_reaches_handler() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(reconcile_request(Some("membership-sync")))
        .await
        .unwrap();

    // Past the gate; the offline mock then fails the sweep with a 500.
    let status = response.status();
    assert!(
        status == StatusCode::OK || status == StatusCode::INTERNAL_SERVER_ERROR,
        "Expected 200 or 500, got {}",
        status
    );
}
