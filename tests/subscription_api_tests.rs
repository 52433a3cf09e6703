// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription CRUD tests at the router level.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use tower::ServiceExt;

mod common;

async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 65536)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn send(app: Router, method: &str, uri: &str, token: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 65536)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn sample_input() -> serde_json::Value {
    serde_json::json!({
        "name": "Cloud Backup",
        "expiry": "2031-03-15",
        "cost": 9.99,
        "cycle": "monthly"
    })
}

#[tokio::test]
async fn test_create_and_list_subscription() {
    let (app, state, _mail) = common::create_test_app();
    common::seed_user(&state, "user-1", "user@example.com").await;
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);

    let (status, created) = send_json(
        app.clone(),
        "POST",
        "/api/subscriptions",
        &token,
        sample_input(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["name"], "Cloud Backup");
    assert_eq!(created["expiry"], "2031-03-15");
    assert!(created["id"].as_str().unwrap().len() == 16);
    // Expiry classification rides along with every subscription
    assert_eq!(created["status"]["isExpired"], false);

    let (status, listed) = send(app, "GET", "/api/subscriptions", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], created["id"]);
}

#[tokio::test]
async fn test_create_rejects_invalid_input() {
    let (app, state, _mail) = common::create_test_app();
    common::seed_user(&state, "user-1", "user@example.com").await;
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);

    let mut blank_name = sample_input();
    blank_name["name"] = serde_json::json!("   ");
    let (status, _) = send_json(
        app.clone(),
        "POST",
        "/api/subscriptions",
        &token,
        blank_name,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut bad_date = sample_input();
    bad_date["expiry"] = serde_json::json!("15/03/2031");
    let (status, _) = send_json(app.clone(), "POST", "/api/subscriptions", &token, bad_date).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut negative_cost = sample_input();
    negative_cost["cost"] = serde_json::json!(-1.0);
    let (status, _) = send_json(app, "POST", "/api/subscriptions", &token, negative_cost).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_replaces_fields() {
    let (app, state, _mail) = common::create_test_app();
    common::seed_user(&state, "user-1", "user@example.com").await;
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);

    let (_, created) = send_json(
        app.clone(),
        "POST",
        "/api/subscriptions",
        &token,
        sample_input(),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let edit = serde_json::json!({
        "name": "Cloud Backup Pro",
        "expiry": "2031-04-15",
        "cost": 19.99,
        "cycle": "yearly",
        "autoRenew": true
    });
    let (status, updated) = send_json(
        app,
        "PUT",
        &format!("/api/subscriptions/{}", id),
        &token,
        edit,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["name"], "Cloud Backup Pro");
    assert_eq!(updated["cycle"], "yearly");
    assert_eq!(updated["autoRenew"], true);
    assert_eq!(updated["createdAt"], created["createdAt"]);
    assert!(updated["updatedAt"].is_string());
}

#[tokio::test]
async fn test_update_unknown_id_is_not_found() {
    let (app, state, _mail) = common::create_test_app();
    common::seed_user(&state, "user-1", "user@example.com").await;
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);

    let (status, _) = send_json(
        app,
        "PUT",
        "/api/subscriptions/ffffffffffffffff",
        &token,
        sample_input(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (app, state, _mail) = common::create_test_app();
    common::seed_user(&state, "user-1", "user@example.com").await;
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);

    let (_, created) = send_json(
        app.clone(),
        "POST",
        "/api/subscriptions",
        &token,
        sample_input(),
    )
    .await;
    let uri = format!("/api/subscriptions/{}", created["id"].as_str().unwrap());

    let (status, body) = send(app.clone(), "DELETE", &uri, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // Deleting the same id again still succeeds
    let (status, body) = send(app.clone(), "DELETE", &uri, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, listed) = send(app, "GET", "/api/subscriptions", &token).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_renew_advances_one_cycle() {
    let (app, state, _mail) = common::create_test_app();
    common::seed_user(&state, "user-1", "user@example.com").await;
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);

    let (_, created) = send_json(
        app.clone(),
        "POST",
        "/api/subscriptions",
        &token,
        sample_input(),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, renewed) = send(
        app,
        "POST",
        &format!("/api/subscriptions/{}/renew", id),
        &token,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(renewed["expiry"], "2031-04-15");
    assert!(renewed["updatedAt"].is_string());
}

#[tokio::test]
async fn test_update_notification_preferences() {
    let (app, state, _mail) = common::create_test_app();
    common::seed_user(&state, "user-1", "user@example.com").await;
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);

    let prefs = serde_json::json!({
        "enabled": true,
        "expiringSoon": false,
        "critical": true,
        "weekly": false,
        "monthly": false
    });
    let (status, saved) = send_json(app.clone(), "PUT", "/api/me/notifications", &token, prefs).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["expiringSoon"], false);

    let (_, me) = send(app, "GET", "/api/me", &token).await;
    assert_eq!(me["emailNotifications"]["expiringSoon"], false);
    assert_eq!(me["emailNotifications"]["critical"], true);
}
