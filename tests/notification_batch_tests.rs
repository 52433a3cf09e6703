// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notification batch tests through the scheduler trigger route.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use subwatch::models::{BillingCycle, Subscription};
use tower::ServiceExt;

mod common;

fn sub_expiring_in(days: i64) -> Subscription {
    Subscription {
        id: format!("sub-{}", days),
        name: format!("Service {}", days),
        expiry: Utc::now().date_naive() + Duration::days(days),
        cost: 15.0,
        notes: None,
        cycle: BillingCycle::Monthly,
        auto_renew: false,
        final_expiry: None,
        created_at: "2025-01-01T00:00:00Z".to_string(),
        updated_at: None,
    }
}

async fn seed_subscription(state: &subwatch::AppState, user_id: &str, sub: Subscription) {
    state
        .store
        .update_user(user_id, move |record| {
            record.subscriptions.push(sub);
            Ok(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_batch_sends_due_reminders_only() {
    let (app, state, mail) = common::create_test_app();

    // One subscription due in each category, plus two that must stay silent
    common::seed_user(&state, "user-1", "one@example.com").await;
    seed_subscription(&state, "user-1", sub_expiring_in(1)).await; // critical
    seed_subscription(&state, "user-1", sub_expiring_in(10)).await; // expiring-soon
    seed_subscription(&state, "user-1", sub_expiring_in(45)).await; // too far out
    seed_subscription(&state, "user-1", sub_expiring_in(-3)).await; // already expired

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tasks/notify")
                .header("x-notify-token", state.config.notify_trigger_token.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 65536)
        .await
        .unwrap();
    let report: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(report["usersEvaluated"], 1);
    assert_eq!(report["sent"].as_array().unwrap().len(), 2);
    assert!(report["failed"].as_array().unwrap().is_empty());

    let kinds: Vec<&str> = report["sent"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"critical"));
    assert!(kinds.contains(&"expiring_soon"));

    let emails = mail.lock().unwrap();
    assert_eq!(emails.len(), 2);
    assert!(emails.iter().all(|e| e.to == "one@example.com"));
}

#[tokio::test]
async fn test_batch_honors_disabled_preferences() {
    let (app, state, mail) = common::create_test_app();

    common::seed_user(&state, "muted", "muted@example.com").await;
    seed_subscription(&state, "muted", sub_expiring_in(1)).await;
    state
        .store
        .update_user("muted", |record| {
            record.profile.email_notifications.enabled = false;
            Ok(())
        })
        .await
        .unwrap();

    common::seed_user(&state, "loud", "loud@example.com").await;
    seed_subscription(&state, "loud", sub_expiring_in(1)).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tasks/notify")
                .header("x-notify-token", state.config.notify_trigger_token.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 65536)
        .await
        .unwrap();
    let report: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(report["usersEvaluated"], 2);
    assert_eq!(report["sent"].as_array().unwrap().len(), 1);
    assert_eq!(report["sent"][0]["userId"], "loud");

    let emails = mail.lock().unwrap();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].to, "loud@example.com");
}
