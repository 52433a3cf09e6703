// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduled-trigger routes.
//!
//! `/tasks/notify` is called by an external cron scheduler, not by users.
//! It is authenticated with a shared trigger token header.

use crate::services::NotificationDispatcher;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use std::sync::Arc;

/// Header carrying the shared trigger token.
pub const TRIGGER_TOKEN_HEADER: &str = "x-notify-token";

/// Task handler routes (called by the scheduler).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/tasks/notify", post(run_notification_batch))
}

/// Run one expiry-notification batch over every user.
///
/// Per-item transport failures are recorded in the returned report and
/// never abort the batch.
async fn run_notification_batch(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Response {
    let token_ok = headers
        .get(TRIGGER_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|token| token == state.config.notify_trigger_token)
        .unwrap_or(false);

    if !token_ok {
        tracing::warn!("Blocked unauthorized notification trigger");
        return StatusCode::FORBIDDEN.into_response();
    }

    tracing::info!("Notification batch triggered");

    let dispatcher = NotificationDispatcher::new(state.store.clone(), state.mail.clone());
    let report = dispatcher.run_batch(chrono::Utc::now()).await;

    (StatusCode::OK, Json(report)).into_response()
}
