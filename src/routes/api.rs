// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{NotificationPreferences, Subscription};
use crate::services::expiry::{self, ExpiryStatus};
use crate::services::registry::SubscriptionInput;
use crate::services::twofactor::{self, EnrollmentChallenge};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// API routes (require full authentication via session JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/me/notifications", put(update_notifications))
        .route(
            "/api/subscriptions",
            get(list_subscriptions).post(create_subscription),
        )
        .route(
            "/api/subscriptions/{id}",
            put(update_subscription).delete(delete_subscription),
        )
        .route("/api/subscriptions/{id}/renew", post(renew_subscription))
        .route("/api/2fa/setup", post(two_factor_setup))
        .route("/api/2fa/enable", post(two_factor_enable))
        .route("/api/2fa/disable", post(two_factor_disable))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response. The TOTP secret never leaves the store.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub email_verified: bool,
    pub two_factor_enabled: bool,
    pub email_notifications: NotificationPreferences,
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let record = state
        .store
        .get_user(&user.user_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    Ok(Json(UserResponse {
        email: record.profile.email,
        name: record.profile.name,
        picture: record.profile.picture,
        email_verified: record.profile.email_verified,
        two_factor_enabled: record.profile.two_factor_enabled,
        email_notifications: record.profile.email_notifications,
    }))
}

/// Replace the user's notification preferences.
async fn update_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(prefs): Json<NotificationPreferences>,
) -> Result<Json<NotificationPreferences>> {
    let prefs = state
        .store
        .update_user(&user.user_id, |record| {
            record.profile.email_notifications = prefs.clone();
            Ok(record.profile.email_notifications.clone())
        })
        .await?;

    Ok(Json(prefs))
}

// ─── Subscriptions ───────────────────────────────────────────

/// A subscription plus its expiry classification for display.
#[derive(Serialize)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub status: ExpiryStatus,
}

fn view(subscription: Subscription) -> SubscriptionView {
    let status = expiry::evaluate(&subscription, chrono::Utc::now());
    SubscriptionView {
        subscription,
        status,
    }
}

/// List the user's subscriptions in insertion order, each with its
/// current expiry classification.
async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<SubscriptionView>>> {
    let subscriptions = state.registry.list(&user.user_id).await?;
    Ok(Json(subscriptions.into_iter().map(view).collect()))
}

/// Create a subscription.
async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<SubscriptionInput>,
) -> Result<Json<SubscriptionView>> {
    let sub = state
        .registry
        .create(&user.user_id, input, chrono::Utc::now())
        .await?;

    tracing::info!(user_id = %user.user_id, subscription_id = %sub.id, "Subscription created");
    Ok(Json(view(sub)))
}

/// Full-field update of a subscription.
async fn update_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(input): Json<SubscriptionInput>,
) -> Result<Json<SubscriptionView>> {
    let sub = state
        .registry
        .update(&user.user_id, &id, input, chrono::Utc::now())
        .await?;

    Ok(Json(view(sub)))
}

/// Response for delete operations.
#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// Delete a subscription. Idempotent: deleting an absent id succeeds.
async fn delete_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.registry.delete(&user.user_id, &id).await?;
    tracing::info!(user_id = %user.user_id, subscription_id = %id, "Subscription deleted");
    Ok(Json(DeleteResponse { success: true }))
}

/// Advance a subscription's expiry by one billing cycle.
async fn renew_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SubscriptionView>> {
    let sub = state
        .registry
        .renew(&user.user_id, &id, chrono::Utc::now())
        .await?;

    tracing::info!(
        user_id = %user.user_id,
        subscription_id = %sub.id,
        new_expiry = %sub.expiry,
        "Subscription renewed"
    );
    Ok(Json(view(sub)))
}

// ─── Two-Factor Enrollment ───────────────────────────────────

/// Start 2FA enrollment: generate a candidate secret and hand back its
/// scannable form. Nothing is persisted until the user proves possession.
async fn two_factor_setup(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<EnrollmentChallenge>> {
    let record = state
        .store
        .get_user(&user.user_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    let challenge = twofactor::begin_enrollment(&state.config.totp_issuer, &record.profile.email)?;

    // A repeated setup call replaces any earlier candidate
    state
        .pending_enrollments
        .insert(user.user_id.clone(), challenge.secret.clone());

    tracing::info!(user_id = %user.user_id, "2FA enrollment started");
    Ok(Json(challenge))
}

#[derive(Deserialize)]
pub struct EnableTwoFactorRequest {
    code: String,
}

/// Response for 2FA state changes.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorStatusResponse {
    pub two_factor_enabled: bool,
}

/// Finish enrollment: verify the code against the candidate secret and
/// persist enablement. A wrong code discards the candidate; the profile is
/// untouched either way until the code checks out.
async fn two_factor_enable(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<EnableTwoFactorRequest>,
) -> Result<Json<TwoFactorStatusResponse>> {
    let candidate = state
        .pending_enrollments
        .get(&user.user_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::InvalidInput("No enrollment in progress".to_string()))?;

    let now = chrono::Utc::now();
    if !twofactor::verify_code(&candidate, &request.code, now)? {
        // Proof of possession failed: the candidate is dead, no partial
        // enablement may survive
        state.pending_enrollments.remove(&user.user_id);
        tracing::warn!(user_id = %user.user_id, "2FA enrollment code rejected");
        return Err(AppError::InvalidCode);
    }

    let setup_date = format_utc_rfc3339(now);
    state
        .store
        .update_user(&user.user_id, |record| {
            record.profile.two_factor_enabled = true;
            record.profile.two_fa_secret = Some(candidate.clone());
            record.profile.two_fa_setup_date = Some(setup_date.clone());
            Ok(())
        })
        .await?;

    state.pending_enrollments.remove(&user.user_id);

    tracing::info!(user_id = %user.user_id, "2FA enabled");
    Ok(Json(TwoFactorStatusResponse {
        two_factor_enabled: true,
    }))
}

/// Disable 2FA: clears the enabled flag and the stored secret together.
///
/// No re-proof of possession is required; sessions holding a valid token
/// may disable unconditionally.
async fn two_factor_disable(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TwoFactorStatusResponse>> {
    state
        .store
        .update_user(&user.user_id, |record| {
            record.profile.two_factor_enabled = false;
            record.profile.two_fa_secret = None;
            record.profile.two_fa_setup_date = None;
            record.profile.two_fa_last_used = None;
            Ok(())
        })
        .await?;

    state.pending_enrollments.remove(&user.user_id);

    tracing::info!(user_id = %user.user_id, "2FA disabled");
    Ok(Json(TwoFactorStatusResponse {
        two_factor_enabled: false,
    }))
}
