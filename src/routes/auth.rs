// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth authentication routes and login-time 2FA verification.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::JsonStore;
use crate::error::{AppError, Result};
use crate::middleware::auth::{authenticate, create_jwt};
use crate::models::{UserProfile, UserRecord};
use crate::services::twofactor::{self, TwoFactorSession};
use crate::services::GoogleUserInfo;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

use hmac::{Hmac, Mac};
use sha2::Sha256;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google", get(auth_start))
        .route("/auth/google/callback", get(auth_callback))
        .route("/auth/2fa/verify", post(verify_two_factor))
        .route("/auth/logout", get(logout))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    /// If not provided, uses FRONTEND_URL env var.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start OAuth flow - redirect to Google authorization.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
    headers: axum::http::HeaderMap,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    // Encode frontend URL + timestamp in the signed state parameter
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let state_payload = format!("{}|{:x}", frontend_url, timestamp);

    let mut mac = HmacSha256::new_from_slice(&state.config.oauth_state_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(state_payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed_state = format!("{}|{}", state_payload, hex::encode(signature));
    let oauth_state = URL_SAFE_NO_PAD.encode(signed_state.as_bytes());

    let callback_url = callback_url(&headers);
    let auth_url = state.google.authorize_url(&callback_url, &oauth_state);

    tracing::info!(
        frontend_url = %frontend_url,
        "Starting OAuth flow, redirecting to Google"
    );

    Ok(Redirect::temporary(&auth_url))
}

/// Derive the OAuth callback URL from the request host.
fn callback_url(headers: &axum::http::HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            std::env::var("API_HOST").unwrap_or_else(|_| "localhost:8080".to_string())
        });

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}/auth/google/callback", scheme, host)
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, create or refresh the user
/// record, and issue a session token.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    // Decode and verify frontend URL from state parameter
    let frontend_url = verify_and_decode_state(&params.state, &state.config.oauth_state_key)
        .unwrap_or_else(|| {
            tracing::warn!(
                "Invalid or tampered state parameter, falling back to default frontend URL"
            );
            state.config.frontend_url.clone()
        });

    // Check for OAuth errors
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        let redirect = format!("{}?error={}", frontend_url, urlencoding::encode(&error));
        return Ok(Redirect::temporary(&redirect));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::InvalidInput("Missing authorization code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");

    let tokens = state
        .google
        .exchange_code(&code, &callback_url(&headers))
        .await?;
    let info = state.google.get_userinfo(&tokens.access_token).await?;

    let record = upsert_login_record(&state.store, &info).await?;

    let session = TwoFactorSession::begin(record.profile.two_factor_enabled);
    let jwt = create_jwt(&info.sub, session, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    tracing::info!(
        user_id = %info.sub,
        two_factor_pending = !session.is_satisfied(),
        "OAuth successful"
    );

    // A 2FA-enabled profile lands on the code-entry page with a pending
    // token; everyone else is fully logged in.
    let redirect_url = if session.is_satisfied() {
        format!("{}/callback?token={}", frontend_url, jwt)
    } else {
        format!("{}/2fa?token={}", frontend_url, jwt)
    };

    Ok(Redirect::temporary(&redirect_url))
}

/// Create the record on first login; refresh provider claims on repeat
/// logins without touching 2FA material, preferences, or subscriptions.
///
/// The refresh runs inside the store critical section, so a subscription
/// or 2FA mutation committing concurrently can never be clobbered by a
/// stale login write.
async fn upsert_login_record(store: &JsonStore, info: &GoogleUserInfo) -> Result<UserRecord> {
    let refreshed = store
        .update_user(&info.sub, |record| {
            record.profile.email = info.email.clone();
            record.profile.name = info.name.clone();
            record.profile.picture = info.picture.clone();
            record.profile.email_verified = info.email_verified;
            Ok(record.clone())
        })
        .await;

    match refreshed {
        Ok(record) => Ok(record),
        Err(AppError::NotFound(_)) => {
            let record = UserRecord::new(UserProfile::new(
                info.email.clone(),
                info.name.clone(),
                info.picture.clone(),
                info.email_verified,
            ));
            store.put_user(&info.sub, record.clone()).await?;
            tracing::info!(user_id = %info.sub, "First login, user record created");
            Ok(record)
        }
        Err(e) => Err(e),
    }
}

#[derive(Deserialize)]
pub struct VerifyTwoFactorRequest {
    code: String,
}

#[derive(Serialize)]
pub struct VerifyTwoFactorResponse {
    token: String,
}

/// Complete a pending login by verifying a TOTP code.
///
/// Takes the short-lived pending session token plus a 6-digit code and
/// returns a fully authenticated session token.
async fn verify_two_factor(
    State(state): State<Arc<AppState>>,
    jar: axum_extra::extract::cookie::CookieJar,
    headers: axum::http::HeaderMap,
    Json(request): Json<VerifyTwoFactorRequest>,
) -> Result<Json<VerifyTwoFactorResponse>> {
    let auth_user = authenticate(&state.config.jwt_signing_key, &jar, &headers)?;

    let record = state
        .store
        .get_user(&auth_user.user_id)
        .await
        .ok_or(AppError::Unauthorized)?;

    let secret = record.profile.two_fa_secret.as_deref().ok_or_else(|| {
        AppError::Configuration("Profile has 2FA pending but no stored secret".to_string())
    })?;

    let now = chrono::Utc::now();
    if !twofactor::verify_code(secret, &request.code, now)? {
        tracing::warn!(user_id = %auth_user.user_id, "TOTP verification failed");
        return Err(AppError::InvalidCode);
    }

    // Pending → Verified; any other starting state is rejected here
    let session = auth_user.session.complete(now)?;

    let last_used = format_utc_rfc3339(now);
    state
        .store
        .update_user(&auth_user.user_id, |record| {
            record.profile.two_fa_last_used = Some(last_used.clone());
            Ok(())
        })
        .await?;

    let token = create_jwt(&auth_user.user_id, session, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    tracing::info!(user_id = %auth_user.user_id, "Two-factor verification succeeded");

    Ok(Json(VerifyTwoFactorResponse { token }))
}

/// Verify the HMAC signature on the OAuth state parameter and recover the
/// frontend URL it carries.
///
/// The wire format is `frontend_url|timestamp_hex|signature_hex`,
/// base64url-encoded.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<String> {
    let decoded = URL_SAFE_NO_PAD.decode(state).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let (payload, signature_hex) = decoded.rsplit_once('|')?;
    let (frontend_url, _timestamp_hex) = payload.split_once('|')?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected {
        tracing::error!("OAuth state signature mismatch, discarding state");
        return None;
    }

    Some(frontend_url.to_string())
}

/// Logout - just a placeholder that clears client-side token.
async fn logout() -> Redirect {
    // The actual logout happens on client side by clearing localStorage
    Redirect::temporary("/")
}
