// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT session authentication middleware.
//!
//! The session token carries the two-factor state machine position in its
//! claims (`tfa`), so a "pending" session is recognizable without any
//! server-side session storage. `require_auth` only admits fully
//! authenticated sessions; the 2FA verification route accepts pending
//! tokens explicitly via `authenticate`.

use crate::error::AppError;
use crate::services::twofactor::TwoFactorSession;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "subwatch_token";

const SESSION_TTL_SECS: usize = 30 * 24 * 60 * 60; // 30 days
const PENDING_TTL_SECS: usize = 10 * 60; // short window to enter a code

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (provider-issued user id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Two-factor state: "none", "pending", or "verified"
    pub tfa: String,
    /// When the second factor was verified (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tfa_at: Option<i64>,
}

/// Authenticated user extracted from a session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub session: TwoFactorSession,
}

/// Middleware that requires a fully authenticated session.
///
/// Pending-2FA sessions are rejected: holding only the first factor does
/// not grant access to protected resources.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_user = authenticate(&state.config.jwt_signing_key, &jar, request.headers())
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    if !auth_user.session.is_satisfied() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Resolve the session token (cookie first, then bearer header) and decode
/// it into an [`AuthUser`]. Accepts pending sessions; callers decide what
/// those may do.
pub fn authenticate(
    signing_key: &[u8],
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<AuthUser, AppError> {
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header {
            Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
            _ => return Err(AppError::Unauthorized),
        }
    };

    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data =
        decode::<Claims>(&token, &key, &validation).map_err(|_| AppError::InvalidToken)?;

    let claims = token_data.claims;
    let session = session_from_claims(&claims)?;

    Ok(AuthUser {
        user_id: claims.sub,
        session,
    })
}

fn session_from_claims(claims: &Claims) -> Result<TwoFactorSession, AppError> {
    match claims.tfa.as_str() {
        "none" => Ok(TwoFactorSession::NoneRequired),
        "pending" => Ok(TwoFactorSession::Pending),
        "verified" => {
            let verified_at = claims
                .tfa_at
                .and_then(|t| Utc.timestamp_opt(t, 0).single())
                .ok_or(AppError::InvalidToken)?;
            Ok(TwoFactorSession::Verified { verified_at })
        }
        _ => Err(AppError::InvalidToken),
    }
}

/// Create a session JWT for a user, embedding the 2FA state.
///
/// Pending tokens are deliberately short-lived.
pub fn create_jwt(
    user_id: &str,
    session: TwoFactorSession,
    signing_key: &[u8],
) -> anyhow::Result<String> {
    let now = Utc::now().timestamp() as usize;

    let (tfa, tfa_at, ttl) = match session {
        TwoFactorSession::NoneRequired => ("none", None, SESSION_TTL_SECS),
        TwoFactorSession::Pending => ("pending", None, PENDING_TTL_SECS),
        TwoFactorSession::Verified { verified_at } => {
            ("verified", Some(verified_at.timestamp()), SESSION_TTL_SECS)
        }
    };

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + ttl,
        tfa: tfa.to_string(),
        tfa_at,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_claims(token: &str, key: &[u8]) -> Claims {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(key),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap()
        .claims
    }

    #[test]
    fn jwt_round_trip_none_required() {
        let key = b"test_jwt_key_32_bytes_minimum!!";
        let token = create_jwt("user-1", TwoFactorSession::NoneRequired, key).unwrap();
        let claims = decode_claims(&token, key);

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.tfa, "none");
        assert_eq!(
            session_from_claims(&claims).unwrap(),
            TwoFactorSession::NoneRequired
        );
    }

    #[test]
    fn jwt_round_trip_verified() {
        let key = b"test_jwt_key_32_bytes_minimum!!";
        let verified_at = Utc.timestamp_opt(1_750_000_000, 0).unwrap();
        let token = create_jwt("user-1", TwoFactorSession::Verified { verified_at }, key).unwrap();
        let claims = decode_claims(&token, key);

        assert_eq!(claims.tfa, "verified");
        assert_eq!(
            session_from_claims(&claims).unwrap(),
            TwoFactorSession::Verified { verified_at }
        );
    }

    #[test]
    fn pending_token_is_short_lived() {
        let key = b"test_jwt_key_32_bytes_minimum!!";
        let token = create_jwt("user-1", TwoFactorSession::Pending, key).unwrap();
        let claims = decode_claims(&token, key);

        assert_eq!(claims.tfa, "pending");
        assert!(claims.exp - claims.iat <= PENDING_TTL_SECS);
    }

    #[test]
    fn unknown_tfa_claim_is_rejected() {
        let claims = Claims {
            sub: "user-1".to_string(),
            exp: 0,
            iat: 0,
            tfa: "superseded".to_string(),
            tfa_at: None,
        };
        assert!(matches!(
            session_from_claims(&claims),
            Err(AppError::InvalidToken)
        ));
    }
}
