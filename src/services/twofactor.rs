// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TOTP two-factor authentication: RFC 6238 code verification, enrollment
//! challenges, and the login-session state machine.
//!
//! The shared secret is a 20-byte random value, stored base32-encoded the
//! way authenticator apps expect it. Verification uses HMAC-SHA1 with
//! 30-second time steps and a ±2 step tolerance window for clock drift.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

const SECRET_LEN: usize = 20;
const TIME_STEP_SECS: u64 = 30;
const CODE_DIGITS: u32 = 6;
/// Accept codes from this many time steps either side of now.
const SKEW_STEPS: i64 = 2;

const BASE32: base32::Alphabet = base32::Alphabet::Rfc4648 { padding: false };

// ─── TOTP primitives ─────────────────────────────────────────

/// Generate a fresh base32-encoded shared secret.
pub fn generate_secret() -> Result<String, AppError> {
    use ring::rand::{SecureRandom, SystemRandom};

    let mut bytes = [0u8; SECRET_LEN];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Configuration("Secure RNG unavailable".to_string()))?;

    Ok(base32::encode(BASE32, &bytes))
}

/// Compute the 6-digit code for one counter value.
fn code_at(secret: &[u8], counter: u64) -> String {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // RFC 4226 dynamic truncation
    let offset = (digest[19] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    format!("{:06}", binary % 10u32.pow(CODE_DIGITS))
}

/// Verify a submitted code against a base32-encoded secret.
///
/// A malformed stored secret is a `Configuration` error: the profile claims
/// 2FA material the server cannot use. A wrong or malformed code is simply
/// `false`; callers decide how to surface it.
pub fn verify_code(secret_b32: &str, code: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
    let secret = base32::decode(BASE32, secret_b32)
        .ok_or_else(|| AppError::Configuration("Stored TOTP secret is not base32".to_string()))?;

    let code = code.trim();
    if code.len() != CODE_DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(false);
    }

    let current_step = now.timestamp() / TIME_STEP_SECS as i64;

    let mut matched = false;
    for skew in -SKEW_STEPS..=SKEW_STEPS {
        let step = current_step + skew;
        if step < 0 {
            continue;
        }
        let expected = code_at(&secret, step as u64);
        // Constant-time compare; accumulate instead of early-returning
        matched |= bool::from(expected.as_bytes().ct_eq(code.as_bytes()));
    }

    Ok(matched)
}

// ─── Enrollment ──────────────────────────────────────────────

/// Candidate enrollment material handed to the UI.
///
/// Nothing here is persisted: the candidate secret lives only in server
/// memory until proof-of-possession succeeds.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentChallenge {
    /// Base32 secret for manual entry
    pub secret: String,
    /// otpauth:// URI encoding issuer, account label, and secret
    pub otpauth_url: String,
    /// External QR renderer URL for the otpauth URI
    pub qr_image_url: String,
}

/// Start enrollment: generate a candidate secret and its scannable form.
pub fn begin_enrollment(issuer: &str, account: &str) -> Result<EnrollmentChallenge, AppError> {
    let secret = generate_secret()?;
    let otpauth_url = otpauth_url(issuer, account, &secret);
    let qr_image_url = qr_image_url(&otpauth_url);

    Ok(EnrollmentChallenge {
        secret,
        otpauth_url,
        qr_image_url,
    })
}

/// Build the otpauth:// provisioning URI for authenticator apps.
fn otpauth_url(issuer: &str, account: &str, secret: &str) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
        urlencoding::encode(issuer),
        urlencoding::encode(account),
        secret,
        urlencoding::encode(issuer),
        CODE_DIGITS,
        TIME_STEP_SECS,
    )
}

/// URL of an external QR renderer for the provisioning URI.
/// Rendering is a UI concern; the backend never rasterizes images.
fn qr_image_url(otpauth: &str) -> String {
    format!(
        "https://api.qrserver.com/v1/create-qr-code/?size=200x200&data={}",
        urlencoding::encode(otpauth)
    )
}

// ─── Login session state machine ─────────────────────────────

/// Progress of a login session through second-factor verification.
///
/// Ephemeral: carried in the session token, never written to the document
/// store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoFactorSession {
    /// Profile has no 2FA; the session is fully authenticated at login
    NoneRequired,
    /// Primary login succeeded; waiting for a TOTP code
    Pending,
    /// Second factor verified at the contained instant
    Verified { verified_at: DateTime<Utc> },
}

impl TwoFactorSession {
    /// Initial session state at successful primary login.
    pub fn begin(two_factor_enabled: bool) -> Self {
        if two_factor_enabled {
            Self::Pending
        } else {
            Self::NoneRequired
        }
    }

    /// Transition `Pending → Verified`. Any other starting state is a
    /// protocol violation by the caller.
    pub fn complete(self, now: DateTime<Utc>) -> Result<Self, AppError> {
        match self {
            Self::Pending => Ok(Self::Verified { verified_at: now }),
            _ => Err(AppError::Unauthorized),
        }
    }

    /// Whether the session may access protected resources.
    pub fn is_satisfied(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}
