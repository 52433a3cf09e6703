//! User profile model for storage and API.

use crate::models::Subscription;
use serde::{Deserialize, Serialize};

/// Per-user notification preference flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    /// Master switch; nothing is sent while false
    pub enabled: bool,
    /// 30-day reminder emails
    pub expiring_soon: bool,
    /// 2-day reminder emails
    pub critical: bool,
    /// Weekly digest (not yet sent by the dispatcher)
    pub weekly: bool,
    /// Monthly digest (not yet sent by the dispatcher)
    pub monthly: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            enabled: true,
            expiring_soon: true,
            critical: true,
            weekly: false,
            monthly: false,
        }
    }
}

/// User profile stored in the document store.
///
/// Keyed by the Google-issued subject identifier, which is unique and
/// immutable for the lifetime of the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Email address from the identity provider
    pub email: String,
    /// Display name
    pub name: String,
    /// Profile picture URL (may be absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Whether the provider vouched for the email address
    pub email_verified: bool,
    /// Whether TOTP two-factor authentication is enabled
    pub two_factor_enabled: bool,
    /// Base32-encoded TOTP shared secret, present only while 2FA is enabled
    #[serde(rename = "twoFASecret", skip_serializing_if = "Option::is_none")]
    pub two_fa_secret: Option<String>,
    /// When 2FA enrollment completed (RFC3339)
    #[serde(rename = "twoFASetupDate", skip_serializing_if = "Option::is_none")]
    pub two_fa_setup_date: Option<String>,
    /// Last successful TOTP verification (RFC3339)
    #[serde(rename = "twoFALastUsed", skip_serializing_if = "Option::is_none")]
    pub two_fa_last_used: Option<String>,
    /// Email notification preferences
    #[serde(default)]
    pub email_notifications: NotificationPreferences,
}

impl UserProfile {
    /// Build a fresh profile from identity-provider claims on first login.
    pub fn new(email: String, name: String, picture: Option<String>, email_verified: bool) -> Self {
        Self {
            email,
            name,
            picture,
            email_verified,
            two_factor_enabled: false,
            two_fa_secret: None,
            two_fa_setup_date: None,
            two_fa_last_used: None,
            email_notifications: NotificationPreferences::default(),
        }
    }
}

/// Complete per-user record: profile plus owned subscription list.
///
/// Subscriptions are embedded and never shared across users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub profile: UserProfile,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

impl UserRecord {
    pub fn new(profile: UserProfile) -> Self {
        Self {
            profile,
            subscriptions: Vec::new(),
        }
    }
}
