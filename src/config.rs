//! Application configuration loaded from environment variables.
//!
//! Secrets are read once at startup and kept in memory for the lifetime
//! of the process.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// Path to the JSON document store on disk
    pub store_path: String,
    /// Server port
    pub port: u16,
    /// Issuer name shown in authenticator apps
    pub totp_issuer: String,
    /// Sender address for notification emails
    pub mail_from: String,
    /// Base URL of the HTTP mail API
    pub mail_api_url: String,

    // --- Secrets ---
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for signing the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
    /// Shared token authenticating the cron notification trigger
    pub notify_trigger_token: String,
    /// Mail API key
    pub mail_api_key: String,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            google_client_id: "test_client_id".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            store_path: "data/store.json".to_string(),
            port: 8080,
            totp_issuer: "Subwatch".to_string(),
            mail_from: "reminders@subwatch.test".to_string(),
            mail_api_url: "https://mail.invalid".to_string(),
            google_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
            notify_trigger_token: "test_trigger_token".to_string(),
            mail_api_key: "test_mail_key".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// For local development, secrets can be set via a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            // Non-sensitive config from env
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            store_path: env::var("STORE_PATH").unwrap_or_else(|_| "data/store.json".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            totp_issuer: env::var("TOTP_ISSUER").unwrap_or_else(|_| "Subwatch".to_string()),
            mail_from: env::var("MAIL_FROM").map_err(|_| ConfigError::Missing("MAIL_FROM"))?,
            mail_api_url: env::var("MAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com".to_string()),

            // Secrets
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
            notify_trigger_token: env::var("NOTIFY_TRIGGER_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("NOTIFY_TRIGGER_TOKEN"))?,
            mail_api_key: env::var("MAIL_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("MAIL_API_KEY"))?,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
