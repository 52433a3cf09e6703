// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth client for login: authorization URL construction, code
//! exchange, and userinfo retrieval.

use crate::error::AppError;
use serde::Deserialize;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Google OAuth client.
#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
}

/// Token exchange response (only the fields we use).
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Identity claims from the userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    /// Stable provider-issued subject id; our document store key
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
}

impl GoogleOAuthClient {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
        }
    }

    /// Build the authorization redirect URL.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope=openid%20email%20profile&state={}",
            AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            state,
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Token exchange request failed: {}", e)))?;

        Self::check_response_json(response).await
    }

    /// Fetch identity claims for the logged-in user.
    pub async fn get_userinfo(&self, access_token: &str) -> Result<GoogleUserInfo, AppError> {
        let response = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Userinfo request failed: {}", e)))?;

        Self::check_response_json(response).await
    }

    /// Check response status and deserialize the JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Transport(format!(
                "Google API returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Transport(format!("Invalid Google API response: {}", e)))
    }
}
