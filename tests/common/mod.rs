// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::sync::{Arc, Mutex};
use subwatch::config::Config;
use subwatch::db::JsonStore;
use subwatch::middleware::auth::create_jwt;
use subwatch::models::{UserProfile, UserRecord};
use subwatch::routes::create_router;
use subwatch::services::notify::OutboundEmail;
use subwatch::services::twofactor::TwoFactorSession;
use subwatch::services::{GoogleOAuthClient, MailClient, SubscriptionRegistry};
use subwatch::AppState;

/// Create a test app with an in-memory store and a capturing mail client.
/// Returns the router, the shared state, and the captured outbound mail.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<Mutex<Vec<OutboundEmail>>>) {
    let config = Config::default();
    let store = JsonStore::new_in_memory();
    let registry = SubscriptionRegistry::new(store.clone());
    let (mail, captured) = MailClient::new_capture();
    let google = GoogleOAuthClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    );

    let state = Arc::new(AppState {
        config,
        store,
        registry,
        mail,
        google,
        pending_enrollments: dashmap::DashMap::new(),
    });

    (create_router(state.clone()), state, captured)
}

/// Seed a user record and return its id.
#[allow(dead_code)]
pub async fn seed_user(state: &AppState, user_id: &str, email: &str) {
    state
        .store
        .put_user(
            user_id,
            UserRecord::new(UserProfile::new(
                email.to_string(),
                "Test User".to_string(),
                None,
                true,
            )),
        )
        .await
        .expect("seeding user");
}

/// Create a fully authenticated session token for tests.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, signing_key: &[u8]) -> String {
    create_jwt(user_id, TwoFactorSession::NoneRequired, signing_key).expect("test jwt")
}

/// Create a pending-2FA session token for tests.
#[allow(dead_code)]
pub fn create_pending_jwt(user_id: &str, signing_key: &[u8]) -> String {
    create_jwt(user_id, TwoFactorSession::Pending, signing_key).expect("test jwt")
}
