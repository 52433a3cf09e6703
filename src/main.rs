// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subwatch API Server
//!
//! Tracks recurring subscriptions, sends expiry reminder emails, and
//! manages Google OAuth login with optional TOTP two-factor auth.

use subwatch::{
    config::Config,
    db::JsonStore,
    services::{GoogleOAuthClient, MailClient, SubscriptionRegistry},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Subwatch API");

    // Open the JSON document store
    let store = JsonStore::open(&config.store_path)
        .await
        .expect("Failed to open document store");

    let registry = SubscriptionRegistry::new(store.clone());

    let mail = MailClient::new(
        config.mail_api_url.clone(),
        config.mail_api_key.clone(),
        config.mail_from.clone(),
    );
    tracing::info!(from = %config.mail_from, "Mail client initialized");

    let google = GoogleOAuthClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        registry,
        mail,
        google,
        pending_enrollments: dashmap::DashMap::new(),
    });

    // Build router
    let app = subwatch::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("subwatch=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
