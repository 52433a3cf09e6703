// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subwatch: track recurring subscriptions and get expiry reminders.
//!
//! This crate provides the backend API: Google OAuth login, optional TOTP
//! two-factor authentication, subscription CRUD over a single JSON document
//! store, and a scheduled email notification batch.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use dashmap::DashMap;
use db::JsonStore;
use services::{GoogleOAuthClient, MailClient, SubscriptionRegistry};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: JsonStore,
    pub registry: SubscriptionRegistry,
    pub mail: MailClient,
    pub google: GoogleOAuthClient,
    /// Candidate TOTP secrets for in-flight 2FA enrollments, keyed by user
    /// id. Ephemeral on purpose: a restart simply restarts enrollment.
    pub pending_enrollments: DashMap<String, String>,
}
