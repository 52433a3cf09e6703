// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod expiry;
pub mod google_oauth;
pub mod notify;
pub mod registry;
pub mod twofactor;

pub use expiry::{evaluate, ExpiryStatus};
pub use google_oauth::{GoogleOAuthClient, GoogleUserInfo};
pub use notify::{BatchReport, MailClient, NotificationDispatcher};
pub use registry::{SubscriptionInput, SubscriptionRegistry};
pub use twofactor::{EnrollmentChallenge, TwoFactorSession};
