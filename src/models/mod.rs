// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod subscription;
pub mod user;

pub use subscription::{BillingCycle, Subscription};
pub use user::{NotificationPreferences, UserProfile, UserRecord};
