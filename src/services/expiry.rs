// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pure expiry classification for subscriptions.
//!
//! Everything here is side-effect free: callers pass the current instant
//! explicitly, which keeps the day-boundary behavior deterministic in tests.
//!
//! Two sets of flags come out of evaluation and they deliberately differ:
//! `is_critical` and `is_expiring_soon` are *display* flags whose windows
//! overlap (critical implies expiring-soon), while the notification
//! dispatcher applies its own disjoint day ranges when deciding what to
//! send. Callers picking a single display label must check critical first.

use crate::models::Subscription;
use crate::time_utils::advance_one_cycle;
use chrono::{DateTime, NaiveDate, Utc};

/// Subscriptions within this many days of expiry are "expiring soon".
pub const EXPIRING_SOON_WINDOW_DAYS: i64 = 30;
/// Subscriptions within this many days of expiry are "critical".
pub const CRITICAL_WINDOW_DAYS: i64 = 2;

/// Countdown breakdown for live display. Zeroed once expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct TimeRemaining {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

/// Final-expiry classification for auto-renewing subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum FinalExpiryState {
    /// The hard cutoff has passed; takes display precedence over plain expiry
    Expired,
    /// The hard cutoff is within the expiring-soon window
    Warning { days_until_final: i64 },
}

/// Full classification of a subscription at a given instant.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryStatus {
    /// Calendar-day difference from today to the expiry date (may be negative)
    pub total_days: i64,
    pub is_expired: bool,
    pub is_expiring_soon: bool,
    pub is_critical: bool,
    pub remaining: TimeRemaining,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_state: Option<FinalExpiryState>,
    /// Where the expiry lands after one more billing cycle
    pub next_renewal: NaiveDate,
}

/// Classify a subscription against the current instant.
pub fn evaluate(sub: &Subscription, now: DateTime<Utc>) -> ExpiryStatus {
    let total_days = total_days(sub.expiry, now);
    let is_expired = total_days < 0;

    let (is_expiring_soon, is_critical, remaining) = if is_expired {
        (false, false, TimeRemaining::default())
    } else {
        (
            total_days <= EXPIRING_SOON_WINDOW_DAYS,
            total_days <= CRITICAL_WINDOW_DAYS,
            remaining_breakdown(sub.expiry, now),
        )
    };

    ExpiryStatus {
        total_days,
        is_expired,
        is_expiring_soon,
        is_critical,
        remaining,
        final_state: final_state(sub, now),
        next_renewal: advance_one_cycle(sub.expiry, sub.cycle),
    }
}

/// Calendar-day difference from today to the expiry date.
///
/// Same-day expiry yields 0: the subscription is not yet expired until the
/// calendar day is over.
pub fn total_days(expiry: NaiveDate, now: DateTime<Utc>) -> i64 {
    (expiry - now.date_naive()).num_days()
}

/// Whole seconds until the expiry day begins, clamped at zero.
///
/// The countdown target is the start of the expiry day; on the expiry day
/// itself the countdown reads zero while `total_days` still reads 0 and the
/// subscription is not yet expired.
fn seconds_until_expiry(expiry: NaiveDate, now: DateTime<Utc>) -> i64 {
    let target = expiry.and_hms_opt(0, 0, 0).expect("midnight").and_utc();
    (target - now).num_seconds().max(0)
}

fn remaining_breakdown(expiry: NaiveDate, now: DateTime<Utc>) -> TimeRemaining {
    let secs = seconds_until_expiry(expiry, now);
    TimeRemaining {
        days: secs / 86_400,
        hours: (secs % 86_400) / 3_600,
        minutes: (secs % 3_600) / 60,
        seconds: secs % 60,
    }
}

/// Hours until expiry, rounded up. Used in critical reminder messages.
pub fn hours_left_ceil(expiry: NaiveDate, now: DateTime<Utc>) -> i64 {
    // seconds_until_expiry is clamped non-negative; i64::div_ceil is unstable
    (seconds_until_expiry(expiry, now) as u64).div_ceil(3_600) as i64
}

/// Days until expiry, rounded up. Used in expiring-soon reminder messages.
pub fn days_left_ceil(expiry: NaiveDate, now: DateTime<Utc>) -> i64 {
    // seconds_until_expiry is clamped non-negative; i64::div_ceil is unstable
    (seconds_until_expiry(expiry, now) as u64).div_ceil(86_400) as i64
}

/// Final-expiry classification. Only meaningful for auto-renewing
/// subscriptions with a hard cutoff; otherwise None.
fn final_state(sub: &Subscription, now: DateTime<Utc>) -> Option<FinalExpiryState> {
    if !sub.auto_renew {
        return None;
    }
    let final_expiry = sub.final_expiry?;

    let days_until_final = (final_expiry - now.date_naive()).num_days();
    if days_until_final < 0 {
        Some(FinalExpiryState::Expired)
    } else if days_until_final <= EXPIRING_SOON_WINDOW_DAYS {
        Some(FinalExpiryState::Warning { days_until_final })
    } else {
        None
    }
}
