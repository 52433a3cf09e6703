// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and calendar arithmetic.

use crate::models::BillingCycle;
use chrono::{DateTime, Months, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Advance a date by one billing cycle using calendar-aware addition.
///
/// Month/year addition clamps to the last valid day of the target month,
/// so Jan 31 + 1 month is Feb 28 (Feb 29 in a leap year), never Mar 3.
pub fn advance_one_cycle(date: NaiveDate, cycle: BillingCycle) -> NaiveDate {
    let months = match cycle {
        BillingCycle::Monthly => Months::new(1),
        BillingCycle::Yearly => Months::new(12),
    };

    // checked_add_months only fails near NaiveDate::MAX, far outside any
    // plausible subscription expiry.
    date.checked_add_months(months).unwrap_or(date)
}

/// Parse a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(raw: &str) -> Result<NaiveDate, crate::error::AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        crate::error::AppError::InvalidInput(format!("Invalid date: {raw} (expected YYYY-MM-DD)"))
    })
}
