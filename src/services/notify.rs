// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Expiry notification dispatch.
//!
//! The dispatcher owns the authoritative send policy: per subscription the
//! day ranges (2, 30] (expiring-soon) and (0, 2] (critical) are disjoint,
//! so at most one email ever goes out for a subscription on a given day.
//! This is intentionally stricter than the overlapping display flags the
//! evaluator produces.
//!
//! Transport failures are recorded per item; the batch always runs to
//! completion across all users and subscriptions.

use crate::db::JsonStore;
use crate::error::AppError;
use crate::models::{NotificationPreferences, Subscription};
use crate::services::expiry::{
    days_left_ceil, hours_left_ceil, total_days, CRITICAL_WINDOW_DAYS, EXPIRING_SOON_WINDOW_DAYS,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};

// ─── Mail transport client ───────────────────────────────────

/// One outbound email, as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Clone)]
enum MailerInner {
    /// HTTP mail API (Resend-compatible request shape)
    Http {
        http: reqwest::Client,
        api_url: String,
        api_key: String,
        from: String,
    },
    /// Records sends in memory for tests
    Capture(Arc<Mutex<Vec<OutboundEmail>>>),
    /// Every send fails with a transport error
    Offline,
}

/// Mail transport client.
#[derive(Clone)]
pub struct MailClient {
    inner: MailerInner,
}

impl MailClient {
    /// Create a client against the configured HTTP mail API.
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            inner: MailerInner::Http {
                http: reqwest::Client::new(),
                api_url,
                api_key,
                from,
            },
        }
    }

    /// Create a capturing client for tests, plus a handle to the sent mail.
    pub fn new_capture() -> (Self, Arc<Mutex<Vec<OutboundEmail>>>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner: MailerInner::Capture(captured.clone()),
            },
            captured,
        )
    }

    /// Create a client whose every send fails (offline mode).
    pub fn new_offline() -> Self {
        Self {
            inner: MailerInner::Offline,
        }
    }

    /// Send one email. Failures are `Transport` errors.
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        match &self.inner {
            MailerInner::Http {
                http,
                api_url,
                api_key,
                from,
            } => {
                let payload = serde_json::json!({
                    "from": from,
                    "to": [to],
                    "subject": subject,
                    "text": body,
                });

                let response = http
                    .post(format!("{}/emails", api_url))
                    .bearer_auth(api_key)
                    .json(&payload)
                    .send()
                    .await
                    .map_err(|e| AppError::Transport(format!("Mail request failed: {}", e)))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(AppError::Transport(format!(
                        "Mail API returned {}: {}",
                        status, body
                    )));
                }
                Ok(())
            }
            MailerInner::Capture(captured) => {
                captured.lock().expect("capture lock").push(OutboundEmail {
                    to: to.to_string(),
                    subject: subject.to_string(),
                    body: body.to_string(),
                });
                Ok(())
            }
            MailerInner::Offline => Err(AppError::Transport(
                "Mail transport not connected (offline mode)".to_string(),
            )),
        }
    }
}

// ─── Send policy ─────────────────────────────────────────────

/// What kind of reminder a subscription is due, with the remaining value
/// quoted in the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum NotificationKind {
    ExpiringSoon { days_left: i64 },
    Critical { hours_left: i64 },
}

impl NotificationKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExpiringSoon { .. } => "expiring_soon",
            Self::Critical { .. } => "critical",
        }
    }
}

/// Decide whether a reminder is due for one subscription.
///
/// The ranges here are deliberately disjoint: (0, 2] is critical, (2, 30]
/// is expiring-soon, everything else (including already-expired) sends
/// nothing.
pub fn eligible_kind(
    sub: &Subscription,
    prefs: &NotificationPreferences,
    now: DateTime<Utc>,
) -> Option<NotificationKind> {
    if !prefs.enabled {
        return None;
    }

    let days = total_days(sub.expiry, now);
    if days <= 0 {
        // Expired (or expiring today): nothing to warn about anymore
        None
    } else if days <= CRITICAL_WINDOW_DAYS {
        prefs.critical.then(|| NotificationKind::Critical {
            hours_left: hours_left_ceil(sub.expiry, now),
        })
    } else if days <= EXPIRING_SOON_WINDOW_DAYS {
        prefs.expiring_soon.then(|| NotificationKind::ExpiringSoon {
            days_left: days_left_ceil(sub.expiry, now),
        })
    } else {
        None
    }
}

/// Render the reminder message for one subscription.
fn render_message(sub: &Subscription, kind: NotificationKind) -> (String, String) {
    match kind {
        NotificationKind::Critical { hours_left } => (
            format!("{} expires in {} hours", sub.name, hours_left),
            format!(
                "Your subscription \"{}\" (${:.2}) expires on {}. Only about {} hours left to renew.",
                sub.name, sub.cost, sub.expiry, hours_left
            ),
        ),
        NotificationKind::ExpiringSoon { days_left } => (
            format!("{} expires in {} days", sub.name, days_left),
            format!(
                "Your subscription \"{}\" (${:.2}) expires on {}. {} days left to renew.",
                sub.name, sub.cost, sub.expiry, days_left
            ),
        ),
    }
}

// ─── Batch dispatch ──────────────────────────────────────────

/// One reminder that went out.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentNotification {
    pub user_id: String,
    pub subscription_id: String,
    pub kind: &'static str,
    /// Hours left for critical, days left for expiring-soon
    pub remaining: i64,
}

/// One reminder that failed at the transport.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFailure {
    pub user_id: String,
    pub subscription_id: String,
    pub error: String,
}

/// Transient observability record for one batch run. Not persisted.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub users_evaluated: usize,
    pub sent: Vec<SentNotification>,
    pub failed: Vec<NotificationFailure>,
}

/// Evaluates all users' subscriptions and sends whatever is due.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: JsonStore,
    mail: MailClient,
}

impl NotificationDispatcher {
    pub fn new(store: JsonStore, mail: MailClient) -> Self {
        Self { store, mail }
    }

    /// Run one notification batch over every user in the store.
    pub async fn run_batch(&self, now: DateTime<Utc>) -> BatchReport {
        let mut report = BatchReport::default();

        for user_id in self.store.user_ids().await {
            let Some(record) = self.store.get_user(&user_id).await else {
                // Deleted between listing and fetch
                continue;
            };
            report.users_evaluated += 1;

            let prefs = &record.profile.email_notifications;
            for sub in &record.subscriptions {
                let Some(kind) = eligible_kind(sub, prefs, now) else {
                    continue;
                };

                let (subject, body) = render_message(sub, kind);
                match self.mail.send(&record.profile.email, &subject, &body).await {
                    Ok(()) => {
                        let remaining = match kind {
                            NotificationKind::Critical { hours_left } => hours_left,
                            NotificationKind::ExpiringSoon { days_left } => days_left,
                        };
                        tracing::info!(
                            user_id = %user_id,
                            subscription_id = %sub.id,
                            kind = kind.label(),
                            remaining,
                            "Reminder sent"
                        );
                        report.sent.push(SentNotification {
                            user_id: user_id.clone(),
                            subscription_id: sub.id.clone(),
                            kind: kind.label(),
                            remaining,
                        });
                    }
                    Err(e) => {
                        // Per-item failure: record and keep going
                        tracing::warn!(
                            user_id = %user_id,
                            subscription_id = %sub.id,
                            error = %e,
                            "Reminder send failed"
                        );
                        report.failed.push(NotificationFailure {
                            user_id: user_id.clone(),
                            subscription_id: sub.id.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        tracing::info!(
            users = report.users_evaluated,
            sent = report.sent.len(),
            failed = report.failed.len(),
            "Notification batch complete"
        );

        report
    }
}
