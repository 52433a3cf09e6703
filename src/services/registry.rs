// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription registry: CRUD over a user's subscription list.
//!
//! Every mutation goes through the store's critical section, so concurrent
//! requests against the same user serialize instead of clobbering each
//! other's writes.

use crate::db::JsonStore;
use crate::error::AppError;
use crate::models::{BillingCycle, Subscription};
use crate::time_utils::{advance_one_cycle, format_utc_rfc3339, parse_date};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Caller-supplied subscription fields for create and full-field update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInput {
    pub name: String,
    /// Calendar date, YYYY-MM-DD
    pub expiry: String,
    pub cost: f64,
    #[serde(default)]
    pub notes: Option<String>,
    pub cycle: BillingCycle,
    #[serde(default)]
    pub auto_renew: bool,
    #[serde(default)]
    pub final_expiry: Option<String>,
}

/// Subscription CRUD over the document store.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    store: JsonStore,
}

impl SubscriptionRegistry {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    /// Create a subscription with a fresh opaque id.
    pub async fn create(
        &self,
        user_id: &str,
        input: SubscriptionInput,
        now: DateTime<Utc>,
    ) -> Result<Subscription, AppError> {
        let mut sub = validate(input)?;
        sub.id = new_subscription_id()?;
        sub.created_at = format_utc_rfc3339(now);

        self.store
            .update_user(user_id, |record| {
                record.subscriptions.push(sub.clone());
                Ok(sub.clone())
            })
            .await
    }

    /// Full-field replace of an existing subscription.
    pub async fn update(
        &self,
        user_id: &str,
        sub_id: &str,
        input: SubscriptionInput,
        now: DateTime<Utc>,
    ) -> Result<Subscription, AppError> {
        let replacement = validate(input)?;
        let updated_at = format_utc_rfc3339(now);

        self.store
            .update_user(user_id, |record| {
                let existing = record
                    .subscriptions
                    .iter_mut()
                    .find(|s| s.id == sub_id)
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Subscription {} not found", sub_id))
                    })?;

                let mut next = replacement.clone();
                next.id = existing.id.clone();
                next.created_at = existing.created_at.clone();
                next.updated_at = Some(updated_at.clone());
                *existing = next.clone();
                Ok(next)
            })
            .await
    }

    /// Advance a subscription's expiry by one billing cycle.
    ///
    /// Refused when a final-expiry cutoff on an auto-renewing subscription
    /// has already passed.
    pub async fn renew(
        &self,
        user_id: &str,
        sub_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Subscription, AppError> {
        let updated_at = format_utc_rfc3339(now);

        self.store
            .update_user(user_id, |record| {
                let sub = record
                    .subscriptions
                    .iter_mut()
                    .find(|s| s.id == sub_id)
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Subscription {} not found", sub_id))
                    })?;

                if sub.auto_renew {
                    if let Some(final_expiry) = sub.final_expiry {
                        if now.date_naive() > final_expiry {
                            return Err(AppError::InvalidInput(format!(
                                "Subscription {} passed its final expiry on {}",
                                sub_id, final_expiry
                            )));
                        }
                    }
                }

                sub.expiry = advance_one_cycle(sub.expiry, sub.cycle);
                sub.updated_at = Some(updated_at.clone());
                Ok(sub.clone())
            })
            .await
    }

    /// Delete a subscription by id. A missing id is a no-op, making the
    /// operation idempotent.
    pub async fn delete(&self, user_id: &str, sub_id: &str) -> Result<(), AppError> {
        self.store
            .update_user(user_id, |record| {
                record.subscriptions.retain(|s| s.id != sub_id);
                Ok(())
            })
            .await
    }

    /// List a user's subscriptions in insertion order.
    pub async fn list(&self, user_id: &str) -> Result<Vec<Subscription>, AppError> {
        self.store
            .get_user(user_id)
            .await
            .map(|record| record.subscriptions)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }
}

/// Validate caller input into a subscription with placeholder identity
/// fields (id and timestamps are assigned by the registry).
fn validate(input: SubscriptionInput) -> Result<Subscription, AppError> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Name must not be empty".to_string()));
    }

    if !input.cost.is_finite() || input.cost < 0.0 {
        return Err(AppError::InvalidInput(
            "Cost must be a non-negative number".to_string(),
        ));
    }

    let expiry = parse_date(&input.expiry)?;
    let final_expiry = input
        .final_expiry
        .as_deref()
        .map(parse_date)
        .transpose()?;

    Ok(Subscription {
        id: String::new(),
        name,
        expiry,
        cost: input.cost,
        notes: input.notes.filter(|n| !n.trim().is_empty()),
        cycle: input.cycle,
        auto_renew: input.auto_renew,
        final_expiry,
        created_at: String::new(),
        updated_at: None,
    })
}

/// Opaque random subscription id (8 bytes, hex).
fn new_subscription_id() -> Result<String, AppError> {
    use ring::rand::{SecureRandom, SystemRandom};

    let mut bytes = [0u8; 8];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Configuration("Secure RNG unavailable".to_string()))?;

    Ok(hex::encode(bytes))
}
