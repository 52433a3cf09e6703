//! Subscription model for storage and API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Billing cycle length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

/// A tracked subscription, owned by exactly one user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Opaque id, unique within the owning user's list
    pub id: String,
    pub name: String,
    /// End of the current billing cycle
    pub expiry: NaiveDate,
    /// Non-negative cost per cycle
    pub cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub cycle: BillingCycle,
    pub auto_renew: bool,
    /// Hard cutoff after which auto-renew stops. Meaningless (ignored)
    /// unless auto_renew is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_expiry: Option<NaiveDate>,
    /// Creation timestamp (RFC3339)
    pub created_at: String,
    /// Last modification timestamp (RFC3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}
