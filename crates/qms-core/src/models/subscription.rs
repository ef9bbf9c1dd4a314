use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EffectiveQuota, Plan, Quota, SubscriptionAddon, Usage, User};
use crate::temporal::Effective;

/// A user's enrolment in a plan for a period of time.
///
/// Nothing prevents two subscriptions of one user from overlapping; the
/// active one is chosen at query time (see [`crate::temporal::active_among`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub plan_rate_id: Uuid,
    pub effective_start_date: DateTime<Utc>,
    /// `None` means open-ended.
    pub effective_end_date: Option<DateTime<Utc>>,
    pub paid: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_modified_by: String,
    pub last_modified_at: DateTime<Utc>,
}

impl Effective for Subscription {
    fn effective_start(&self) -> DateTime<Utc> {
        self.effective_start_date
    }

    fn effective_end(&self) -> Option<DateTime<Utc>> {
        self.effective_end_date
    }
}

/// Caller-supplied parameters of a new subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionOptions {
    pub paid: bool,
    /// Number of billing periods purchased, at least 1.
    pub periods: i32,
    pub end_date: Option<DateTime<Utc>>,
}

impl SubscriptionOptions {
    /// Unpaid, `periods` periods, ending one year after `now`.
    pub fn defaults(now: DateTime<Utc>, periods: i32) -> Self {
        Self {
            paid: false,
            periods,
            end_date: now.checked_add_months(Months::new(12)),
        }
    }
}

/// Row values for inserting a subscription
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub plan_rate_id: Uuid,
    pub effective_start_date: DateTime<Utc>,
    pub effective_end_date: Option<DateTime<Utc>>,
    pub paid: bool,
    pub actor: String,
}

/// A subscription with everything hanging off it, including the derived
/// effective-quota view (base quota plus attached add-ons).
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDetails {
    pub subscription: Subscription,
    pub user: User,
    pub plan: Plan,
    pub quotas: Vec<Quota>,
    pub usages: Vec<Usage>,
    pub addons: Vec<SubscriptionAddon>,
    pub effective_quotas: Vec<EffectiveQuota>,
}
