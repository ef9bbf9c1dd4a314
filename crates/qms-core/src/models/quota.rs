use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ResourceType;

/// Absolute resource allotment granted to one subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quota {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub resource_type: ResourceType,
    pub quota_value: f64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_modified_by: String,
    pub last_modified_at: DateTime<Utc>,
}

/// Row values for inserting a quota
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuota {
    pub subscription_id: Uuid,
    pub resource_type: ResourceType,
    pub quota_value: f64,
    pub actor: String,
}

/// Quota available to a subscription once add-ons are folded in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveQuota {
    pub resource_type: ResourceType,
    pub base_quota: f64,
    pub addon_amount: f64,
}

impl EffectiveQuota {
    pub fn total(&self) -> f64 {
        self.base_quota + self.addon_amount
    }
}
