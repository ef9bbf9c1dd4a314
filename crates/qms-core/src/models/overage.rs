use serde::Serialize;
use uuid::Uuid;

use super::{ResourceType, User};

/// Quota and usage of one resource type, joined for overage reporting.
/// Derived on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overage {
    pub subscription_id: Uuid,
    pub user: User,
    pub plan_id: Uuid,
    pub plan_name: String,
    pub resource_type: ResourceType,
    pub quota_value: f64,
    pub usage_value: f64,
}

impl Overage {
    /// Usage minus quota; positive when over budget.
    pub fn overage(&self) -> f64 {
        self.usage_value - self.quota_value
    }

    pub fn is_exceeded(&self) -> bool {
        self.overage() > 0.0
    }
}
