use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ResourceType;
use crate::temporal::Effective;

/// Subscription plan template with its rate history and quota defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub quota_defaults: Vec<PlanQuotaDefault>,
    pub rates: Vec<PlanRate>,
}

/// Priced version of a plan, effective from `effective_date` until superseded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PlanRate {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub effective_date: DateTime<Utc>,
    pub rate: Decimal,
}

impl Effective for PlanRate {
    fn effective_start(&self) -> DateTime<Utc> {
        self.effective_date
    }

    fn effective_end(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// Template amount of a resource granted by a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanQuotaDefault {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub resource_type: ResourceType,
    pub quota_value: f64,
    pub effective_date: DateTime<Utc>,
}

impl Effective for PlanQuotaDefault {
    fn effective_start(&self) -> DateTime<Utc> {
        self.effective_date
    }

    fn effective_end(&self) -> Option<DateTime<Utc>> {
        None
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlan {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlanQuotaDefault {
    pub resource_type_id: Uuid,
    pub quota_value: f64,
    pub effective_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlanRate {
    pub effective_date: DateTime<Utc>,
    pub rate: Decimal,
}
