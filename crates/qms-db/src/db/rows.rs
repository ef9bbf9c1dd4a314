//! Flat row types returned by the queries and the functions that assemble
//! them into domain entities. Entities never map themselves.

use chrono::{DateTime, Utc};
use qms_core::models::{
    Addon, Plan, PlanQuotaDefault, PlanRate, Quota, ResourceType, SubscriptionAddon, Usage,
};
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

/// Columns selected for the joined `resource_types` row (`rt_*` aliases).
pub(crate) const RESOURCE_TYPE_COLUMNS: &str =
    "rt.id AS rt_id, rt.name AS rt_name, rt.unit AS rt_unit, rt.consumable AS rt_consumable";

fn resource_type(id: Uuid, name: String, unit: String, consumable: bool) -> ResourceType {
    ResourceType {
        id,
        name,
        unit,
        consumable,
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PlanRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

#[derive(Debug, FromRow)]
pub(crate) struct PlanQuotaDefaultRow {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub quota_value: f64,
    pub effective_date: DateTime<Utc>,
    pub rt_id: Uuid,
    pub rt_name: String,
    pub rt_unit: String,
    pub rt_consumable: bool,
}

impl PlanQuotaDefaultRow {
    pub fn into_quota_default(self) -> PlanQuotaDefault {
        PlanQuotaDefault {
            id: self.id,
            plan_id: self.plan_id,
            resource_type: resource_type(self.rt_id, self.rt_name, self.rt_unit, self.rt_consumable),
            quota_value: self.quota_value,
            effective_date: self.effective_date,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct QuotaRow {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub quota: f64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_modified_by: String,
    pub last_modified_at: DateTime<Utc>,
    pub rt_id: Uuid,
    pub rt_name: String,
    pub rt_unit: String,
    pub rt_consumable: bool,
}

impl QuotaRow {
    pub fn into_quota(self) -> Quota {
        Quota {
            id: self.id,
            subscription_id: self.subscription_id,
            resource_type: resource_type(self.rt_id, self.rt_name, self.rt_unit, self.rt_consumable),
            quota_value: self.quota,
            created_by: self.created_by,
            created_at: self.created_at,
            last_modified_by: self.last_modified_by,
            last_modified_at: self.last_modified_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct UsageRow {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub usage: f64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_modified_by: String,
    pub last_modified_at: DateTime<Utc>,
    pub rt_id: Uuid,
    pub rt_name: String,
    pub rt_unit: String,
    pub rt_consumable: bool,
}

impl UsageRow {
    pub fn into_usage(self) -> Usage {
        Usage {
            id: self.id,
            subscription_id: self.subscription_id,
            resource_type: resource_type(self.rt_id, self.rt_name, self.rt_unit, self.rt_consumable),
            usage_value: self.usage,
            created_by: self.created_by,
            created_at: self.created_at,
            last_modified_by: self.last_modified_by,
            last_modified_at: self.last_modified_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct AddonRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub default_amount: f64,
    pub default_paid: bool,
    pub rt_id: Uuid,
    pub rt_name: String,
    pub rt_unit: String,
    pub rt_consumable: bool,
}

impl AddonRow {
    pub fn into_addon(self) -> Addon {
        Addon {
            id: self.id,
            name: self.name,
            description: self.description,
            resource_type: resource_type(self.rt_id, self.rt_name, self.rt_unit, self.rt_consumable),
            default_amount: self.default_amount,
            paid: self.default_paid,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct SubscriptionAddonRow {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub amount: Option<f64>,
    pub paid: bool,
    pub addon_id: Uuid,
    pub addon_name: String,
    pub addon_description: String,
    pub addon_default_amount: f64,
    pub addon_default_paid: bool,
    pub rt_id: Uuid,
    pub rt_name: String,
    pub rt_unit: String,
    pub rt_consumable: bool,
}

impl SubscriptionAddonRow {
    pub fn into_subscription_addon(self) -> SubscriptionAddon {
        SubscriptionAddon {
            id: self.id,
            subscription_id: self.subscription_id,
            addon: Addon {
                id: self.addon_id,
                name: self.addon_name,
                description: self.addon_description,
                resource_type: resource_type(
                    self.rt_id,
                    self.rt_name,
                    self.rt_unit,
                    self.rt_consumable,
                ),
                default_amount: self.addon_default_amount,
                paid: self.addon_default_paid,
            },
            amount: self.amount,
            paid: self.paid,
        }
    }
}

/// Attaches already-fetched defaults and rates to a plan row.
pub(crate) fn assemble_plan(
    row: PlanRow,
    quota_defaults: Vec<PlanQuotaDefault>,
    rates: Vec<PlanRate>,
) -> Plan {
    Plan {
        id: row.id,
        name: row.name,
        description: row.description,
        quota_defaults,
        rates,
    }
}

/// Distributes defaults and rates fetched for many plans over their plans,
/// preserving the order of `rows`.
pub(crate) fn assemble_plans(
    rows: Vec<PlanRow>,
    quota_defaults: Vec<PlanQuotaDefault>,
    rates: Vec<PlanRate>,
) -> Vec<Plan> {
    let mut defaults_by_plan: HashMap<Uuid, Vec<PlanQuotaDefault>> = HashMap::new();
    for default in quota_defaults {
        defaults_by_plan
            .entry(default.plan_id)
            .or_default()
            .push(default);
    }

    let mut rates_by_plan: HashMap<Uuid, Vec<PlanRate>> = HashMap::new();
    for rate in rates {
        rates_by_plan.entry(rate.plan_id).or_default().push(rate);
    }

    rows.into_iter()
        .map(|row| {
            let defaults = defaults_by_plan.remove(&row.id).unwrap_or_default();
            let rates = rates_by_plan.remove(&row.id).unwrap_or_default();
            assemble_plan(row, defaults, rates)
        })
        .collect()
}
