//! Overage join of quota and usage rows.

use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{
    EffectiveQuota, Overage, Plan, Quota, Subscription, SubscriptionAddon, Usage, User,
};

/// Joins quotas and usages by resource type, one entry per usage row.
///
/// A usage without a matching quota is reported against a quota of zero.
/// Quotas without usage are left out. Entries at or below quota are kept;
/// filtering is up to the consumer.
pub fn join_overages(
    subscription: &Subscription,
    user: &User,
    plan: &Plan,
    quotas: &[Quota],
    usages: &[Usage],
) -> Vec<Overage> {
    let quota_by_resource: HashMap<Uuid, f64> = quotas
        .iter()
        .map(|q| (q.resource_type.id, q.quota_value))
        .collect();

    usages
        .iter()
        .map(|usage| Overage {
            subscription_id: subscription.id,
            user: user.clone(),
            plan_id: plan.id,
            plan_name: plan.name.clone(),
            resource_type: usage.resource_type.clone(),
            quota_value: quota_by_resource
                .get(&usage.resource_type.id)
                .copied()
                .unwrap_or(0.0),
            usage_value: usage.usage_value,
        })
        .collect()
}

/// Base quota plus the amounts of every attached add-on, per resource type.
/// Resource types only reachable through add-ons get a base of zero.
pub fn effective_quotas(quotas: &[Quota], addons: &[SubscriptionAddon]) -> Vec<EffectiveQuota> {
    let mut view: Vec<EffectiveQuota> = quotas
        .iter()
        .map(|q| EffectiveQuota {
            resource_type: q.resource_type.clone(),
            base_quota: q.quota_value,
            addon_amount: 0.0,
        })
        .collect();

    for addon in addons {
        let resource_type = &addon.addon.resource_type;
        match view.iter_mut().find(|e| e.resource_type.id == resource_type.id) {
            Some(entry) => entry.addon_amount += addon.effective_amount(),
            None => view.push(EffectiveQuota {
                resource_type: resource_type.clone(),
                base_quota: 0.0,
                addon_amount: addon.effective_amount(),
            }),
        }
    }

    view
}
