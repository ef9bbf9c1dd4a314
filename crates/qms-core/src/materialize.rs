//! Quota materialisation: turning a plan's quota defaults into the quota rows
//! of a new subscription.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewQuota, Plan, PlanQuotaDefault, PlanRate, SubscriptionOptions};
use crate::temporal::active_among;

/// Rate a new subscription to `plan` is billed at.
pub fn active_rate(plan: &Plan, now: DateTime<Utc>) -> Result<&PlanRate, AppError> {
    active_among(now, &plan.rates).ok_or_else(|| AppError::NoEffectiveRate {
        plan: plan.name.clone(),
    })
}

/// One default per resource type: the one with the latest effective date not
/// after `now`. Defaults dated in the future are ignored.
pub fn active_quota_defaults(plan: &Plan, now: DateTime<Utc>) -> Vec<&PlanQuotaDefault> {
    let mut by_resource: BTreeMap<Uuid, Vec<&PlanQuotaDefault>> = BTreeMap::new();
    for default in &plan.quota_defaults {
        by_resource
            .entry(default.resource_type.id)
            .or_default()
            .push(default);
    }

    by_resource
        .values()
        .filter_map(|defaults| active_among(now, defaults.iter().copied()))
        .collect()
}

/// Quota value for one default. Consumable resources get the period
/// multiplier applied twice.
pub fn quota_value(default: &PlanQuotaDefault, periods: i32) -> f64 {
    let periods = f64::from(periods);
    let mut value = default.quota_value * periods;
    if default.resource_type.consumable {
        value *= periods;
    }
    value
}

pub fn validate_options(
    options: &SubscriptionOptions,
    start: DateTime<Utc>,
) -> Result<(), AppError> {
    if options.periods < 1 {
        return Err(AppError::InvalidInput(format!(
            "periods must be at least 1, got {}",
            options.periods
        )));
    }
    if let Some(end) = options.end_date {
        if end < start {
            return Err(AppError::InvalidInput(
                "end date must not be before the start date".to_string(),
            ));
        }
    }
    Ok(())
}

/// Quota rows for a subscription created at `now`, one per resource type.
pub fn materialize(
    plan: &Plan,
    subscription_id: Uuid,
    options: &SubscriptionOptions,
    now: DateTime<Utc>,
    actor: &str,
) -> Vec<NewQuota> {
    active_quota_defaults(plan, now)
        .into_iter()
        .map(|default| NewQuota {
            subscription_id,
            resource_type: default.resource_type.clone(),
            quota_value: quota_value(default, options.periods),
            actor: actor.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceType;
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use std::collections::HashSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn resource(name: &str, consumable: bool) -> ResourceType {
        ResourceType {
            id: Uuid::new_v4(),
            name: name.to_string(),
            unit: "units".to_string(),
            consumable,
        }
    }

    fn default_for(
        plan_id: Uuid,
        resource_type: &ResourceType,
        value: f64,
        effective: DateTime<Utc>,
    ) -> PlanQuotaDefault {
        PlanQuotaDefault {
            id: Uuid::new_v4(),
            plan_id,
            resource_type: resource_type.clone(),
            quota_value: value,
            effective_date: effective,
        }
    }

    fn plan(defaults: Vec<PlanQuotaDefault>, rates: Vec<PlanRate>) -> Plan {
        Plan {
            id: Uuid::new_v4(),
            name: "Basic".to_string(),
            description: "Basic plan".to_string(),
            quota_defaults: defaults,
            rates,
        }
    }

    fn options(periods: i32) -> SubscriptionOptions {
        SubscriptionOptions {
            paid: false,
            periods,
            end_date: None,
        }
    }

    #[test]
    fn materializes_one_row_per_default_with_period_scaling() {
        let cpu = resource("cpu.hours", true);
        let data = resource("data.size", false);
        let plan_id = Uuid::new_v4();
        let since = now() - Duration::days(30);
        let plan = plan(
            vec![
                default_for(plan_id, &cpu, 20.0, since),
                default_for(plan_id, &data, 5.0, since),
            ],
            vec![],
        );
        let subscription_id = Uuid::new_v4();

        for periods in 1..=4 {
            let rows = materialize(&plan, subscription_id, &options(periods), now(), "de");
            assert_eq!(rows.len(), 2);

            let unique: HashSet<Uuid> = rows.iter().map(|r| r.resource_type.id).collect();
            assert_eq!(unique.len(), rows.len());

            let p = f64::from(periods);
            for row in rows {
                assert_eq!(row.subscription_id, subscription_id);
                assert_eq!(row.actor, "de");
                if row.resource_type.id == cpu.id {
                    assert_eq!(row.quota_value, 20.0 * p * p);
                } else {
                    assert_eq!(row.quota_value, 5.0 * p);
                }
            }
        }
    }

    #[test]
    fn later_default_for_same_resource_supersedes_earlier_one() {
        let data = resource("data.size", false);
        let plan_id = Uuid::new_v4();
        let plan = plan(
            vec![
                default_for(plan_id, &data, 5.0, now() - Duration::days(60)),
                default_for(plan_id, &data, 8.0, now() - Duration::days(10)),
                default_for(plan_id, &data, 100.0, now() + Duration::days(10)),
            ],
            vec![],
        );

        let rows = materialize(&plan, Uuid::new_v4(), &options(1), now(), "de");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quota_value, 8.0);
    }

    #[test]
    fn plan_without_current_rate_has_no_effective_rate() {
        let plan_id = Uuid::new_v4();
        let empty = plan(vec![], vec![]);
        assert!(matches!(
            active_rate(&empty, now()),
            Err(AppError::NoEffectiveRate { ref plan }) if plan == "Basic"
        ));

        let future_only = plan(
            vec![],
            vec![PlanRate {
                id: Uuid::new_v4(),
                plan_id,
                effective_date: now() + Duration::days(1),
                rate: Decimal::new(1000, 2),
            }],
        );
        assert!(active_rate(&future_only, now()).is_err());
    }

    #[test]
    fn active_rate_is_most_recent_not_in_future() {
        let plan_id = Uuid::new_v4();
        let rate = |days: i64, cents: i64| PlanRate {
            id: Uuid::new_v4(),
            plan_id,
            effective_date: now() + Duration::days(days),
            rate: Decimal::new(cents, 2),
        };
        let plan = plan(vec![], vec![rate(-90, 500), rate(-5, 750), rate(5, 900)]);
        assert_eq!(active_rate(&plan, now()).unwrap().rate, Decimal::new(750, 2));
    }

    #[test]
    fn options_validation() {
        assert!(validate_options(&options(1), now()).is_ok());
        assert!(matches!(
            validate_options(&options(0), now()),
            Err(AppError::InvalidInput(_))
        ));

        let mut backwards = options(1);
        backwards.end_date = Some(now() - Duration::seconds(1));
        assert!(validate_options(&backwards, now()).is_err());

        let mut same_instant = options(1);
        same_instant.end_date = Some(now());
        assert!(validate_options(&same_instant, now()).is_ok());
    }
}
