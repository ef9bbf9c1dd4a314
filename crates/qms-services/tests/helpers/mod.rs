//! Shared fixtures for the service tests: a seeded in-memory store with one
//! user, two resource types and a subscribable plan.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use qms_core::models::{
    NewPlanQuotaDefault, NewPlanRate, NewResourceType, Plan, ResourceType, Subscription,
    SubscriptionOptions, User,
};
use qms_core::{FixedClock, QuotaStore};
use qms_services::{
    CatalogService, MemoryStore, NewPlanRequest, SubscriptionService, UsageLedger,
};
use rust_decimal::Decimal;

pub const ACTOR: &str = "de";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn subscriptions_at(at: DateTime<Utc>) -> SubscriptionService {
    SubscriptionService::new(Arc::new(FixedClock(at)), ACTOR)
}

pub fn options(periods: i32) -> SubscriptionOptions {
    SubscriptionOptions {
        paid: false,
        periods,
        end_date: Some(now() + Duration::days(365)),
    }
}

pub struct Fixture {
    pub store: MemoryStore,
    pub subscriptions: SubscriptionService,
    pub ledger: UsageLedger,
    pub user: User,
    /// Consumable, 10 hours per period
    pub cpu: ResourceType,
    /// Capacity, 100 GiB
    pub storage: ResourceType,
    pub plan: Plan,
}

impl Fixture {
    /// Subscribes the fixture user to the fixture plan and returns the subscription.
    pub async fn subscribe(&self, periods: i32) -> Subscription {
        let mut ctx = self.store.autocommit().await.unwrap();
        self.subscriptions
            .create_subscription(&mut ctx, self.user.id, self.plan.id, options(periods))
            .await
            .unwrap()
    }
}

pub async fn resource_type(store: &MemoryStore, name: &str, unit: &str, consumable: bool) -> ResourceType {
    let mut ctx = store.autocommit().await.unwrap();
    CatalogService::new()
        .add_resource_type(
            &mut ctx,
            NewResourceType {
                name: name.to_string(),
                unit: unit.to_string(),
                consumable,
            },
        )
        .await
        .unwrap()
}

pub async fn seed() -> Fixture {
    let store = MemoryStore::with_clock(Arc::new(FixedClock(now())));
    let subscriptions = subscriptions_at(now());

    let cpu = resource_type(&store, "cpu.hours", "hours", true).await;
    let storage = resource_type(&store, "data.size", "GiB", false).await;

    let mut ctx = store.autocommit().await.unwrap();
    let user = subscriptions.ensure_user(&mut ctx, "alice").await.unwrap();
    let plan = CatalogService::new()
        .add_plan(
            &mut ctx,
            NewPlanRequest {
                name: "Basic".to_string(),
                description: "Entry plan".to_string(),
                quota_defaults: vec![
                    NewPlanQuotaDefault {
                        resource_type_id: cpu.id,
                        quota_value: 10.0,
                        effective_date: now() - Duration::days(30),
                    },
                    NewPlanQuotaDefault {
                        resource_type_id: storage.id,
                        quota_value: 100.0,
                        effective_date: now() - Duration::days(30),
                    },
                ],
                rates: vec![NewPlanRate {
                    effective_date: now() - Duration::days(30),
                    rate: Decimal::new(1000, 2),
                }],
            },
        )
        .await
        .unwrap();

    Fixture {
        store,
        subscriptions,
        ledger: UsageLedger::new(ACTOR),
        user,
        cpu,
        storage,
        plan,
    }
}
