mod helpers;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Months};
use helpers::{now, options, seed, subscriptions_at, ACTOR};
use qms_core::models::{NewPlanQuotaDefault, NewPlanRate, SubscriptionOptions};
use qms_core::{AppError, FixedClock, QuotaStore, TransactionContext};
use qms_services::{AddonService, CatalogService, NewPlanRequest, SubscriptionService};
use rust_decimal::Decimal;
use uuid::Uuid;

#[tokio::test]
async fn test_create_subscription_materializes_one_quota_per_default() {
    let fx = seed().await;
    let subscription = fx.subscribe(3).await;

    assert_eq!(subscription.user_id, fx.user.id);
    assert_eq!(subscription.plan_id, fx.plan.id);
    assert_eq!(subscription.plan_rate_id, fx.plan.rates[0].id);
    assert_eq!(subscription.effective_start_date, now());
    assert_eq!(subscription.created_by, ACTOR);
    assert!(!subscription.paid);

    let mut ctx = fx.store.autocommit().await.unwrap();
    let quotas = ctx.list_quotas(subscription.id).await.unwrap();
    assert_eq!(quotas.len(), fx.plan.quota_defaults.len());

    let unique: HashSet<_> = quotas.iter().map(|q| q.resource_type.id).collect();
    assert_eq!(unique.len(), quotas.len());

    let cpu = quotas.iter().find(|q| q.resource_type.id == fx.cpu.id).unwrap();
    let storage = quotas
        .iter()
        .find(|q| q.resource_type.id == fx.storage.id)
        .unwrap();
    // Consumable resources are multiplied by the period count twice.
    assert_eq!(cpu.quota_value, 10.0 * 3.0 * 3.0);
    assert_eq!(storage.quota_value, 100.0 * 3.0);
}

#[tokio::test]
async fn test_single_period_quota_matches_default() {
    let fx = seed().await;
    let subscription = fx.subscribe(1).await;

    let mut ctx = fx.store.autocommit().await.unwrap();
    let quotas = ctx.list_quotas(subscription.id).await.unwrap();
    for quota in quotas {
        let default = fx
            .plan
            .quota_defaults
            .iter()
            .find(|d| d.resource_type.id == quota.resource_type.id)
            .unwrap();
        assert_eq!(quota.quota_value, default.quota_value);
    }
}

#[tokio::test]
async fn test_plan_without_rate_fails_and_writes_nothing() {
    let fx = seed().await;

    let mut ctx = fx.store.autocommit().await.unwrap();
    let plan = CatalogService::new()
        .add_plan(
            &mut ctx,
            NewPlanRequest {
                name: "Unpriced".to_string(),
                description: "No rate yet".to_string(),
                quota_defaults: vec![NewPlanQuotaDefault {
                    resource_type_id: fx.cpu.id,
                    quota_value: 5.0,
                    effective_date: now() - Duration::days(1),
                }],
                rates: Vec::new(),
            },
        )
        .await
        .unwrap();

    let mut tx = fx.store.begin().await.unwrap();
    let err = fx
        .subscriptions
        .create_subscription(&mut tx, fx.user.id, plan.id, options(1))
        .await
        .unwrap_err();
    tx.rollback().await.unwrap();

    match err {
        AppError::NoEffectiveRate { plan } => assert_eq!(plan, "Unpriced"),
        other => panic!("expected NoEffectiveRate, got {:?}", other),
    }
    assert!(ctx.list_user_subscriptions(fx.user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_future_rate_is_not_effective() {
    let fx = seed().await;
    let mut ctx = fx.store.autocommit().await.unwrap();
    let plan = CatalogService::new()
        .add_plan(
            &mut ctx,
            NewPlanRequest {
                name: "Launching".to_string(),
                description: "Priced from next month".to_string(),
                quota_defaults: Vec::new(),
                rates: vec![NewPlanRate {
                    effective_date: now() + Duration::days(30),
                    rate: Decimal::new(500, 2),
                }],
            },
        )
        .await
        .unwrap();

    let err = fx
        .subscriptions
        .create_subscription(&mut ctx, fx.user.id, plan.id, options(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NoEffectiveRate { ref plan } if plan == "Launching"));
}

#[tokio::test]
async fn test_latest_past_rate_is_selected() {
    let fx = seed().await;
    let catalog = CatalogService::new();
    let mut ctx = fx.store.autocommit().await.unwrap();

    let newer = catalog
        .add_plan_rate(
            &mut ctx,
            fx.plan.id,
            NewPlanRate {
                effective_date: now() - Duration::days(2),
                rate: Decimal::new(1200, 2),
            },
        )
        .await
        .unwrap();
    catalog
        .add_plan_rate(
            &mut ctx,
            fx.plan.id,
            NewPlanRate {
                effective_date: now() + Duration::days(2),
                rate: Decimal::new(1500, 2),
            },
        )
        .await
        .unwrap();

    let subscription = fx.subscribe(1).await;
    assert_eq!(subscription.plan_rate_id, newer.id);
}

#[tokio::test]
async fn test_unknown_user_or_plan_is_not_found() {
    let fx = seed().await;
    let mut ctx = fx.store.autocommit().await.unwrap();

    let err = fx
        .subscriptions
        .create_subscription(&mut ctx, Uuid::new_v4(), fx.plan.id, options(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref msg) if msg.starts_with("user")));

    let err = fx
        .subscriptions
        .create_subscription(&mut ctx, fx.user.id, Uuid::new_v4(), options(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref msg) if msg.starts_with("plan")));
}

#[tokio::test]
async fn test_invalid_options_are_rejected() {
    let fx = seed().await;
    let mut ctx = fx.store.autocommit().await.unwrap();

    let err = fx
        .subscriptions
        .create_subscription(&mut ctx, fx.user.id, fx.plan.id, options(0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let backwards = SubscriptionOptions {
        paid: true,
        periods: 1,
        end_date: Some(now() - Duration::days(1)),
    };
    let err = fx
        .subscriptions
        .create_subscription(&mut ctx, fx.user.id, fx.plan.id, backwards)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    assert!(ctx.list_user_subscriptions(fx.user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_no_active_subscription_is_not_an_error() {
    let fx = seed().await;
    let mut ctx = fx.store.autocommit().await.unwrap();

    let active = fx
        .subscriptions
        .get_active_subscription(&mut ctx, fx.user.id)
        .await
        .unwrap();
    assert!(active.is_none());
    assert!(!fx
        .subscriptions
        .user_has_active_subscription(&mut ctx, fx.user.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_overlapping_subscriptions_resolve_to_latest_start() {
    let fx = seed().await;
    let mut ctx = fx.store.autocommit().await.unwrap();

    let first = fx.subscribe(1).await;
    let later = subscriptions_at(now() + Duration::days(10))
        .create_subscription(&mut ctx, fx.user.id, fx.plan.id, options(1))
        .await
        .unwrap();

    let active = subscriptions_at(now() + Duration::days(5))
        .get_active_subscription(&mut ctx, fx.user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id, first.id);

    let active = subscriptions_at(now() + Duration::days(20))
        .get_active_subscription(&mut ctx, fx.user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id, later.id);
}

#[tokio::test]
async fn test_subscription_ends_at_end_date() {
    let fx = seed().await;
    let mut ctx = fx.store.autocommit().await.unwrap();

    let end = now() + Duration::days(7);
    fx.subscriptions
        .create_subscription(
            &mut ctx,
            fx.user.id,
            fx.plan.id,
            SubscriptionOptions {
                paid: true,
                periods: 1,
                end_date: Some(end),
            },
        )
        .await
        .unwrap();

    let just_before = subscriptions_at(end - Duration::seconds(1));
    assert!(just_before
        .user_has_active_subscription(&mut ctx, fx.user.id)
        .await
        .unwrap());

    let at_end = subscriptions_at(end);
    assert!(!at_end
        .user_has_active_subscription(&mut ctx, fx.user.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_user_on_plan() {
    let fx = seed().await;
    let mut ctx = fx.store.autocommit().await.unwrap();

    assert!(!fx
        .subscriptions
        .user_on_plan(&mut ctx, fx.user.id, "Basic")
        .await
        .unwrap());

    fx.subscribe(1).await;
    assert!(fx
        .subscriptions
        .user_on_plan(&mut ctx, fx.user.id, "Basic")
        .await
        .unwrap());
    assert!(!fx
        .subscriptions
        .user_on_plan(&mut ctx, fx.user.id, "Pro")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_default_options() {
    let service =
        SubscriptionService::new(Arc::new(FixedClock(now())), ACTOR).with_default_periods(2);
    let defaults = service.default_options();

    assert!(!defaults.paid);
    assert_eq!(defaults.periods, 2);
    assert_eq!(defaults.end_date, now().checked_add_months(Months::new(12)));
}

#[tokio::test]
async fn test_ensure_user_is_idempotent() {
    let fx = seed().await;
    let mut ctx = fx.store.autocommit().await.unwrap();

    let again = fx.subscriptions.ensure_user(&mut ctx, "alice").await.unwrap();
    assert_eq!(again.id, fx.user.id);

    let bob = fx.subscriptions.ensure_user(&mut ctx, " bob ").await.unwrap();
    assert_eq!(bob.username, "bob");
    assert_ne!(bob.id, fx.user.id);

    let err = fx.subscriptions.ensure_user(&mut ctx, "  ").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_subscription_details_fold_in_addons() {
    let fx = seed().await;
    let subscription = fx.subscribe(1).await;
    let mut ctx = fx.store.autocommit().await.unwrap();

    let addons = AddonService::new();
    let addon = addons
        .add_addon(
            &mut ctx,
            qms_services::NewAddonRequest {
                name: "Extra storage".to_string(),
                description: "50 GiB more".to_string(),
                resource_type: qms_services::ResourceTypeRef::Id(fx.storage.id),
                default_amount: 50.0,
                paid: true,
            },
        )
        .await
        .unwrap();
    addons
        .attach(&mut ctx, subscription.id, addon.id, None)
        .await
        .unwrap();

    let details = fx
        .subscriptions
        .subscription_details(&mut ctx, subscription.id)
        .await
        .unwrap();
    assert_eq!(details.subscription.id, subscription.id);
    assert_eq!(details.user.username, "alice");
    assert_eq!(details.plan.name, "Basic");
    assert_eq!(details.quotas.len(), 2);
    assert!(details.usages.is_empty());
    assert_eq!(details.addons.len(), 1);

    let storage = details
        .effective_quotas
        .iter()
        .find(|q| q.resource_type.id == fx.storage.id)
        .unwrap();
    assert_eq!(storage.base_quota, 100.0);
    assert_eq!(storage.addon_amount, 50.0);
    assert_eq!(storage.total(), 150.0);
}

#[tokio::test]
async fn test_get_subscription_not_found() {
    let fx = seed().await;
    let mut ctx = fx.store.autocommit().await.unwrap();

    let err = fx
        .subscriptions
        .get_subscription(&mut ctx, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
