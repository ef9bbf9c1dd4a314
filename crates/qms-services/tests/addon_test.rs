mod helpers;

use helpers::{resource_type, seed};
use qms_core::models::{Addon, AddonUpdate};
use qms_core::{AppError, QuotaStore, TransactionContext};
use qms_services::{AddonService, NewAddonRequest, ResourceTypeRef};
use uuid::Uuid;

fn extra_storage(resource_type: ResourceTypeRef) -> NewAddonRequest {
    NewAddonRequest {
        name: "Extra storage".to_string(),
        description: "50 GiB more".to_string(),
        resource_type,
        default_amount: 50.0,
        paid: true,
    }
}

async fn catalog_addon(fx: &helpers::Fixture) -> Addon {
    let mut ctx = fx.store.autocommit().await.unwrap();
    AddonService::new()
        .add_addon(&mut ctx, extra_storage(ResourceTypeRef::Id(fx.storage.id)))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_attach_without_amount_stores_default() {
    let fx = seed().await;
    let subscription = fx.subscribe(1).await;
    let addon = catalog_addon(&fx).await;
    let mut ctx = fx.store.autocommit().await.unwrap();

    let attached = AddonService::new()
        .attach(&mut ctx, subscription.id, addon.id, None)
        .await
        .unwrap();

    assert_eq!(attached.subscription_id, subscription.id);
    assert_eq!(attached.addon.id, addon.id);
    assert_eq!(attached.amount, Some(50.0));
    assert_eq!(attached.effective_amount(), addon.default_amount);
    assert!(attached.paid);
}

#[tokio::test]
async fn test_attach_with_amount_overrides_default() {
    let fx = seed().await;
    let subscription = fx.subscribe(1).await;
    let addon = catalog_addon(&fx).await;
    let mut ctx = fx.store.autocommit().await.unwrap();

    let attached = AddonService::new()
        .attach(&mut ctx, subscription.id, addon.id, Some(20.0))
        .await
        .unwrap();
    assert_eq!(attached.effective_amount(), 20.0);

    let err = AddonService::new()
        .attach(&mut ctx, subscription.id, addon.id, Some(f64::INFINITY))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_attach_requires_existing_subscription_and_addon() {
    let fx = seed().await;
    let subscription = fx.subscribe(1).await;
    let addon = catalog_addon(&fx).await;
    let mut ctx = fx.store.autocommit().await.unwrap();
    let service = AddonService::new();

    let err = service
        .attach(&mut ctx, Uuid::new_v4(), addon.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref msg) if msg.starts_with("subscription")));

    let err = service
        .attach(&mut ctx, subscription.id, Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref msg) if msg.starts_with("add-on")));

    assert!(ctx
        .list_subscription_addons(subscription.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_attach_leaves_quota_untouched_and_folds_into_view() {
    let fx = seed().await;
    let subscription = fx.subscribe(1).await;
    let addon = catalog_addon(&fx).await;
    let backup = resource_type(&fx.store, "backup.size", "GiB", false).await;
    let mut ctx = fx.store.autocommit().await.unwrap();
    let service = AddonService::new();

    let backup_addon = service
        .add_addon(
            &mut ctx,
            NewAddonRequest {
                name: "Backups".to_string(),
                description: "Offsite copies".to_string(),
                resource_type: ResourceTypeRef::Id(backup.id),
                default_amount: 5.0,
                paid: false,
            },
        )
        .await
        .unwrap();

    service
        .attach(&mut ctx, subscription.id, addon.id, None)
        .await
        .unwrap();
    service
        .attach(&mut ctx, subscription.id, addon.id, Some(25.0))
        .await
        .unwrap();
    service
        .attach(&mut ctx, subscription.id, backup_addon.id, None)
        .await
        .unwrap();

    let quotas = ctx.list_quotas(subscription.id).await.unwrap();
    let storage_quota = quotas
        .iter()
        .find(|q| q.resource_type.id == fx.storage.id)
        .unwrap();
    assert_eq!(storage_quota.quota_value, 100.0);

    let view = service
        .effective_quotas(&mut ctx, subscription.id)
        .await
        .unwrap();
    let storage = view
        .iter()
        .find(|q| q.resource_type.id == fx.storage.id)
        .unwrap();
    assert_eq!(storage.total(), 100.0 + 50.0 + 25.0);

    let backups = view.iter().find(|q| q.resource_type.id == backup.id).unwrap();
    assert_eq!(backups.base_quota, 0.0);
    assert_eq!(backups.total(), 5.0);
}

#[tokio::test]
async fn test_detach() {
    let fx = seed().await;
    let subscription = fx.subscribe(1).await;
    let addon = catalog_addon(&fx).await;
    let mut ctx = fx.store.autocommit().await.unwrap();
    let service = AddonService::new();

    let attached = service
        .attach(&mut ctx, subscription.id, addon.id, None)
        .await
        .unwrap();
    assert_eq!(
        service
            .list_subscription_addons(&mut ctx, subscription.id)
            .await
            .unwrap()
            .len(),
        1
    );

    service.detach(&mut ctx, attached.id).await.unwrap();
    assert!(service
        .list_subscription_addons(&mut ctx, subscription.id)
        .await
        .unwrap()
        .is_empty());

    let err = service.detach(&mut ctx, attached.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_add_addon_validation() {
    let fx = seed().await;
    let mut ctx = fx.store.autocommit().await.unwrap();
    let service = AddonService::new();

    let mut request = extra_storage(ResourceTypeRef::Id(fx.storage.id));
    request.name = " ".to_string();
    assert!(matches!(
        service.add_addon(&mut ctx, request).await,
        Err(AppError::InvalidInput(_))
    ));

    let mut request = extra_storage(ResourceTypeRef::Id(fx.storage.id));
    request.description = String::new();
    assert!(matches!(
        service.add_addon(&mut ctx, request).await,
        Err(AppError::InvalidInput(_))
    ));

    let mut request = extra_storage(ResourceTypeRef::Id(fx.storage.id));
    request.default_amount = 0.0;
    assert!(matches!(
        service.add_addon(&mut ctx, request).await,
        Err(AppError::InvalidInput(_))
    ));

    let request = extra_storage(ResourceTypeRef::Name("tape.size".to_string()));
    assert!(matches!(
        service.add_addon(&mut ctx, request).await,
        Err(AppError::NotFound(_))
    ));

    let addon = service
        .add_addon(&mut ctx, extra_storage(ResourceTypeRef::Name("data.size".to_string())))
        .await
        .unwrap();
    assert_eq!(addon.resource_type, fx.storage);
    assert_eq!(service.list_addons(&mut ctx).await.unwrap(), vec![addon]);
}

#[tokio::test]
async fn test_update_addon_is_partial() {
    let fx = seed().await;
    let addon = catalog_addon(&fx).await;
    let mut ctx = fx.store.autocommit().await.unwrap();
    let service = AddonService::new();

    let updated = service
        .update_addon(
            &mut ctx,
            AddonUpdate {
                id: addon.id,
                default_amount: Some(75.0),
                resource_type_id: Some(fx.cpu.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, addon.name);
    assert_eq!(updated.description, addon.description);
    assert_eq!(updated.default_amount, 75.0);
    assert_eq!(updated.resource_type, fx.cpu);
    assert_eq!(updated.paid, addon.paid);

    let err = service
        .update_addon(
            &mut ctx,
            AddonUpdate {
                id: Uuid::new_v4(),
                paid: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = service
        .update_addon(
            &mut ctx,
            AddonUpdate {
                id: addon.id,
                default_amount: Some(-1.0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_delete_addon_in_use_is_refused() {
    let fx = seed().await;
    let subscription = fx.subscribe(1).await;
    let addon = catalog_addon(&fx).await;
    let mut ctx = fx.store.autocommit().await.unwrap();
    let service = AddonService::new();

    let attached = service
        .attach(&mut ctx, subscription.id, addon.id, None)
        .await
        .unwrap();
    let err = service.delete_addon(&mut ctx, addon.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    service.detach(&mut ctx, attached.id).await.unwrap();
    service.delete_addon(&mut ctx, addon.id).await.unwrap();
    assert!(service.list_addons(&mut ctx).await.unwrap().is_empty());

    let err = service.delete_addon(&mut ctx, addon.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
