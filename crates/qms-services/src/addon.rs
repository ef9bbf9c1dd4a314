//! Add-on catalog and subscription add-ons

use qms_core::models::{
    Addon, AddonUpdate, EffectiveQuota, NewAddon, NewSubscriptionAddon, ResourceType,
    SubscriptionAddon,
};
use qms_core::overage::effective_quotas;
use qms_core::{AppError, TransactionContext};
use uuid::Uuid;

/// How a catalog request names its resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceTypeRef {
    Id(Uuid),
    Name(String),
}

/// Catalog entry as submitted, before the resource type is resolved
#[derive(Debug, Clone)]
pub struct NewAddonRequest {
    pub name: String,
    pub description: String,
    pub resource_type: ResourceTypeRef,
    pub default_amount: f64,
    pub paid: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AddonService;

impl AddonService {
    pub fn new() -> Self {
        Self
    }

    /// Adds an add-on to the catalog. It can then be attached to any subscription.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn add_addon<C: TransactionContext>(
        &self,
        ctx: &mut C,
        request: NewAddonRequest,
    ) -> Result<Addon, AppError> {
        if request.name.trim().is_empty() {
            return Err(AppError::InvalidInput("name must be set".to_string()));
        }
        if request.description.trim().is_empty() {
            return Err(AppError::InvalidInput("description must be set".to_string()));
        }
        validate_default_amount(request.default_amount)?;

        let resource_type = resolve_resource_type(ctx, &request.resource_type).await?;

        let addon = ctx
            .insert_addon(&NewAddon {
                name: request.name,
                description: request.description,
                resource_type,
                default_amount: request.default_amount,
                paid: request.paid,
            })
            .await?;

        tracing::info!(
            addon_id = %addon.id,
            name = %addon.name,
            resource_type = %addon.resource_type.name,
            default_amount = addon.default_amount,
            "Add-on created"
        );
        Ok(addon)
    }

    pub async fn list_addons<C: TransactionContext>(
        &self,
        ctx: &mut C,
    ) -> Result<Vec<Addon>, AppError> {
        ctx.list_addons().await
    }

    /// Applies the fields set in `update`, leaving the rest unchanged.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn update_addon<C: TransactionContext>(
        &self,
        ctx: &mut C,
        update: AddonUpdate,
    ) -> Result<Addon, AppError> {
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::InvalidInput("name must not be empty".to_string()));
        }
        if update
            .description
            .as_deref()
            .is_some_and(|d| d.trim().is_empty())
        {
            return Err(AppError::InvalidInput(
                "description must not be empty".to_string(),
            ));
        }
        if let Some(amount) = update.default_amount {
            validate_default_amount(amount)?;
        }
        if let Some(resource_type_id) = update.resource_type_id {
            resolve_resource_type(ctx, &ResourceTypeRef::Id(resource_type_id)).await?;
        }

        let addon = ctx
            .update_addon(&update)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("add-on {}", update.id)))?;
        tracing::info!(addon_id = %addon.id, "Add-on updated");
        Ok(addon)
    }

    /// Removes a catalog entry. Entries still attached to a subscription
    /// cannot be removed.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn delete_addon<C: TransactionContext>(
        &self,
        ctx: &mut C,
        addon_id: Uuid,
    ) -> Result<(), AppError> {
        if ctx.delete_addon(addon_id).await? {
            tracing::info!(addon_id = %addon_id, "Add-on deleted");
            Ok(())
        } else {
            Err(AppError::NotFound(format!("add-on {}", addon_id)))
        }
    }

    /// Attaches an add-on to a subscription. Without an explicit `amount`
    /// the add-on's default amount is stored. Quotas are left untouched; the
    /// add-on only shows up in [`Self::effective_quotas`].
    #[tracing::instrument(skip(self, ctx))]
    pub async fn attach<C: TransactionContext>(
        &self,
        ctx: &mut C,
        subscription_id: Uuid,
        addon_id: Uuid,
        amount: Option<f64>,
    ) -> Result<SubscriptionAddon, AppError> {
        if let Some(amount) = amount {
            if !amount.is_finite() {
                return Err(AppError::InvalidInput(format!(
                    "amount must be a finite number, got {}",
                    amount
                )));
            }
        }

        if ctx.find_subscription(subscription_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "subscription {}",
                subscription_id
            )));
        }
        let addon = ctx
            .find_addon(addon_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("add-on {}", addon_id)))?;

        let amount = amount.unwrap_or(addon.default_amount);
        let paid = addon.paid;
        let attached = ctx
            .insert_subscription_addon(&NewSubscriptionAddon {
                subscription_id,
                addon,
                amount: Some(amount),
                paid,
            })
            .await?;

        tracing::info!(
            subscription_id = %subscription_id,
            addon = %attached.addon.name,
            amount,
            "Add-on attached"
        );
        Ok(attached)
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn detach<C: TransactionContext>(
        &self,
        ctx: &mut C,
        subscription_addon_id: Uuid,
    ) -> Result<(), AppError> {
        if ctx.delete_subscription_addon(subscription_addon_id).await? {
            tracing::info!(subscription_addon_id = %subscription_addon_id, "Add-on detached");
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "subscription add-on {}",
                subscription_addon_id
            )))
        }
    }

    pub async fn list_subscription_addons<C: TransactionContext>(
        &self,
        ctx: &mut C,
        subscription_id: Uuid,
    ) -> Result<Vec<SubscriptionAddon>, AppError> {
        ctx.list_subscription_addons(subscription_id).await
    }

    /// Base quota plus attached add-ons, per resource type.
    pub async fn effective_quotas<C: TransactionContext>(
        &self,
        ctx: &mut C,
        subscription_id: Uuid,
    ) -> Result<Vec<EffectiveQuota>, AppError> {
        let quotas = ctx.list_quotas(subscription_id).await?;
        let addons = ctx.list_subscription_addons(subscription_id).await?;
        Ok(effective_quotas(&quotas, &addons))
    }
}

fn validate_default_amount(amount: f64) -> Result<(), AppError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "default_amount must be greater than 0.0, got {}",
            amount
        )))
    }
}

async fn resolve_resource_type<C: TransactionContext>(
    ctx: &mut C,
    reference: &ResourceTypeRef,
) -> Result<ResourceType, AppError> {
    match reference {
        ResourceTypeRef::Id(id) => ctx
            .find_resource_type(*id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("resource type {}", id))),
        ResourceTypeRef::Name(name) => ctx
            .find_resource_type_by_name(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("resource type {}", name))),
    }
}
