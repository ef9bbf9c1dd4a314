//! Usage ledger: the single read-modify-write per subscription and resource type

use qms_core::ledger::{next_usage_value, validate_amount};
use qms_core::models::{Quota, UpdateOperation, Usage};
use qms_core::{AppError, Config, QuotaStore, TransactionContext};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct UsageLedger {
    actor: String,
}

impl UsageLedger {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.service_user.clone())
    }

    /// Applies `operation` with `amount` to the usage counter and returns the
    /// new value. The first write for a resource type stores `amount` as is,
    /// whatever the operation.
    ///
    /// The counter is read through [`TransactionContext::lock_usage`], so a
    /// concurrent writer either waits or surfaces as [`AppError::Conflict`].
    #[tracing::instrument(skip(self, ctx))]
    pub async fn apply_usage_update<C: TransactionContext>(
        &self,
        ctx: &mut C,
        subscription_id: Uuid,
        resource_name: &str,
        resource_unit: &str,
        operation: &str,
        amount: f64,
    ) -> Result<f64, AppError> {
        let operation: UpdateOperation = operation.parse()?;
        validate_amount(amount)?;

        let resource_type = ctx
            .find_resource_type_by_name_and_unit(resource_name, resource_unit)
            .await?
            .ok_or_else(|| AppError::UnknownResourceType {
                name: resource_name.to_string(),
                unit: resource_unit.to_string(),
            })?;

        if ctx.find_subscription(subscription_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "subscription {}",
                subscription_id
            )));
        }

        let current = ctx.lock_usage(subscription_id, resource_type.id).await?;
        let value = next_usage_value(current.as_ref().map(|u| u.usage_value), operation, amount);

        let usage = match current {
            Some(existing) => {
                ctx.update_usage_value(existing.id, value, &self.actor)
                    .await?
            }
            None => {
                ctx.insert_usage(subscription_id, &resource_type, value, &self.actor)
                    .await?
            }
        };

        tracing::info!(
            subscription_id = %subscription_id,
            resource_type = %resource_type.name,
            operation = %operation,
            amount,
            usage_value = usage.usage_value,
            "Usage updated"
        );

        Ok(usage.usage_value)
    }

    /// Runs [`Self::apply_usage_update`] in its own transaction, retrying on
    /// [`AppError::Conflict`] up to `max_attempts` times in total. Any other
    /// error is returned straight away.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_usage_update_with_retry<S: QuotaStore>(
        &self,
        store: &S,
        max_attempts: u32,
        subscription_id: Uuid,
        resource_name: &str,
        resource_unit: &str,
        operation: &str,
        amount: f64,
    ) -> Result<f64, AppError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let mut ctx = store.begin().await?;
            let result = self
                .apply_usage_update(
                    &mut ctx,
                    subscription_id,
                    resource_name,
                    resource_unit,
                    operation,
                    amount,
                )
                .await;

            let outcome = match result {
                Ok(value) => ctx.commit().await.map(|()| value),
                Err(e) => {
                    if let Err(rollback_err) = ctx.rollback().await {
                        tracing::error!(error = %rollback_err, "Failed to roll back usage update");
                    }
                    Err(e)
                }
            };

            match outcome {
                Err(e) if e.is_conflict() && attempt < max_attempts => {
                    tracing::warn!(
                        subscription_id = %subscription_id,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Usage update conflicted, retrying"
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    pub async fn list_usages<C: TransactionContext>(
        &self,
        ctx: &mut C,
        subscription_id: Uuid,
    ) -> Result<Vec<Usage>, AppError> {
        ctx.list_usages(subscription_id).await
    }

    pub async fn list_quotas<C: TransactionContext>(
        &self,
        ctx: &mut C,
        subscription_id: Uuid,
    ) -> Result<Vec<Quota>, AppError> {
        ctx.list_quotas(subscription_id).await
    }
}
