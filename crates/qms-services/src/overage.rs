//! Overage reporting

use qms_core::models::Overage;
use qms_core::overage::join_overages;
use qms_core::{AppError, TransactionContext};
use uuid::Uuid;

/// Read-only join of a subscription's quotas and usages
#[derive(Clone, Copy, Debug, Default)]
pub struct OverageService;

impl OverageService {
    pub fn new() -> Self {
        Self
    }

    /// Every usage row of the subscription next to its base quota. Entries
    /// within budget are included; callers filter with [`Overage::is_exceeded`].
    #[tracing::instrument(skip(self, ctx))]
    pub async fn list_overages<C: TransactionContext>(
        &self,
        ctx: &mut C,
        subscription_id: Uuid,
    ) -> Result<Vec<Overage>, AppError> {
        let subscription = ctx
            .find_subscription(subscription_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("subscription {}", subscription_id)))?;
        let user = ctx
            .find_user(subscription.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", subscription.user_id)))?;
        let plan = ctx
            .find_plan(subscription.plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("plan {}", subscription.plan_id)))?;

        let quotas = ctx.list_quotas(subscription_id).await?;
        let usages = ctx.list_usages(subscription_id).await?;

        let overages = join_overages(&subscription, &user, &plan, &quotas, &usages);
        tracing::debug!(
            subscription_id = %subscription_id,
            count = overages.len(),
            exceeded = overages.iter().filter(|o| o.is_exceeded()).count(),
            "Overages computed"
        );
        Ok(overages)
    }
}
