//! Subscription creation and lookup

use std::sync::Arc;

use qms_core::materialize::{active_rate, materialize, validate_options};
use qms_core::models::{
    NewSubscription, Plan, Quota, Subscription, SubscriptionAddon, SubscriptionDetails,
    SubscriptionOptions, Usage, User,
};
use qms_core::overage::effective_quotas;
use qms_core::{active_among, AppError, Clock, Config, SystemClock, TransactionContext};
use uuid::Uuid;

#[derive(Clone)]
pub struct SubscriptionService {
    clock: Arc<dyn Clock>,
    actor: String,
    default_periods: i32,
}

impl SubscriptionService {
    pub fn new(clock: Arc<dyn Clock>, actor: impl Into<String>) -> Self {
        Self {
            clock,
            actor: actor.into(),
            default_periods: 1,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(SystemClock), config.service_user.clone())
            .with_default_periods(config.default_subscription_periods)
    }

    pub fn with_default_periods(mut self, periods: i32) -> Self {
        self.default_periods = periods;
        self
    }

    /// Options used when the caller supplies none: unpaid, the configured
    /// number of periods, ending a year from now.
    pub fn default_options(&self) -> SubscriptionOptions {
        SubscriptionOptions::defaults(self.clock.now(), self.default_periods)
    }

    /// Subscribes a user to a plan starting now and materialises its quotas.
    ///
    /// The plan must have a rate in effect. Everything is written through
    /// `ctx`; if the caller abandons the transaction nothing persists.
    #[tracing::instrument(skip(self, ctx, options))]
    pub async fn create_subscription<C: TransactionContext>(
        &self,
        ctx: &mut C,
        user_id: Uuid,
        plan_id: Uuid,
        options: SubscriptionOptions,
    ) -> Result<Subscription, AppError> {
        let now = self.clock.now();

        let user = ctx
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
        let plan = ctx
            .find_plan(plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("plan {}", plan_id)))?;

        validate_options(&options, now)?;
        let rate = active_rate(&plan, now)?;

        let subscription = ctx
            .insert_subscription(&NewSubscription {
                user_id: user.id,
                plan_id: plan.id,
                plan_rate_id: rate.id,
                effective_start_date: now,
                effective_end_date: options.end_date,
                paid: options.paid,
                actor: self.actor.clone(),
            })
            .await?;

        let quotas = materialize(&plan, subscription.id, &options, now, &self.actor);
        for quota in &quotas {
            ctx.insert_quota(quota).await?;
        }

        tracing::info!(
            subscription_id = %subscription.id,
            username = %user.username,
            plan = %plan.name,
            periods = options.periods,
            quota_count = quotas.len(),
            "Subscription created"
        );

        Ok(subscription)
    }

    /// The user's subscription in effect now, if any. Overlapping rows are
    /// resolved in favour of the most recently started one.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn get_active_subscription<C: TransactionContext>(
        &self,
        ctx: &mut C,
        user_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let subscriptions = ctx.list_user_subscriptions(user_id).await?;
        Ok(active_among(self.clock.now(), &subscriptions).cloned())
    }

    pub async fn user_has_active_subscription<C: TransactionContext>(
        &self,
        ctx: &mut C,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        Ok(self.get_active_subscription(ctx, user_id).await?.is_some())
    }

    /// Whether the user's active subscription is on the plan called `plan_name`.
    pub async fn user_on_plan<C: TransactionContext>(
        &self,
        ctx: &mut C,
        user_id: Uuid,
        plan_name: &str,
    ) -> Result<bool, AppError> {
        let Some(subscription) = self.get_active_subscription(ctx, user_id).await? else {
            return Ok(false);
        };
        let plan = ctx.find_plan(subscription.plan_id).await?;
        Ok(plan.is_some_and(|p| p.name == plan_name))
    }

    pub async fn get_subscription<C: TransactionContext>(
        &self,
        ctx: &mut C,
        subscription_id: Uuid,
    ) -> Result<Subscription, AppError> {
        ctx.find_subscription(subscription_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("subscription {}", subscription_id)))
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn subscription_details<C: TransactionContext>(
        &self,
        ctx: &mut C,
        subscription_id: Uuid,
    ) -> Result<SubscriptionDetails, AppError> {
        let subscription = self.get_subscription(ctx, subscription_id).await?;
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
        let addons = ctx.list_subscription_addons(subscription_id).await?;

        Ok(assemble_subscription_details(
            subscription,
            user,
            plan,
            quotas,
            usages,
            addons,
        ))
    }

    /// Looks the user up by name, creating them on first sight.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn ensure_user<C: TransactionContext>(
        &self,
        ctx: &mut C,
        username: &str,
    ) -> Result<User, AppError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::InvalidInput("username must be set".to_string()));
        }

        if let Some(user) = ctx.find_user_by_username(username).await? {
            return Ok(user);
        }

        let user = ctx.insert_user(username).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    pub async fn find_user_by_username<C: TransactionContext>(
        &self,
        ctx: &mut C,
        username: &str,
    ) -> Result<Option<User>, AppError> {
        ctx.find_user_by_username(username).await
    }
}

/// Attaches a subscription's child rows and derives its effective quotas.
pub fn assemble_subscription_details(
    subscription: Subscription,
    user: User,
    plan: Plan,
    quotas: Vec<Quota>,
    usages: Vec<Usage>,
    addons: Vec<SubscriptionAddon>,
) -> SubscriptionDetails {
    let effective_quotas = effective_quotas(&quotas, &addons);
    SubscriptionDetails {
        subscription,
        user,
        plan,
        quotas,
        usages,
        addons,
        effective_quotas,
    }
}
