//! Storage seam of the quota engine
//!
//! The engine never talks to a database directly. Every operation receives a
//! [`TransactionContext`] from its caller and performs all reads and writes
//! through it, so the caller decides the transaction scope. A [`QuotaStore`]
//! hands out contexts, either transactional or in explicit autocommit mode.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Addon, AddonUpdate, NewAddon, NewPlan, NewPlanQuotaDefault, NewPlanRate, NewQuota,
    NewResourceType, NewSubscription, NewSubscriptionAddon, Plan, PlanQuotaDefault, PlanRate,
    Quota, ResourceType, Subscription, SubscriptionAddon, Usage, User,
};

/// Opens contexts against the backing store
#[async_trait]
pub trait QuotaStore: Send + Sync {
    type Context: TransactionContext;

    /// Start a transaction. Nothing is visible to other contexts until
    /// [`TransactionContext::commit`]; dropping the context discards the writes.
    async fn begin(&self) -> Result<Self::Context, AppError>;

    /// Context whose writes are durable as soon as each call returns.
    /// Its `commit` and `rollback` are no-ops.
    async fn autocommit(&self) -> Result<Self::Context, AppError>;
}

/// Reads and writes the engine performs, scoped to one transaction or
/// autocommit connection
#[async_trait]
pub trait TransactionContext: Send {
    async fn find_user(&mut self, user_id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>, AppError>;

    async fn insert_user(&mut self, username: &str) -> Result<User, AppError>;

    async fn insert_resource_type(
        &mut self,
        resource_type: &NewResourceType,
    ) -> Result<ResourceType, AppError>;

    async fn find_resource_type(&mut self, id: Uuid) -> Result<Option<ResourceType>, AppError>;

    async fn find_resource_type_by_name(
        &mut self,
        name: &str,
    ) -> Result<Option<ResourceType>, AppError>;

    async fn find_resource_type_by_name_and_unit(
        &mut self,
        name: &str,
        unit: &str,
    ) -> Result<Option<ResourceType>, AppError>;

    async fn list_resource_types(&mut self) -> Result<Vec<ResourceType>, AppError>;

    /// Inserts the plan row only; defaults and rates are added separately.
    async fn insert_plan(&mut self, plan: &NewPlan) -> Result<Plan, AppError>;

    async fn insert_plan_quota_default(
        &mut self,
        plan_id: Uuid,
        default: &NewPlanQuotaDefault,
    ) -> Result<PlanQuotaDefault, AppError>;

    async fn insert_plan_rate(
        &mut self,
        plan_id: Uuid,
        rate: &NewPlanRate,
    ) -> Result<PlanRate, AppError>;

    /// Plan with its quota defaults and rate history attached.
    async fn find_plan(&mut self, plan_id: Uuid) -> Result<Option<Plan>, AppError>;

    async fn find_plan_by_name(&mut self, name: &str) -> Result<Option<Plan>, AppError>;

    async fn list_plans(&mut self) -> Result<Vec<Plan>, AppError>;

    async fn insert_subscription(
        &mut self,
        subscription: &NewSubscription,
    ) -> Result<Subscription, AppError>;

    async fn find_subscription(
        &mut self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError>;

    /// Every subscription of the user, active or not.
    async fn list_user_subscriptions(
        &mut self,
        user_id: Uuid,
    ) -> Result<Vec<Subscription>, AppError>;

    async fn insert_quota(&mut self, quota: &NewQuota) -> Result<Quota, AppError>;

    async fn list_quotas(&mut self, subscription_id: Uuid) -> Result<Vec<Quota>, AppError>;

    /// Reads the usage row for update. Concurrent writers of the same row
    /// are serialised or fail with [`AppError::Conflict`].
    async fn lock_usage(
        &mut self,
        subscription_id: Uuid,
        resource_type_id: Uuid,
    ) -> Result<Option<Usage>, AppError>;

    async fn insert_usage(
        &mut self,
        subscription_id: Uuid,
        resource_type: &ResourceType,
        usage_value: f64,
        actor: &str,
    ) -> Result<Usage, AppError>;

    async fn update_usage_value(
        &mut self,
        usage_id: Uuid,
        usage_value: f64,
        actor: &str,
    ) -> Result<Usage, AppError>;

    async fn list_usages(&mut self, subscription_id: Uuid) -> Result<Vec<Usage>, AppError>;

    async fn insert_addon(&mut self, addon: &NewAddon) -> Result<Addon, AppError>;

    async fn find_addon(&mut self, addon_id: Uuid) -> Result<Option<Addon>, AppError>;

    async fn list_addons(&mut self) -> Result<Vec<Addon>, AppError>;

    /// `None` when no add-on has the given ID.
    async fn update_addon(&mut self, update: &AddonUpdate) -> Result<Option<Addon>, AppError>;

    async fn delete_addon(&mut self, addon_id: Uuid) -> Result<bool, AppError>;

    async fn insert_subscription_addon(
        &mut self,
        subscription_addon: &NewSubscriptionAddon,
    ) -> Result<SubscriptionAddon, AppError>;

    async fn list_subscription_addons(
        &mut self,
        subscription_id: Uuid,
    ) -> Result<Vec<SubscriptionAddon>, AppError>;

    async fn delete_subscription_addon(
        &mut self,
        subscription_addon_id: Uuid,
    ) -> Result<bool, AppError>;

    async fn commit(self) -> Result<(), AppError>;

    async fn rollback(self) -> Result<(), AppError>;
}
