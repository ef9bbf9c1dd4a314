//! Postgres implementation of the storage seam
//!
//! A [`PgContext`] wraps either an open transaction or a plain pooled
//! connection in autocommit mode. Every query module takes a bare
//! `&mut PgConnection`, so both variants share the same SQL.

use async_trait::async_trait;
use qms_core::models::{
    Addon, AddonUpdate, NewAddon, NewPlan, NewPlanQuotaDefault, NewPlanRate, NewQuota,
    NewResourceType, NewSubscription, NewSubscriptionAddon, Plan, PlanQuotaDefault, PlanRate,
    Quota, ResourceType, Subscription, SubscriptionAddon, Usage, User,
};
use qms_core::{AppError, QuotaStore, TransactionContext};
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::error::classify;
use super::{addon, plan, quota, resource_type, subscription, usage, user};

/// Hands out Postgres-backed contexts from a connection pool
#[derive(Clone)]
pub struct PgQuotaStore {
    pool: PgPool,
}

impl PgQuotaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QuotaStore for PgQuotaStore {
    type Context = PgContext;

    async fn begin(&self) -> Result<PgContext, AppError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| classify(e, "Failed to begin database transaction"))?;
        Ok(PgContext::Transaction(tx))
    }

    async fn autocommit(&self) -> Result<PgContext, AppError> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| classify(e, "Failed to acquire database connection"))?;
        Ok(PgContext::Autocommit(conn))
    }
}

/// Connection scope of one engine call
pub enum PgContext {
    /// Rolled back on drop unless committed
    Transaction(Transaction<'static, Postgres>),
    Autocommit(PoolConnection<Postgres>),
}

impl PgContext {
    fn conn(&mut self) -> &mut PgConnection {
        match self {
            PgContext::Transaction(tx) => &mut **tx,
            PgContext::Autocommit(conn) => &mut **conn,
        }
    }
}

#[async_trait]
impl TransactionContext for PgContext {
    async fn find_user(&mut self, user_id: Uuid) -> Result<Option<User>, AppError> {
        user::find_by_id(self.conn(), user_id).await
    }

    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>, AppError> {
        user::find_by_username(self.conn(), username).await
    }

    async fn insert_user(&mut self, username: &str) -> Result<User, AppError> {
        user::insert(self.conn(), username).await
    }

    async fn insert_resource_type(
        &mut self,
        new_resource_type: &NewResourceType,
    ) -> Result<ResourceType, AppError> {
        resource_type::insert(self.conn(), new_resource_type).await
    }

    async fn find_resource_type(&mut self, id: Uuid) -> Result<Option<ResourceType>, AppError> {
        resource_type::find_by_id(self.conn(), id).await
    }

    async fn find_resource_type_by_name(
        &mut self,
        name: &str,
    ) -> Result<Option<ResourceType>, AppError> {
        resource_type::find_by_name(self.conn(), name).await
    }

    async fn find_resource_type_by_name_and_unit(
        &mut self,
        name: &str,
        unit: &str,
    ) -> Result<Option<ResourceType>, AppError> {
        resource_type::find_by_name_and_unit(self.conn(), name, unit).await
    }

    async fn list_resource_types(&mut self) -> Result<Vec<ResourceType>, AppError> {
        resource_type::list(self.conn()).await
    }

    async fn insert_plan(&mut self, new_plan: &NewPlan) -> Result<Plan, AppError> {
        plan::insert(self.conn(), new_plan).await
    }

    async fn insert_plan_quota_default(
        &mut self,
        plan_id: Uuid,
        default: &NewPlanQuotaDefault,
    ) -> Result<PlanQuotaDefault, AppError> {
        plan::insert_quota_default(self.conn(), plan_id, default).await
    }

    async fn insert_plan_rate(
        &mut self,
        plan_id: Uuid,
        rate: &NewPlanRate,
    ) -> Result<PlanRate, AppError> {
        plan::insert_rate(self.conn(), plan_id, rate).await
    }

    async fn find_plan(&mut self, plan_id: Uuid) -> Result<Option<Plan>, AppError> {
        plan::find_by_id(self.conn(), plan_id).await
    }

    async fn find_plan_by_name(&mut self, name: &str) -> Result<Option<Plan>, AppError> {
        plan::find_by_name(self.conn(), name).await
    }

    async fn list_plans(&mut self) -> Result<Vec<Plan>, AppError> {
        plan::list(self.conn()).await
    }

    async fn insert_subscription(
        &mut self,
        new_subscription: &NewSubscription,
    ) -> Result<Subscription, AppError> {
        subscription::insert(self.conn(), new_subscription).await
    }

    async fn find_subscription(
        &mut self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        subscription::find_by_id(self.conn(), subscription_id).await
    }

    async fn list_user_subscriptions(
        &mut self,
        user_id: Uuid,
    ) -> Result<Vec<Subscription>, AppError> {
        subscription::list_by_user(self.conn(), user_id).await
    }

    async fn insert_quota(&mut self, new_quota: &NewQuota) -> Result<Quota, AppError> {
        quota::insert(self.conn(), new_quota).await
    }

    async fn list_quotas(&mut self, subscription_id: Uuid) -> Result<Vec<Quota>, AppError> {
        quota::list_by_subscription(self.conn(), subscription_id).await
    }

    async fn lock_usage(
        &mut self,
        subscription_id: Uuid,
        resource_type_id: Uuid,
    ) -> Result<Option<Usage>, AppError> {
        usage::lock(self.conn(), subscription_id, resource_type_id).await
    }

    async fn insert_usage(
        &mut self,
        subscription_id: Uuid,
        resource_type: &ResourceType,
        usage_value: f64,
        actor: &str,
    ) -> Result<Usage, AppError> {
        usage::insert(self.conn(), subscription_id, resource_type, usage_value, actor).await
    }

    async fn update_usage_value(
        &mut self,
        usage_id: Uuid,
        usage_value: f64,
        actor: &str,
    ) -> Result<Usage, AppError> {
        usage::update_value(self.conn(), usage_id, usage_value, actor).await
    }

    async fn list_usages(&mut self, subscription_id: Uuid) -> Result<Vec<Usage>, AppError> {
        usage::list_by_subscription(self.conn(), subscription_id).await
    }

    async fn insert_addon(&mut self, new_addon: &NewAddon) -> Result<Addon, AppError> {
        addon::insert(self.conn(), new_addon).await
    }

    async fn find_addon(&mut self, addon_id: Uuid) -> Result<Option<Addon>, AppError> {
        addon::find_by_id(self.conn(), addon_id).await
    }

    async fn list_addons(&mut self) -> Result<Vec<Addon>, AppError> {
        addon::list(self.conn()).await
    }

    async fn update_addon(&mut self, update: &AddonUpdate) -> Result<Option<Addon>, AppError> {
        addon::update(self.conn(), update).await
    }

    async fn delete_addon(&mut self, addon_id: Uuid) -> Result<bool, AppError> {
        addon::delete(self.conn(), addon_id).await
    }

    async fn insert_subscription_addon(
        &mut self,
        subscription_addon: &NewSubscriptionAddon,
    ) -> Result<SubscriptionAddon, AppError> {
        addon::attach(self.conn(), subscription_addon).await
    }

    async fn list_subscription_addons(
        &mut self,
        subscription_id: Uuid,
    ) -> Result<Vec<SubscriptionAddon>, AppError> {
        addon::list_by_subscription(self.conn(), subscription_id).await
    }

    async fn delete_subscription_addon(
        &mut self,
        subscription_addon_id: Uuid,
    ) -> Result<bool, AppError> {
        addon::detach(self.conn(), subscription_addon_id).await
    }

    async fn commit(self) -> Result<(), AppError> {
        match self {
            PgContext::Transaction(tx) => tx
                .commit()
                .await
                .map_err(|e| classify(e, "Failed to commit database transaction")),
            PgContext::Autocommit(_) => Ok(()),
        }
    }

    async fn rollback(self) -> Result<(), AppError> {
        match self {
            PgContext::Transaction(tx) => tx
                .rollback()
                .await
                .map_err(|e| classify(e, "Failed to rollback database transaction")),
            PgContext::Autocommit(_) => Ok(()),
        }
    }
}
