//! In-memory implementation of the storage seam
//!
//! Used by tests and local tooling. A transactional context works on a
//! snapshot taken at `begin` and records its writes in a journal. On commit
//! the journal is replayed onto the shared state, provided every usage row
//! the transaction locked is still at the version it saw; otherwise the
//! commit fails with [`AppError::Conflict`] and nothing is applied.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qms_core::models::{
    Addon, AddonUpdate, NewAddon, NewPlan, NewPlanQuotaDefault, NewPlanRate, NewQuota,
    NewResourceType, NewSubscription, NewSubscriptionAddon, Plan, PlanQuotaDefault, PlanRate,
    Quota, ResourceType, Subscription, SubscriptionAddon, Usage, User,
};
use qms_core::{AppError, Clock, QuotaStore, SystemClock, TransactionContext};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct SubscriptionAddonRecord {
    id: Uuid,
    subscription_id: Uuid,
    addon_id: Uuid,
    amount: Option<f64>,
    paid: bool,
}

#[derive(Debug, Clone, Default)]
struct State {
    users: Vec<User>,
    resource_types: Vec<ResourceType>,
    plans: Vec<Plan>,
    subscriptions: Vec<Subscription>,
    quotas: Vec<Quota>,
    usages: Vec<Usage>,
    usage_versions: HashMap<Uuid, u64>,
    addons: Vec<Addon>,
    subscription_addons: Vec<SubscriptionAddonRecord>,
}

/// A single mutation, fully resolved so that replaying it is deterministic
#[derive(Debug, Clone)]
enum Write {
    User(User),
    ResourceType(ResourceType),
    Plan(Plan),
    PlanQuotaDefault(PlanQuotaDefault),
    PlanRate(PlanRate),
    Subscription(Subscription),
    Quota(Quota),
    InsertUsage(Usage),
    UpdateUsage {
        usage_id: Uuid,
        usage_value: f64,
        actor: String,
        at: DateTime<Utc>,
    },
    Addon(Addon),
    UpdateAddon(AddonUpdate),
    DeleteAddon(Uuid),
    SubscriptionAddon(SubscriptionAddonRecord),
    DeleteSubscriptionAddon(Uuid),
}

fn missing(what: &str) -> AppError {
    AppError::InvalidInput(format!("{}: referenced row is missing", what))
}

fn duplicate(what: &str) -> AppError {
    AppError::InvalidInput(format!("{}: already exists", what))
}

impl State {
    fn has_user(&self, id: Uuid) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    fn has_resource_type(&self, id: Uuid) -> bool {
        self.resource_types.iter().any(|rt| rt.id == id)
    }

    fn has_subscription(&self, id: Uuid) -> bool {
        self.subscriptions.iter().any(|s| s.id == id)
    }

    fn plan_mut(&mut self, id: Uuid) -> Option<&mut Plan> {
        self.plans.iter_mut().find(|p| p.id == id)
    }

    fn usage_for(&self, subscription_id: Uuid, resource_type_id: Uuid) -> Option<&Usage> {
        self.usages.iter().find(|u| {
            u.subscription_id == subscription_id && u.resource_type.id == resource_type_id
        })
    }

    fn usage_version(&self, subscription_id: Uuid, resource_type_id: Uuid) -> Option<u64> {
        self.usage_for(subscription_id, resource_type_id)
            .and_then(|u| self.usage_versions.get(&u.id).copied())
    }

    fn subscription_addon(&self, record: &SubscriptionAddonRecord) -> Option<SubscriptionAddon> {
        let addon = self.addons.iter().find(|a| a.id == record.addon_id)?;
        Some(SubscriptionAddon {
            id: record.id,
            subscription_id: record.subscription_id,
            addon: addon.clone(),
            amount: record.amount,
            paid: record.paid,
        })
    }

    /// Validates before mutating, so a failed write leaves the state untouched.
    fn apply(&mut self, write: &Write) -> Result<(), AppError> {
        match write {
            Write::User(user) => {
                if self.users.iter().any(|u| u.username == user.username) {
                    return Err(duplicate(&format!("user {}", user.username)));
                }
                self.users.push(user.clone());
            }
            Write::ResourceType(resource_type) => {
                if self
                    .resource_types
                    .iter()
                    .any(|rt| rt.name == resource_type.name && rt.unit == resource_type.unit)
                {
                    return Err(duplicate(&format!(
                        "resource type {} ({})",
                        resource_type.name, resource_type.unit
                    )));
                }
                self.resource_types.push(resource_type.clone());
            }
            Write::Plan(plan) => {
                if self.plans.iter().any(|p| p.name == plan.name) {
                    return Err(duplicate(&format!("plan {}", plan.name)));
                }
                self.plans.push(plan.clone());
            }
            Write::PlanQuotaDefault(default) => {
                if !self.has_resource_type(default.resource_type.id) {
                    return Err(missing("plan quota default"));
                }
                let plan = self
                    .plan_mut(default.plan_id)
                    .ok_or_else(|| missing("plan quota default"))?;
                plan.quota_defaults.push(default.clone());
            }
            Write::PlanRate(rate) => {
                let plan = self
                    .plan_mut(rate.plan_id)
                    .ok_or_else(|| missing("plan rate"))?;
                plan.rates.push(rate.clone());
                plan.rates.sort_by_key(|r| r.effective_date);
            }
            Write::Subscription(subscription) => {
                let rate_exists = self.plans.iter().any(|p| {
                    p.id == subscription.plan_id
                        && p.rates.iter().any(|r| r.id == subscription.plan_rate_id)
                });
                if !self.has_user(subscription.user_id) || !rate_exists {
                    return Err(missing("subscription"));
                }
                if subscription
                    .effective_end_date
                    .is_some_and(|end| end < subscription.effective_start_date)
                {
                    return Err(AppError::InvalidInput(
                        "end date must not be before the start date".to_string(),
                    ));
                }
                self.subscriptions.push(subscription.clone());
            }
            Write::Quota(quota) => {
                if !self.has_subscription(quota.subscription_id)
                    || !self.has_resource_type(quota.resource_type.id)
                {
                    return Err(missing("quota"));
                }
                if self.quotas.iter().any(|q| {
                    q.subscription_id == quota.subscription_id
                        && q.resource_type.id == quota.resource_type.id
                }) {
                    return Err(duplicate("quota"));
                }
                self.quotas.push(quota.clone());
            }
            Write::InsertUsage(usage) => {
                if !self.has_subscription(usage.subscription_id)
                    || !self.has_resource_type(usage.resource_type.id)
                {
                    return Err(missing("usage"));
                }
                if self
                    .usage_for(usage.subscription_id, usage.resource_type.id)
                    .is_some()
                {
                    return Err(AppError::Conflict(
                        "usage row created concurrently".to_string(),
                    ));
                }
                self.usages.push(usage.clone());
                self.usage_versions.insert(usage.id, 1);
            }
            Write::UpdateUsage {
                usage_id,
                usage_value,
                actor,
                at,
            } => {
                let usage = self
                    .usages
                    .iter_mut()
                    .find(|u| u.id == *usage_id)
                    .ok_or_else(|| AppError::NotFound(format!("usage {}", usage_id)))?;
                usage.usage_value = *usage_value;
                usage.last_modified_by = actor.clone();
                usage.last_modified_at = *at;
                *self.usage_versions.entry(*usage_id).or_insert(0) += 1;
            }
            Write::Addon(addon) => {
                if !self.has_resource_type(addon.resource_type.id) {
                    return Err(missing("add-on"));
                }
                self.addons.push(addon.clone());
            }
            Write::UpdateAddon(update) => {
                let resource_type = match update.resource_type_id {
                    Some(id) => Some(
                        self.resource_types
                            .iter()
                            .find(|rt| rt.id == id)
                            .cloned()
                            .ok_or_else(|| missing("add-on"))?,
                    ),
                    None => None,
                };
                if let Some(addon) = self.addons.iter_mut().find(|a| a.id == update.id) {
                    if let Some(name) = &update.name {
                        addon.name = name.clone();
                    }
                    if let Some(description) = &update.description {
                        addon.description = description.clone();
                    }
                    if let Some(resource_type) = resource_type {
                        addon.resource_type = resource_type;
                    }
                    if let Some(amount) = update.default_amount {
                        addon.default_amount = amount;
                    }
                    if let Some(paid) = update.paid {
                        addon.paid = paid;
                    }
                }
            }
            Write::DeleteAddon(addon_id) => {
                if self
                    .subscription_addons
                    .iter()
                    .any(|sa| sa.addon_id == *addon_id)
                {
                    return Err(AppError::InvalidInput(format!(
                        "add-on {}: referenced row is still in use",
                        addon_id
                    )));
                }
                self.addons.retain(|a| a.id != *addon_id);
            }
            Write::SubscriptionAddon(record) => {
                if !self.has_subscription(record.subscription_id)
                    || !self.addons.iter().any(|a| a.id == record.addon_id)
                {
                    return Err(missing("subscription add-on"));
                }
                self.subscription_addons.push(record.clone());
            }
            Write::DeleteSubscriptionAddon(id) => {
                self.subscription_addons.retain(|sa| sa.id != *id);
            }
        }
        Ok(())
    }
}

/// Shared in-memory state handing out [`MemoryContext`]s
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Row timestamps (`created_at`, `last_modified_at`) are taken from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            clock,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuotaStore for MemoryStore {
    type Context = MemoryContext;

    async fn begin(&self) -> Result<MemoryContext, AppError> {
        let snapshot = self.state.lock().await.clone();
        Ok(MemoryContext {
            shared: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
            staged: Some(Staged {
                state: snapshot,
                journal: Vec::new(),
                locked_versions: HashMap::new(),
            }),
        })
    }

    async fn autocommit(&self) -> Result<MemoryContext, AppError> {
        Ok(MemoryContext {
            shared: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
            staged: None,
        })
    }
}

struct Staged {
    state: State,
    journal: Vec<Write>,
    /// Version of each locked usage row when first read; `None` when absent.
    locked_versions: HashMap<(Uuid, Uuid), Option<u64>>,
}

/// Context over a [`MemoryStore`]; transactional when `staged` is set
pub struct MemoryContext {
    shared: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
    staged: Option<Staged>,
}

impl MemoryContext {
    async fn read<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&State) -> R + Send,
        R: Send,
    {
        match &self.staged {
            Some(staged) => f(&staged.state),
            None => f(&*self.shared.lock().await),
        }
    }

    async fn write(&mut self, write: Write) -> Result<(), AppError> {
        match &mut self.staged {
            Some(staged) => {
                staged.state.apply(&write)?;
                staged.journal.push(write);
                Ok(())
            }
            None => self.shared.lock().await.apply(&write),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[async_trait]
impl TransactionContext for MemoryContext {
    async fn find_user(&mut self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self
            .read(|s| s.users.iter().find(|u| u.id == user_id).cloned())
            .await)
    }

    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .read(|s| s.users.iter().find(|u| u.username == username).cloned())
            .await)
    }

    async fn insert_user(&mut self, username: &str) -> Result<User, AppError> {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
        };
        self.write(Write::User(user.clone())).await?;
        Ok(user)
    }

    async fn insert_resource_type(
        &mut self,
        resource_type: &NewResourceType,
    ) -> Result<ResourceType, AppError> {
        let created = ResourceType {
            id: Uuid::new_v4(),
            name: resource_type.name.clone(),
            unit: resource_type.unit.clone(),
            consumable: resource_type.consumable,
        };
        self.write(Write::ResourceType(created.clone())).await?;
        Ok(created)
    }

    async fn find_resource_type(&mut self, id: Uuid) -> Result<Option<ResourceType>, AppError> {
        Ok(self
            .read(|s| s.resource_types.iter().find(|rt| rt.id == id).cloned())
            .await)
    }

    async fn find_resource_type_by_name(
        &mut self,
        name: &str,
    ) -> Result<Option<ResourceType>, AppError> {
        Ok(self
            .read(|s| {
                s.resource_types
                    .iter()
                    .filter(|rt| rt.name == name)
                    .min_by(|a, b| a.unit.cmp(&b.unit))
                    .cloned()
            })
            .await)
    }

    async fn find_resource_type_by_name_and_unit(
        &mut self,
        name: &str,
        unit: &str,
    ) -> Result<Option<ResourceType>, AppError> {
        Ok(self
            .read(|s| {
                s.resource_types
                    .iter()
                    .find(|rt| rt.name == name && rt.unit == unit)
                    .cloned()
            })
            .await)
    }

    async fn list_resource_types(&mut self) -> Result<Vec<ResourceType>, AppError> {
        let mut resource_types = self.read(|s| s.resource_types.clone()).await;
        resource_types.sort_by(|a, b| (&a.name, &a.unit).cmp(&(&b.name, &b.unit)));
        Ok(resource_types)
    }

    async fn insert_plan(&mut self, plan: &NewPlan) -> Result<Plan, AppError> {
        let created = Plan {
            id: Uuid::new_v4(),
            name: plan.name.clone(),
            description: plan.description.clone(),
            quota_defaults: Vec::new(),
            rates: Vec::new(),
        };
        self.write(Write::Plan(created.clone())).await?;
        Ok(created)
    }

    async fn insert_plan_quota_default(
        &mut self,
        plan_id: Uuid,
        default: &NewPlanQuotaDefault,
    ) -> Result<PlanQuotaDefault, AppError> {
        let resource_type = self
            .find_resource_type(default.resource_type_id)
            .await?
            .ok_or_else(|| missing("plan quota default"))?;
        let created = PlanQuotaDefault {
            id: Uuid::new_v4(),
            plan_id,
            resource_type,
            quota_value: default.quota_value,
            effective_date: default.effective_date,
        };
        self.write(Write::PlanQuotaDefault(created.clone())).await?;
        Ok(created)
    }

    async fn insert_plan_rate(
        &mut self,
        plan_id: Uuid,
        rate: &NewPlanRate,
    ) -> Result<PlanRate, AppError> {
        let created = PlanRate {
            id: Uuid::new_v4(),
            plan_id,
            effective_date: rate.effective_date,
            rate: rate.rate,
        };
        self.write(Write::PlanRate(created.clone())).await?;
        Ok(created)
    }

    async fn find_plan(&mut self, plan_id: Uuid) -> Result<Option<Plan>, AppError> {
        Ok(self
            .read(|s| s.plans.iter().find(|p| p.id == plan_id).cloned())
            .await)
    }

    async fn find_plan_by_name(&mut self, name: &str) -> Result<Option<Plan>, AppError> {
        Ok(self
            .read(|s| s.plans.iter().find(|p| p.name == name).cloned())
            .await)
    }

    async fn list_plans(&mut self) -> Result<Vec<Plan>, AppError> {
        let mut plans = self.read(|s| s.plans.clone()).await;
        plans.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(plans)
    }

    async fn insert_subscription(
        &mut self,
        subscription: &NewSubscription,
    ) -> Result<Subscription, AppError> {
        let now = self.now();
        let created = Subscription {
            id: Uuid::new_v4(),
            user_id: subscription.user_id,
            plan_id: subscription.plan_id,
            plan_rate_id: subscription.plan_rate_id,
            effective_start_date: subscription.effective_start_date,
            effective_end_date: subscription.effective_end_date,
            paid: subscription.paid,
            created_by: subscription.actor.clone(),
            created_at: now,
            last_modified_by: subscription.actor.clone(),
            last_modified_at: now,
        };
        self.write(Write::Subscription(created.clone())).await?;
        Ok(created)
    }

    async fn find_subscription(
        &mut self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        Ok(self
            .read(|s| {
                s.subscriptions
                    .iter()
                    .find(|sub| sub.id == subscription_id)
                    .cloned()
            })
            .await)
    }

    async fn list_user_subscriptions(
        &mut self,
        user_id: Uuid,
    ) -> Result<Vec<Subscription>, AppError> {
        let mut subscriptions: Vec<Subscription> = self
            .read(|s| {
                s.subscriptions
                    .iter()
                    .filter(|sub| sub.user_id == user_id)
                    .cloned()
                    .collect()
            })
            .await;
        subscriptions.sort_by(|a, b| b.effective_start_date.cmp(&a.effective_start_date));
        Ok(subscriptions)
    }

    async fn insert_quota(&mut self, quota: &NewQuota) -> Result<Quota, AppError> {
        let now = self.now();
        let created = Quota {
            id: Uuid::new_v4(),
            subscription_id: quota.subscription_id,
            resource_type: quota.resource_type.clone(),
            quota_value: quota.quota_value,
            created_by: quota.actor.clone(),
            created_at: now,
            last_modified_by: quota.actor.clone(),
            last_modified_at: now,
        };
        self.write(Write::Quota(created.clone())).await?;
        Ok(created)
    }

    async fn list_quotas(&mut self, subscription_id: Uuid) -> Result<Vec<Quota>, AppError> {
        let mut quotas: Vec<Quota> = self
            .read(|s| {
                s.quotas
                    .iter()
                    .filter(|q| q.subscription_id == subscription_id)
                    .cloned()
                    .collect()
            })
            .await;
        quotas.sort_by(|a, b| a.resource_type.name.cmp(&b.resource_type.name));
        Ok(quotas)
    }

    async fn lock_usage(
        &mut self,
        subscription_id: Uuid,
        resource_type_id: Uuid,
    ) -> Result<Option<Usage>, AppError> {
        match &mut self.staged {
            Some(staged) => {
                let version = staged.state.usage_version(subscription_id, resource_type_id);
                staged
                    .locked_versions
                    .entry((subscription_id, resource_type_id))
                    .or_insert(version);
                Ok(staged
                    .state
                    .usage_for(subscription_id, resource_type_id)
                    .cloned())
            }
            None => Ok(self
                .shared
                .lock()
                .await
                .usage_for(subscription_id, resource_type_id)
                .cloned()),
        }
    }

    async fn insert_usage(
        &mut self,
        subscription_id: Uuid,
        resource_type: &ResourceType,
        usage_value: f64,
        actor: &str,
    ) -> Result<Usage, AppError> {
        let now = self.now();
        let created = Usage {
            id: Uuid::new_v4(),
            subscription_id,
            resource_type: resource_type.clone(),
            usage_value,
            created_by: actor.to_string(),
            created_at: now,
            last_modified_by: actor.to_string(),
            last_modified_at: now,
        };
        self.write(Write::InsertUsage(created.clone())).await?;
        Ok(created)
    }

    async fn update_usage_value(
        &mut self,
        usage_id: Uuid,
        usage_value: f64,
        actor: &str,
    ) -> Result<Usage, AppError> {
        let at = self.now();
        self.write(Write::UpdateUsage {
            usage_id,
            usage_value,
            actor: actor.to_string(),
            at,
        })
        .await?;
        self.read(|s| s.usages.iter().find(|u| u.id == usage_id).cloned())
            .await
            .ok_or_else(|| AppError::NotFound(format!("usage {}", usage_id)))
    }

    async fn list_usages(&mut self, subscription_id: Uuid) -> Result<Vec<Usage>, AppError> {
        let mut usages: Vec<Usage> = self
            .read(|s| {
                s.usages
                    .iter()
                    .filter(|u| u.subscription_id == subscription_id)
                    .cloned()
                    .collect()
            })
            .await;
        usages.sort_by(|a, b| a.resource_type.name.cmp(&b.resource_type.name));
        Ok(usages)
    }

    async fn insert_addon(&mut self, addon: &NewAddon) -> Result<Addon, AppError> {
        let created = Addon {
            id: Uuid::new_v4(),
            name: addon.name.clone(),
            description: addon.description.clone(),
            resource_type: addon.resource_type.clone(),
            default_amount: addon.default_amount,
            paid: addon.paid,
        };
        self.write(Write::Addon(created.clone())).await?;
        Ok(created)
    }

    async fn find_addon(&mut self, addon_id: Uuid) -> Result<Option<Addon>, AppError> {
        Ok(self
            .read(|s| s.addons.iter().find(|a| a.id == addon_id).cloned())
            .await)
    }

    async fn list_addons(&mut self) -> Result<Vec<Addon>, AppError> {
        let mut addons = self.read(|s| s.addons.clone()).await;
        addons.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(addons)
    }

    async fn update_addon(&mut self, update: &AddonUpdate) -> Result<Option<Addon>, AppError> {
        if self.find_addon(update.id).await?.is_none() {
            return Ok(None);
        }
        self.write(Write::UpdateAddon(update.clone())).await?;
        self.find_addon(update.id).await
    }

    async fn delete_addon(&mut self, addon_id: Uuid) -> Result<bool, AppError> {
        if self.find_addon(addon_id).await?.is_none() {
            return Ok(false);
        }
        self.write(Write::DeleteAddon(addon_id)).await?;
        Ok(true)
    }

    async fn insert_subscription_addon(
        &mut self,
        subscription_addon: &NewSubscriptionAddon,
    ) -> Result<SubscriptionAddon, AppError> {
        let record = SubscriptionAddonRecord {
            id: Uuid::new_v4(),
            subscription_id: subscription_addon.subscription_id,
            addon_id: subscription_addon.addon.id,
            amount: subscription_addon.amount,
            paid: subscription_addon.paid,
        };
        self.write(Write::SubscriptionAddon(record.clone())).await?;
        self.read(|s| s.subscription_addon(&record))
            .await
            .ok_or_else(|| missing("subscription add-on"))
    }

    async fn list_subscription_addons(
        &mut self,
        subscription_id: Uuid,
    ) -> Result<Vec<SubscriptionAddon>, AppError> {
        let mut addons: Vec<SubscriptionAddon> = self
            .read(|s| {
                s.subscription_addons
                    .iter()
                    .filter(|sa| sa.subscription_id == subscription_id)
                    .filter_map(|sa| s.subscription_addon(sa))
                    .collect()
            })
            .await;
        addons.sort_by(|a, b| a.addon.name.cmp(&b.addon.name));
        Ok(addons)
    }

    async fn delete_subscription_addon(
        &mut self,
        subscription_addon_id: Uuid,
    ) -> Result<bool, AppError> {
        let exists = self
            .read(|s| {
                s.subscription_addons
                    .iter()
                    .any(|sa| sa.id == subscription_addon_id)
            })
            .await;
        if !exists {
            return Ok(false);
        }
        self.write(Write::DeleteSubscriptionAddon(subscription_addon_id))
            .await?;
        Ok(true)
    }

    async fn commit(self) -> Result<(), AppError> {
        let Some(staged) = self.staged else {
            return Ok(());
        };

        let mut shared = self.shared.lock().await;
        for (&(subscription_id, resource_type_id), seen) in &staged.locked_versions {
            if shared.usage_version(subscription_id, resource_type_id) != *seen {
                tracing::warn!(
                    subscription_id = %subscription_id,
                    resource_type_id = %resource_type_id,
                    "Usage row changed since it was read"
                );
                return Err(AppError::Conflict(format!(
                    "usage of subscription {}: concurrent update",
                    subscription_id
                )));
            }
        }

        let mut next = (*shared).clone();
        for write in &staged.journal {
            next.apply(write)?;
        }
        *shared = next;
        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        Ok(())
    }
}
