//! Resource type and plan catalog

use qms_core::models::{
    NewPlan, NewPlanQuotaDefault, NewPlanRate, NewResourceType, Plan, PlanRate, ResourceType,
};
use qms_core::{AppError, TransactionContext};
use uuid::Uuid;

/// Plan with the quota defaults and rates it starts out with
#[derive(Debug, Clone)]
pub struct NewPlanRequest {
    pub name: String,
    pub description: String,
    pub quota_defaults: Vec<NewPlanQuotaDefault>,
    pub rates: Vec<NewPlanRate>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CatalogService;

impl CatalogService {
    pub fn new() -> Self {
        Self
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn add_resource_type<C: TransactionContext>(
        &self,
        ctx: &mut C,
        resource_type: NewResourceType,
    ) -> Result<ResourceType, AppError> {
        if resource_type.name.trim().is_empty() {
            return Err(AppError::InvalidInput("name must be set".to_string()));
        }
        if resource_type.unit.trim().is_empty() {
            return Err(AppError::InvalidInput("unit must be set".to_string()));
        }

        let created = ctx.insert_resource_type(&resource_type).await?;
        tracing::info!(
            resource_type_id = %created.id,
            name = %created.name,
            unit = %created.unit,
            consumable = created.consumable,
            "Resource type created"
        );
        Ok(created)
    }

    pub async fn list_resource_types<C: TransactionContext>(
        &self,
        ctx: &mut C,
    ) -> Result<Vec<ResourceType>, AppError> {
        ctx.list_resource_types().await
    }

    pub async fn find_resource_type<C: TransactionContext>(
        &self,
        ctx: &mut C,
        name: &str,
        unit: &str,
    ) -> Result<Option<ResourceType>, AppError> {
        ctx.find_resource_type_by_name_and_unit(name, unit).await
    }

    /// Creates a plan together with its quota defaults and rates and returns
    /// it fully assembled.
    #[tracing::instrument(skip(self, ctx, request), fields(plan = %request.name))]
    pub async fn add_plan<C: TransactionContext>(
        &self,
        ctx: &mut C,
        request: NewPlanRequest,
    ) -> Result<Plan, AppError> {
        if request.name.trim().is_empty() {
            return Err(AppError::InvalidInput("name must be set".to_string()));
        }
        for default in &request.quota_defaults {
            if !default.quota_value.is_finite() || default.quota_value < 0.0 {
                return Err(AppError::InvalidInput(format!(
                    "quota_value must be a non-negative number, got {}",
                    default.quota_value
                )));
            }
        }
        for rate in &request.rates {
            validate_rate(rate)?;
        }

        let plan = ctx
            .insert_plan(&NewPlan {
                name: request.name,
                description: request.description,
            })
            .await?;

        for default in &request.quota_defaults {
            if ctx
                .find_resource_type(default.resource_type_id)
                .await?
                .is_none()
            {
                return Err(AppError::NotFound(format!(
                    "resource type {}",
                    default.resource_type_id
                )));
            }
            ctx.insert_plan_quota_default(plan.id, default).await?;
        }
        for rate in &request.rates {
            ctx.insert_plan_rate(plan.id, rate).await?;
        }

        tracing::info!(
            plan_id = %plan.id,
            quota_defaults = request.quota_defaults.len(),
            rates = request.rates.len(),
            "Plan created"
        );

        ctx.find_plan(plan.id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("plan {} vanished after insert", plan.id)))
    }

    /// Adds a rate to a plan's history. It becomes the active rate once its
    /// effective date is reached, until a later one takes over.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn add_plan_rate<C: TransactionContext>(
        &self,
        ctx: &mut C,
        plan_id: Uuid,
        rate: NewPlanRate,
    ) -> Result<PlanRate, AppError> {
        validate_rate(&rate)?;
        if ctx.find_plan(plan_id).await?.is_none() {
            return Err(AppError::NotFound(format!("plan {}", plan_id)));
        }

        let created = ctx.insert_plan_rate(plan_id, &rate).await?;
        tracing::info!(
            plan_id = %plan_id,
            rate = %created.rate,
            effective_date = %created.effective_date,
            "Plan rate added"
        );
        Ok(created)
    }

    pub async fn find_plan<C: TransactionContext>(
        &self,
        ctx: &mut C,
        plan_id: Uuid,
    ) -> Result<Plan, AppError> {
        ctx.find_plan(plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("plan {}", plan_id)))
    }

    pub async fn find_plan_by_name<C: TransactionContext>(
        &self,
        ctx: &mut C,
        name: &str,
    ) -> Result<Plan, AppError> {
        ctx.find_plan_by_name(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("plan {}", name)))
    }

    pub async fn list_plans<C: TransactionContext>(
        &self,
        ctx: &mut C,
    ) -> Result<Vec<Plan>, AppError> {
        ctx.list_plans().await
    }
}

fn validate_rate(rate: &NewPlanRate) -> Result<(), AppError> {
    if rate.rate.is_sign_negative() {
        return Err(AppError::InvalidInput(format!(
            "rate must not be negative, got {}",
            rate.rate
        )));
    }
    Ok(())
}
