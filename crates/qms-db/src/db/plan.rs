use qms_core::models::{
    NewPlan, NewPlanQuotaDefault, NewPlanRate, Plan, PlanQuotaDefault, PlanRate,
};
use qms_core::AppError;
use sqlx::{PgConnection, Postgres};
use uuid::Uuid;

use super::error::classify;
use super::rows::{assemble_plan, assemble_plans, PlanQuotaDefaultRow, PlanRow, RESOURCE_TYPE_COLUMNS};

#[tracing::instrument(skip(conn), fields(db.table = "plans", db.operation = "insert"))]
pub async fn insert(conn: &mut PgConnection, plan: &NewPlan) -> Result<Plan, AppError> {
    let row = sqlx::query_as::<Postgres, PlanRow>(
        r#"
        INSERT INTO plans (name, description)
        VALUES ($1, $2)
        RETURNING id, name, description
        "#,
    )
    .bind(&plan.name)
    .bind(&plan.description)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| classify(e, "Failed to create plan"))?;

    tracing::debug!(plan_id = %row.id, name = %row.name, "Plan created");
    Ok(assemble_plan(row, Vec::new(), Vec::new()))
}

#[tracing::instrument(skip(conn), fields(db.table = "plan_quota_defaults", db.operation = "insert"))]
pub async fn insert_quota_default(
    conn: &mut PgConnection,
    plan_id: Uuid,
    default: &NewPlanQuotaDefault,
) -> Result<PlanQuotaDefault, AppError> {
    let sql = format!(
        r#"
        WITH inserted AS (
            INSERT INTO plan_quota_defaults (plan_id, resource_type_id, quota_value, effective_date)
            VALUES ($1, $2, $3, $4)
            RETURNING *
        )
        SELECT pqd.id, pqd.plan_id, pqd.quota_value, pqd.effective_date, {RESOURCE_TYPE_COLUMNS}
        FROM inserted pqd
        JOIN resource_types rt ON pqd.resource_type_id = rt.id
        "#
    );

    let row = sqlx::query_as::<Postgres, PlanQuotaDefaultRow>(&sql)
        .bind(plan_id)
        .bind(default.resource_type_id)
        .bind(default.quota_value)
        .bind(default.effective_date)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to create plan quota default"))?;

    tracing::debug!(
        plan_id = %plan_id,
        resource_type = %row.rt_name,
        quota_value = row.quota_value,
        "Plan quota default created"
    );
    Ok(row.into_quota_default())
}

#[tracing::instrument(skip(conn), fields(db.table = "plan_rates", db.operation = "insert"))]
pub async fn insert_rate(
    conn: &mut PgConnection,
    plan_id: Uuid,
    rate: &NewPlanRate,
) -> Result<PlanRate, AppError> {
    let created = sqlx::query_as::<Postgres, PlanRate>(
        r#"
        INSERT INTO plan_rates (plan_id, effective_date, rate)
        VALUES ($1, $2, $3)
        RETURNING id, plan_id, effective_date, rate
        "#,
    )
    .bind(plan_id)
    .bind(rate.effective_date)
    .bind(rate.rate)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| classify(e, "Failed to create plan rate"))?;

    tracing::debug!(
        plan_id = %plan_id,
        rate = %created.rate,
        effective_date = %created.effective_date,
        "Plan rate created"
    );
    Ok(created)
}

fn quota_defaults_sql(filter: &str) -> String {
    format!(
        r#"
        SELECT pqd.id, pqd.plan_id, pqd.quota_value, pqd.effective_date, {RESOURCE_TYPE_COLUMNS}
        FROM plan_quota_defaults pqd
        JOIN resource_types rt ON pqd.resource_type_id = rt.id
        {filter}
        ORDER BY rt.name, pqd.effective_date
        "#
    )
}

async fn quota_defaults(
    conn: &mut PgConnection,
    plan_id: Uuid,
) -> Result<Vec<PlanQuotaDefault>, AppError> {
    let rows = sqlx::query_as::<Postgres, PlanQuotaDefaultRow>(&quota_defaults_sql(
        "WHERE pqd.plan_id = $1",
    ))
    .bind(plan_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| classify(e, "Failed to list plan quota defaults"))?;

    Ok(rows.into_iter().map(PlanQuotaDefaultRow::into_quota_default).collect())
}

async fn rates(conn: &mut PgConnection, plan_id: Uuid) -> Result<Vec<PlanRate>, AppError> {
    sqlx::query_as::<Postgres, PlanRate>(
        r#"
        SELECT id, plan_id, effective_date, rate FROM plan_rates
        WHERE plan_id = $1
        ORDER BY effective_date
        "#,
    )
    .bind(plan_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| classify(e, "Failed to list plan rates"))
}

async fn load(conn: &mut PgConnection, row: Option<PlanRow>) -> Result<Option<Plan>, AppError> {
    match row {
        Some(row) => {
            let defaults = quota_defaults(conn, row.id).await?;
            let rates = rates(conn, row.id).await?;
            Ok(Some(assemble_plan(row, defaults, rates)))
        }
        None => Ok(None),
    }
}

#[tracing::instrument(skip(conn), fields(db.table = "plans", db.operation = "select"))]
pub async fn find_by_id(conn: &mut PgConnection, plan_id: Uuid) -> Result<Option<Plan>, AppError> {
    let row = sqlx::query_as::<Postgres, PlanRow>(
        "SELECT id, name, description FROM plans WHERE id = $1",
    )
    .bind(plan_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| classify(e, "Failed to get plan"))?;

    load(conn, row).await
}

#[tracing::instrument(skip(conn), fields(db.table = "plans", db.operation = "select"))]
pub async fn find_by_name(conn: &mut PgConnection, name: &str) -> Result<Option<Plan>, AppError> {
    let row = sqlx::query_as::<Postgres, PlanRow>(
        "SELECT id, name, description FROM plans WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| classify(e, "Failed to get plan by name"))?;

    load(conn, row).await
}

#[tracing::instrument(skip(conn), fields(db.table = "plans", db.operation = "select"))]
pub async fn list(conn: &mut PgConnection) -> Result<Vec<Plan>, AppError> {
    let rows = sqlx::query_as::<Postgres, PlanRow>(
        "SELECT id, name, description FROM plans ORDER BY name",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| classify(e, "Failed to list plans"))?;

    let defaults = sqlx::query_as::<Postgres, PlanQuotaDefaultRow>(&quota_defaults_sql(""))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to list plan quota defaults"))?
        .into_iter()
        .map(PlanQuotaDefaultRow::into_quota_default)
        .collect();

    let rates = sqlx::query_as::<Postgres, PlanRate>(
        "SELECT id, plan_id, effective_date, rate FROM plan_rates ORDER BY effective_date",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| classify(e, "Failed to list plan rates"))?;

    Ok(assemble_plans(rows, defaults, rates))
}
