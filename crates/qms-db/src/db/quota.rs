use qms_core::models::{NewQuota, Quota};
use qms_core::AppError;
use sqlx::{PgConnection, Postgres};
use uuid::Uuid;

use super::error::classify;
use super::rows::{QuotaRow, RESOURCE_TYPE_COLUMNS};

const QUOTA_COLUMNS: &str = "q.id, q.subscription_id, q.quota, q.created_by, q.created_at, \
    q.last_modified_by, q.last_modified_at";

#[tracing::instrument(skip(conn), fields(db.table = "quotas", db.operation = "insert"))]
pub async fn insert(conn: &mut PgConnection, quota: &NewQuota) -> Result<Quota, AppError> {
    let sql = format!(
        r#"
        WITH q AS (
            INSERT INTO quotas (subscription_id, resource_type_id, quota, created_by, last_modified_by)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
        )
        SELECT {QUOTA_COLUMNS}, {RESOURCE_TYPE_COLUMNS}
        FROM q
        JOIN resource_types rt ON q.resource_type_id = rt.id
        "#
    );

    let row = sqlx::query_as::<Postgres, QuotaRow>(&sql)
        .bind(quota.subscription_id)
        .bind(quota.resource_type.id)
        .bind(quota.quota_value)
        .bind(&quota.actor)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to create quota"))?;

    tracing::debug!(
        subscription_id = %row.subscription_id,
        resource_type = %row.rt_name,
        quota = row.quota,
        "Quota created"
    );
    Ok(row.into_quota())
}

#[tracing::instrument(skip(conn), fields(db.table = "quotas", db.operation = "select"))]
pub async fn list_by_subscription(
    conn: &mut PgConnection,
    subscription_id: Uuid,
) -> Result<Vec<Quota>, AppError> {
    let sql = format!(
        r#"
        SELECT {QUOTA_COLUMNS}, {RESOURCE_TYPE_COLUMNS}
        FROM quotas q
        JOIN resource_types rt ON q.resource_type_id = rt.id
        WHERE q.subscription_id = $1
        ORDER BY rt.name
        "#
    );

    let rows = sqlx::query_as::<Postgres, QuotaRow>(&sql)
        .bind(subscription_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to list quotas"))?;

    Ok(rows.into_iter().map(QuotaRow::into_quota).collect())
}
