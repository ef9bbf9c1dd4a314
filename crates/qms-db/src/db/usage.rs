use qms_core::models::{ResourceType, Usage};
use qms_core::AppError;
use sqlx::{PgConnection, Postgres};
use uuid::Uuid;

use super::error::classify;
use super::rows::{UsageRow, RESOURCE_TYPE_COLUMNS};

const USAGE_COLUMNS: &str = "u.id, u.subscription_id, u.usage, u.created_by, u.created_at, \
    u.last_modified_by, u.last_modified_at";

/// Reads the counter with a row lock held until the surrounding transaction
/// ends. In autocommit mode the lock is released immediately.
#[tracing::instrument(skip(conn), fields(db.table = "usages", db.operation = "select_for_update"))]
pub async fn lock(
    conn: &mut PgConnection,
    subscription_id: Uuid,
    resource_type_id: Uuid,
) -> Result<Option<Usage>, AppError> {
    let sql = format!(
        r#"
        SELECT {USAGE_COLUMNS}, {RESOURCE_TYPE_COLUMNS}
        FROM usages u
        JOIN resource_types rt ON u.resource_type_id = rt.id
        WHERE u.subscription_id = $1 AND u.resource_type_id = $2
        FOR UPDATE OF u
        "#
    );

    let row = sqlx::query_as::<Postgres, UsageRow>(&sql)
        .bind(subscription_id)
        .bind(resource_type_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to lock usage"))?;

    Ok(row.map(UsageRow::into_usage))
}

#[tracing::instrument(skip(conn, resource_type), fields(db.table = "usages", db.operation = "insert"))]
pub async fn insert(
    conn: &mut PgConnection,
    subscription_id: Uuid,
    resource_type: &ResourceType,
    usage_value: f64,
    actor: &str,
) -> Result<Usage, AppError> {
    let sql = format!(
        r#"
        WITH u AS (
            INSERT INTO usages (subscription_id, resource_type_id, usage, created_by, last_modified_by)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
        )
        SELECT {USAGE_COLUMNS}, {RESOURCE_TYPE_COLUMNS}
        FROM u
        JOIN resource_types rt ON u.resource_type_id = rt.id
        "#
    );

    let row = sqlx::query_as::<Postgres, UsageRow>(&sql)
        .bind(subscription_id)
        .bind(resource_type.id)
        .bind(usage_value)
        .bind(actor)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to create usage"))?;

    Ok(row.into_usage())
}

#[tracing::instrument(skip(conn), fields(db.table = "usages", db.operation = "update"))]
pub async fn update_value(
    conn: &mut PgConnection,
    usage_id: Uuid,
    usage_value: f64,
    actor: &str,
) -> Result<Usage, AppError> {
    let sql = format!(
        r#"
        WITH u AS (
            UPDATE usages
            SET usage = $2, last_modified_by = $3, last_modified_at = now()
            WHERE id = $1
            RETURNING *
        )
        SELECT {USAGE_COLUMNS}, {RESOURCE_TYPE_COLUMNS}
        FROM u
        JOIN resource_types rt ON u.resource_type_id = rt.id
        "#
    );

    let row = sqlx::query_as::<Postgres, UsageRow>(&sql)
        .bind(usage_id)
        .bind(usage_value)
        .bind(actor)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| classify(e, &format!("usage {}", usage_id)))?;

    Ok(row.into_usage())
}

#[tracing::instrument(skip(conn), fields(db.table = "usages", db.operation = "select"))]
pub async fn list_by_subscription(
    conn: &mut PgConnection,
    subscription_id: Uuid,
) -> Result<Vec<Usage>, AppError> {
    let sql = format!(
        r#"
        SELECT {USAGE_COLUMNS}, {RESOURCE_TYPE_COLUMNS}
        FROM usages u
        JOIN resource_types rt ON u.resource_type_id = rt.id
        WHERE u.subscription_id = $1
        ORDER BY rt.name
        "#
    );

    let rows = sqlx::query_as::<Postgres, UsageRow>(&sql)
        .bind(subscription_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to list usages"))?;

    Ok(rows.into_iter().map(UsageRow::into_usage).collect())
}
