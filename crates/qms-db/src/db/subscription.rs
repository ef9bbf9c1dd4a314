use qms_core::models::{NewSubscription, Subscription};
use qms_core::AppError;
use sqlx::{PgConnection, Postgres};
use uuid::Uuid;

use super::error::classify;

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, plan_rate_id, effective_start_date, \
    effective_end_date, paid, created_by, created_at, last_modified_by, last_modified_at";

#[tracing::instrument(skip(conn), fields(db.table = "subscriptions", db.operation = "insert"))]
pub async fn insert(
    conn: &mut PgConnection,
    subscription: &NewSubscription,
) -> Result<Subscription, AppError> {
    let sql = format!(
        r#"
        INSERT INTO subscriptions (
            user_id, plan_id, plan_rate_id, effective_start_date, effective_end_date,
            paid, created_by, last_modified_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        RETURNING {SUBSCRIPTION_COLUMNS}
        "#
    );

    let created = sqlx::query_as::<Postgres, Subscription>(&sql)
        .bind(subscription.user_id)
        .bind(subscription.plan_id)
        .bind(subscription.plan_rate_id)
        .bind(subscription.effective_start_date)
        .bind(subscription.effective_end_date)
        .bind(subscription.paid)
        .bind(&subscription.actor)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to create subscription"))?;

    tracing::debug!(
        subscription_id = %created.id,
        user_id = %created.user_id,
        plan_id = %created.plan_id,
        "Subscription created"
    );
    Ok(created)
}

#[tracing::instrument(skip(conn), fields(db.table = "subscriptions", db.operation = "select"))]
pub async fn find_by_id(
    conn: &mut PgConnection,
    subscription_id: Uuid,
) -> Result<Option<Subscription>, AppError> {
    let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1");
    sqlx::query_as::<Postgres, Subscription>(&sql)
        .bind(subscription_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to get subscription"))
}

#[tracing::instrument(skip(conn), fields(db.table = "subscriptions", db.operation = "select"))]
pub async fn list_by_user(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Vec<Subscription>, AppError> {
    let sql = format!(
        r#"
        SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
        WHERE user_id = $1
        ORDER BY effective_start_date DESC
        "#
    );
    sqlx::query_as::<Postgres, Subscription>(&sql)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to list user subscriptions"))
}
