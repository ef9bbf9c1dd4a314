use qms_core::models::{Addon, AddonUpdate, NewAddon, NewSubscriptionAddon, SubscriptionAddon};
use qms_core::AppError;
use sqlx::{PgConnection, Postgres};
use uuid::Uuid;

use super::error::classify;
use super::rows::{AddonRow, SubscriptionAddonRow, RESOURCE_TYPE_COLUMNS};

const ADDON_COLUMNS: &str = "a.id, a.name, a.description, a.default_amount, a.default_paid";

const SUBSCRIPTION_ADDON_COLUMNS: &str = "sa.id, sa.subscription_id, sa.amount, sa.paid, \
    a.id AS addon_id, a.name AS addon_name, a.description AS addon_description, \
    a.default_amount AS addon_default_amount, a.default_paid AS addon_default_paid";

#[tracing::instrument(skip(conn), fields(db.table = "addons", db.operation = "insert"))]
pub async fn insert(conn: &mut PgConnection, addon: &NewAddon) -> Result<Addon, AppError> {
    let sql = format!(
        r#"
        WITH a AS (
            INSERT INTO addons (name, description, resource_type_id, default_amount, default_paid)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
        )
        SELECT {ADDON_COLUMNS}, {RESOURCE_TYPE_COLUMNS}
        FROM a
        JOIN resource_types rt ON a.resource_type_id = rt.id
        "#
    );

    let row = sqlx::query_as::<Postgres, AddonRow>(&sql)
        .bind(&addon.name)
        .bind(&addon.description)
        .bind(addon.resource_type.id)
        .bind(addon.default_amount)
        .bind(addon.paid)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to create add-on"))?;

    tracing::debug!(addon_id = %row.id, name = %row.name, "Add-on created");
    Ok(row.into_addon())
}

#[tracing::instrument(skip(conn), fields(db.table = "addons", db.operation = "select"))]
pub async fn find_by_id(conn: &mut PgConnection, addon_id: Uuid) -> Result<Option<Addon>, AppError> {
    let sql = format!(
        r#"
        SELECT {ADDON_COLUMNS}, {RESOURCE_TYPE_COLUMNS}
        FROM addons a
        JOIN resource_types rt ON a.resource_type_id = rt.id
        WHERE a.id = $1
        "#
    );

    let row = sqlx::query_as::<Postgres, AddonRow>(&sql)
        .bind(addon_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to get add-on"))?;

    Ok(row.map(AddonRow::into_addon))
}

#[tracing::instrument(skip(conn), fields(db.table = "addons", db.operation = "select"))]
pub async fn list(conn: &mut PgConnection) -> Result<Vec<Addon>, AppError> {
    let sql = format!(
        r#"
        SELECT {ADDON_COLUMNS}, {RESOURCE_TYPE_COLUMNS}
        FROM addons a
        JOIN resource_types rt ON a.resource_type_id = rt.id
        ORDER BY a.name
        "#
    );

    let rows = sqlx::query_as::<Postgres, AddonRow>(&sql)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to list add-ons"))?;

    Ok(rows.into_iter().map(AddonRow::into_addon).collect())
}

#[tracing::instrument(skip(conn), fields(db.table = "addons", db.operation = "update"))]
pub async fn update(conn: &mut PgConnection, update: &AddonUpdate) -> Result<Option<Addon>, AppError> {
    let sql = format!(
        r#"
        WITH a AS (
            UPDATE addons
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                resource_type_id = COALESCE($4, resource_type_id),
                default_amount = COALESCE($5, default_amount),
                default_paid = COALESCE($6, default_paid)
            WHERE id = $1
            RETURNING *
        )
        SELECT {ADDON_COLUMNS}, {RESOURCE_TYPE_COLUMNS}
        FROM a
        JOIN resource_types rt ON a.resource_type_id = rt.id
        "#
    );

    let row = sqlx::query_as::<Postgres, AddonRow>(&sql)
        .bind(update.id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.resource_type_id)
        .bind(update.default_amount)
        .bind(update.paid)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to update add-on"))?;

    if let Some(ref row) = row {
        tracing::debug!(addon_id = %row.id, "Add-on updated");
    }
    Ok(row.map(AddonRow::into_addon))
}

#[tracing::instrument(skip(conn), fields(db.table = "addons", db.operation = "delete"))]
pub async fn delete(conn: &mut PgConnection, addon_id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM addons WHERE id = $1")
        .bind(addon_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to delete add-on"))?;

    let deleted = result.rows_affected() > 0;
    if deleted {
        tracing::debug!(addon_id = %addon_id, "Add-on deleted");
    }
    Ok(deleted)
}

#[tracing::instrument(skip(conn), fields(db.table = "subscription_addons", db.operation = "insert"))]
pub async fn attach(
    conn: &mut PgConnection,
    subscription_addon: &NewSubscriptionAddon,
) -> Result<SubscriptionAddon, AppError> {
    let sql = format!(
        r#"
        WITH sa AS (
            INSERT INTO subscription_addons (subscription_id, addon_id, amount, paid)
            VALUES ($1, $2, $3, $4)
            RETURNING *
        )
        SELECT {SUBSCRIPTION_ADDON_COLUMNS}, {RESOURCE_TYPE_COLUMNS}
        FROM sa
        JOIN addons a ON sa.addon_id = a.id
        JOIN resource_types rt ON a.resource_type_id = rt.id
        "#
    );

    let row = sqlx::query_as::<Postgres, SubscriptionAddonRow>(&sql)
        .bind(subscription_addon.subscription_id)
        .bind(subscription_addon.addon.id)
        .bind(subscription_addon.amount)
        .bind(subscription_addon.paid)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to attach add-on"))?;

    Ok(row.into_subscription_addon())
}

#[tracing::instrument(skip(conn), fields(db.table = "subscription_addons", db.operation = "select"))]
pub async fn list_by_subscription(
    conn: &mut PgConnection,
    subscription_id: Uuid,
) -> Result<Vec<SubscriptionAddon>, AppError> {
    let sql = format!(
        r#"
        SELECT {SUBSCRIPTION_ADDON_COLUMNS}, {RESOURCE_TYPE_COLUMNS}
        FROM subscription_addons sa
        JOIN addons a ON sa.addon_id = a.id
        JOIN resource_types rt ON a.resource_type_id = rt.id
        WHERE sa.subscription_id = $1
        ORDER BY a.name
        "#
    );

    let rows = sqlx::query_as::<Postgres, SubscriptionAddonRow>(&sql)
        .bind(subscription_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to list subscription add-ons"))?;

    Ok(rows
        .into_iter()
        .map(SubscriptionAddonRow::into_subscription_addon)
        .collect())
}

#[tracing::instrument(skip(conn), fields(db.table = "subscription_addons", db.operation = "delete"))]
pub async fn detach(conn: &mut PgConnection, subscription_addon_id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM subscription_addons WHERE id = $1")
        .bind(subscription_addon_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to detach add-on"))?;

    Ok(result.rows_affected() > 0)
}
