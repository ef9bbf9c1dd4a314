use qms_core::models::{NewResourceType, ResourceType};
use qms_core::AppError;
use sqlx::{PgConnection, Postgres};
use uuid::Uuid;

use super::error::classify;

#[tracing::instrument(skip(conn), fields(db.table = "resource_types", db.operation = "insert"))]
pub async fn insert(
    conn: &mut PgConnection,
    resource_type: &NewResourceType,
) -> Result<ResourceType, AppError> {
    let created = sqlx::query_as::<Postgres, ResourceType>(
        r#"
        INSERT INTO resource_types (name, unit, consumable)
        VALUES ($1, $2, $3)
        RETURNING id, name, unit, consumable
        "#,
    )
    .bind(&resource_type.name)
    .bind(&resource_type.unit)
    .bind(resource_type.consumable)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| classify(e, "Failed to create resource type"))?;

    tracing::debug!(
        resource_type_id = %created.id,
        name = %created.name,
        unit = %created.unit,
        consumable = created.consumable,
        "Resource type created"
    );
    Ok(created)
}

#[tracing::instrument(skip(conn), fields(db.table = "resource_types", db.operation = "select"))]
pub async fn find_by_id(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<ResourceType>, AppError> {
    sqlx::query_as::<Postgres, ResourceType>(
        "SELECT id, name, unit, consumable FROM resource_types WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| classify(e, "Failed to get resource type"))
}

/// First match by name; names are only unique together with the unit.
#[tracing::instrument(skip(conn), fields(db.table = "resource_types", db.operation = "select"))]
pub async fn find_by_name(
    conn: &mut PgConnection,
    name: &str,
) -> Result<Option<ResourceType>, AppError> {
    sqlx::query_as::<Postgres, ResourceType>(
        r#"
        SELECT id, name, unit, consumable FROM resource_types
        WHERE name = $1
        ORDER BY unit
        LIMIT 1
        "#,
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| classify(e, "Failed to get resource type by name"))
}

#[tracing::instrument(skip(conn), fields(db.table = "resource_types", db.operation = "select"))]
pub async fn find_by_name_and_unit(
    conn: &mut PgConnection,
    name: &str,
    unit: &str,
) -> Result<Option<ResourceType>, AppError> {
    sqlx::query_as::<Postgres, ResourceType>(
        "SELECT id, name, unit, consumable FROM resource_types WHERE name = $1 AND unit = $2",
    )
    .bind(name)
    .bind(unit)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| classify(e, "Failed to get resource type by name and unit"))
}

#[tracing::instrument(skip(conn), fields(db.table = "resource_types", db.operation = "select"))]
pub async fn list(conn: &mut PgConnection) -> Result<Vec<ResourceType>, AppError> {
    sqlx::query_as::<Postgres, ResourceType>(
        "SELECT id, name, unit, consumable FROM resource_types ORDER BY name, unit",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| classify(e, "Failed to list resource types"))
}
