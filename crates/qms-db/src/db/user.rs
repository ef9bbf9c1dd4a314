use qms_core::models::User;
use qms_core::AppError;
use sqlx::{PgConnection, Postgres};
use uuid::Uuid;

use super::error::classify;

#[tracing::instrument(skip(conn), fields(db.table = "users", db.operation = "select"))]
pub async fn find_by_id(conn: &mut PgConnection, user_id: Uuid) -> Result<Option<User>, AppError> {
    sqlx::query_as::<Postgres, User>("SELECT id, username FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to get user"))
}

#[tracing::instrument(skip(conn), fields(db.table = "users", db.operation = "select"))]
pub async fn find_by_username(
    conn: &mut PgConnection,
    username: &str,
) -> Result<Option<User>, AppError> {
    sqlx::query_as::<Postgres, User>("SELECT id, username FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to get user by username"))
}

#[tracing::instrument(skip(conn), fields(db.table = "users", db.operation = "insert"))]
pub async fn insert(conn: &mut PgConnection, username: &str) -> Result<User, AppError> {
    let user = sqlx::query_as::<Postgres, User>(
        r#"
        INSERT INTO users (username)
        VALUES ($1)
        RETURNING id, username
        "#,
    )
    .bind(username)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| classify(e, "Failed to create user"))?;

    tracing::debug!(user_id = %user.id, username = %user.username, "User created");
    Ok(user)
}
