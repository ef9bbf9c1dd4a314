use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account holder a subscription belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: Uuid,
    pub username: String,
}
