use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of resource a quota or usage is measured in.
///
/// Consumable resources (compute time) accrue per billing period; the others
/// (storage size) are capacities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ResourceType {
    pub id: Uuid,
    pub name: String,
    pub unit: String,
    pub consumable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewResourceType {
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub consumable: bool,
}
