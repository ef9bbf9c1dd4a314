use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ResourceType;

/// Purchasable increment to a resource allotment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Addon {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub resource_type: ResourceType,
    pub default_amount: f64,
    pub paid: bool,
}

/// An add-on attached to a subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionAddon {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub addon: Addon,
    /// `None` falls back to the add-on's default amount.
    pub amount: Option<f64>,
    pub paid: bool,
}

impl SubscriptionAddon {
    pub fn effective_amount(&self) -> f64 {
        self.amount.unwrap_or(self.addon.default_amount)
    }
}

/// Catalog entry to create. The resource type is resolved beforehand.
#[derive(Debug, Clone)]
pub struct NewAddon {
    pub name: String,
    pub description: String,
    pub resource_type: ResourceType,
    pub default_amount: f64,
    pub paid: bool,
}

/// Partial update of a catalog entry; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddonUpdate {
    pub id: Uuid,
    pub name: Option<String>,
    pub description: Option<String>,
    pub resource_type_id: Option<Uuid>,
    pub default_amount: Option<f64>,
    pub paid: Option<bool>,
}

/// Row values for attaching an add-on
#[derive(Debug, Clone)]
pub struct NewSubscriptionAddon {
    pub subscription_id: Uuid,
    pub addon: Addon,
    pub amount: Option<f64>,
    pub paid: bool,
}
