use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ResourceType;
use crate::error::AppError;

/// Running consumption counter for one subscription and resource type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub resource_type: ResourceType,
    pub usage_value: f64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_modified_by: String,
    pub last_modified_at: DateTime<Utc>,
}

/// How an update amount is applied to a usage counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateOperation {
    /// Accumulate onto the current value.
    Add,
    /// Replace the current value.
    Set,
}

impl UpdateOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOperation::Add => "ADD",
            UpdateOperation::Set => "SET",
        }
    }
}

impl fmt::Display for UpdateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateOperation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ADD" => Ok(UpdateOperation::Add),
            "SET" => Ok(UpdateOperation::Set),
            _ => Err(AppError::InvalidUpdateOperation(s.to_string())),
        }
    }
}
