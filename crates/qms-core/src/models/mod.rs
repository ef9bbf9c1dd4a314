//! Data models for the quota engine
//!
//! Entities mirror the persisted rows. Child collections (a plan's quota
//! defaults, a subscription's quotas) are attached by the storage layer's
//! assembly functions, never by the entities themselves.

mod addon;
mod overage;
mod plan;
mod quota;
mod resource_type;
mod subscription;
mod usage;
mod user;

pub use addon::*;
pub use overage::*;
pub use plan::*;
pub use quota::*;
pub use resource_type::*;
pub use subscription::*;
pub use usage::*;
pub use user::*;
