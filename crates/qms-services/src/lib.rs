//! QMS Services
//!
//! The operations the surrounding request layer calls: subscription
//! creation and lookup, usage updates, overage reporting and add-ons, plus
//! the catalog administration behind them. Every operation runs against a
//! caller-supplied [`qms_core::TransactionContext`]; the caller owns the
//! transaction scope.

pub mod addon;
pub mod catalog;
pub mod memory;
pub mod overage;
pub mod subscription;
pub mod usage;

pub use addon::{AddonService, NewAddonRequest, ResourceTypeRef};
pub use catalog::{CatalogService, NewPlanRequest};
pub use memory::{MemoryContext, MemoryStore};
pub use overage::OverageService;
pub use subscription::{assemble_subscription_details, SubscriptionService};
pub use usage::UsageLedger;
