//! Postgres persistence for the quota engine
//!
//! One module per table family. Each query is a free function over a
//! `&mut PgConnection`; [`transaction::PgContext`] wires them to the
//! engine's storage seam.

pub mod addon;
pub mod plan;
pub mod pool;
pub mod quota;
pub mod resource_type;
pub mod subscription;
pub mod transaction;
pub mod usage;
pub mod user;

mod error;
mod rows;

pub use pool::{connect, migrate, MIGRATOR};
pub use transaction::{PgContext, PgQuotaStore};
