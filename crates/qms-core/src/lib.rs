//! QMS Core Library
//!
//! Domain models, error types, configuration and the pure accounting rules of
//! the subscription & quota engine, plus the storage seam the other crates
//! implement and call through.

pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod materialize;
pub mod models;
pub mod overage;
pub mod store;
pub mod temporal;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, LogFormat};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use store::{QuotaStore, TransactionContext};
pub use temporal::{active_among, Effective};
