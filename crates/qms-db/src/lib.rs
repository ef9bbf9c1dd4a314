//! Postgres storage for the quota engine

pub mod db;

pub use db::{connect, migrate, PgContext, PgQuotaStore, MIGRATOR};
