//! Candle storage and sync pipeline.
//!
//! - [`store`]: one SQLite table per (instrument, granularity), idempotent bulk inserts.
//! - [`sync`]: fetch, normalize and store a pair, or a whole matrix of pairs.
//! - [`config`]: the `candle-sync` TOML configuration.
//! - [`db`]: connection PRAGMAs and embedded migrations.

#![deny(missing_docs)]

pub mod config;
pub mod db;
#[allow(missing_docs)]
pub mod schema;
pub mod store;
pub mod sync;
