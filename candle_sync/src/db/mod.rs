//! Database utilities for connections and schema migrations.
//!
//! This module provides:
//! - SQLite connection helpers: [`connection::connect_sqlite`] applies WAL, foreign_keys=ON, and a 5000ms busy_timeout.
//! - Embedded Diesel migrations: [`migrate::run_pending`] brings the `candle_tables` registry up to date.
//!
//! Example:
//! ```no_run
//! use candle_sync::db::{connection, migrate};
//!
//! let db_path = std::env::temp_dir().join("candle_sync_example.db");
//! let mut conn = connection::connect_sqlite(db_path.to_str().unwrap()).expect("connect");
//! migrate::run_pending(&mut conn).expect("migrations");
//! ```

pub mod connection;
pub mod migrate;
