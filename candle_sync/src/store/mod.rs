//! Candle persistence: one SQLite table per (instrument, granularity) pair.
//!
//! [`CandleStore`] is the portable surface; [`SqliteCandleStore`] is the diesel-backed
//! implementation. Table naming lives in [`naming`].
//!
//! Every stored table has the same shape:
//!
//! | column       | type                                   |
//! |--------------|----------------------------------------|
//! | `id`         | `INTEGER PRIMARY KEY AUTOINCREMENT`    |
//! | `timestamp`  | `TEXT NOT NULL UNIQUE` (RFC3339 UTC ms) |
//! | `open` … `close` | `REAL NOT NULL`                    |
//! | `volume`     | `INTEGER NOT NULL`                     |
//! | `in_session` | `INTEGER NOT NULL` (0/1)               |
//!
//! Rows are append-only: inserting a timestamp that already exists is a no-op.

pub mod naming;
pub mod sqlite;

use candle_ingestor::models::{candle::CandleSeries, granularity::Granularity, instrument::Instrument};
use diesel::{Queryable, Selectable};
use thiserror::Error;

pub use naming::table_name;
pub use sqlite::SqliteCandleStore;

/// Errors raised by a [`CandleStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A statement failed; any open transaction was rolled back.
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// The database file could not be opened.
    #[error("cannot open database: {0}")]
    Connection(#[from] diesel::ConnectionError),

    /// Embedded migrations failed to apply.
    #[error("migration failed: {0}")]
    Migration(String),

    /// The derived table name contains characters outside `[A-Za-z0-9_]`.
    #[error("invalid table name {0:?}")]
    InvalidTableName(String),

    /// A previous holder of the connection panicked.
    #[error("store connection lock poisoned")]
    LockPoisoned,

    /// A blocking store task did not complete.
    #[error("store task failed: {0}")]
    Join(String),
}

/// One row of the `candle_tables` registry.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = crate::schema::candle_tables)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CandleTableInfo {
    /// Table name, as returned by [`table_name`].
    pub name: String,
    /// Instrument the table holds.
    pub instrument: String,
    /// Granularity code.
    pub granularity: String,
    /// Creation time, RFC3339 UTC.
    pub created_at: String,
}

/// Portable surface over candle storage; the SQLite implementation lives in `sqlite.rs`.
///
/// Implementations are blocking. Async callers go through
/// `tokio::task::spawn_blocking`.
pub trait CandleStore: Send + Sync {
    /// Creates the pair's table if needed and registers it. Returns the table name.
    fn ensure_table(&self, instrument: &Instrument, granularity: Granularity) -> Result<String, StoreError>;

    /// Inserts `series` in one transaction and returns the number of new rows.
    ///
    /// Timestamps already present are skipped. On any error nothing is written.
    fn insert(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
        series: &CandleSeries,
    ) -> Result<usize, StoreError>;

    /// Rows in the pair's table; 0 when the table does not exist.
    fn row_count(&self, instrument: &Instrument, granularity: Granularity) -> Result<i64, StoreError>;

    /// Every stored candle for the pair, ascending by timestamp.
    fn load_candles(&self, instrument: &Instrument, granularity: Granularity) -> Result<CandleSeries, StoreError>;

    /// All registered tables, ordered by name.
    fn list_tables(&self) -> Result<Vec<CandleTableInfo>, StoreError>;
}
