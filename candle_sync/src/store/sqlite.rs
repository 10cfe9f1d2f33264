//! SQLite implementation of [`CandleStore`].

use std::{
    num::NonZeroUsize,
    sync::{Mutex, MutexGuard},
};

use candle_ingestor::{
    models::{
        candle::{Candle, CandleSeries},
        granularity::Granularity,
        instrument::Instrument,
    },
    time::{is_trading_session, to_rfc3339_millis},
};
use chrono::{DateTime, Utc};
use diesel::{
    prelude::*,
    sql_query,
    sql_types::{BigInt, Double, Integer, Text},
    sqlite::Sqlite,
};
use nonzero_ext::nonzero;
use tracing::{debug, info};

use crate::{
    db::{connection::connect_sqlite, migrate},
    schema::candle_tables,
    store::{CandleStore, CandleTableInfo, StoreError, table_name},
};

/// Default number of candles handled per insert sub-batch.
pub const DEFAULT_BATCH_SIZE: NonZeroUsize = nonzero!(200_000usize);

/// Host parameters SQLite accepts in one statement (`SQLITE_MAX_VARIABLE_NUMBER`).
const MAX_BIND_PARAMS: usize = 32_766;

/// Bound values per candle row.
const PARAMS_PER_ROW: usize = 7;

const ROWS_PER_STATEMENT: usize = MAX_BIND_PARAMS / PARAMS_PER_ROW;

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    n: i64,
}

#[derive(QueryableByName)]
struct CandleRow {
    #[diesel(sql_type = Text)]
    timestamp: String,
    #[diesel(sql_type = Double)]
    open: f64,
    #[diesel(sql_type = Double)]
    high: f64,
    #[diesel(sql_type = Double)]
    low: f64,
    #[diesel(sql_type = Double)]
    close: f64,
    #[diesel(sql_type = BigInt)]
    volume: i64,
}

impl TryFrom<CandleRow> for Candle {
    type Error = diesel::result::Error;

    fn try_from(row: CandleRow) -> Result<Self, Self::Error> {
        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
            .map_err(|e| diesel::result::Error::DeserializationError(Box::new(e)))?
            .with_timezone(&Utc);
        Ok(Candle {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        })
    }
}

/// Candle store over a single SQLite connection.
///
/// The connection sits behind a mutex held for the duration of each transaction, so
/// writers are serialized.
pub struct SqliteCandleStore {
    conn: Mutex<SqliteConnection>,
    batch_size: NonZeroUsize,
}

impl SqliteCandleStore {
    /// Opens (or creates) the database at `path` and applies pending migrations.
    pub fn open(path: &str, batch_size: NonZeroUsize) -> Result<Self, StoreError> {
        let mut conn = connect_sqlite(path)?;
        migrate::run_pending(&mut conn)?;
        info!(path, batch_size = batch_size.get(), "candle store ready");
        Ok(Self::from_connection(conn, batch_size))
    }

    /// Wraps an already configured and migrated connection.
    pub fn from_connection(conn: SqliteConnection, batch_size: NonZeroUsize) -> Self {
        Self {
            conn: Mutex::new(conn),
            batch_size,
        }
    }

    /// Candles per insert sub-batch.
    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteConnection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

fn table_exists(conn: &mut SqliteConnection, table: &str) -> QueryResult<bool> {
    let row: CountRow = sql_query("SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?")
        .bind::<Text, _>(table)
        .get_result(conn)?;
    Ok(row.n > 0)
}

/// One multi-row `INSERT OR IGNORE`; returns rows actually written.
fn insert_rows(conn: &mut SqliteConnection, table: &str, rows: &[Candle]) -> QueryResult<usize> {
    let placeholders = vec!["(?, ?, ?, ?, ?, ?, ?)"; rows.len()].join(", ");
    let sql = format!(
        r#"INSERT OR IGNORE INTO "{table}" (timestamp, open, high, low, close, volume, in_session) VALUES {placeholders}"#
    );

    let mut query = sql_query(sql).into_boxed::<Sqlite>();
    for candle in rows {
        query = query
            .bind::<Text, _>(to_rfc3339_millis(candle.timestamp))
            .bind::<Double, _>(candle.open)
            .bind::<Double, _>(candle.high)
            .bind::<Double, _>(candle.low)
            .bind::<Double, _>(candle.close)
            .bind::<BigInt, _>(candle.volume)
            .bind::<Integer, _>(i32::from(is_trading_session(candle.timestamp)));
    }
    query.execute(conn)
}

impl CandleStore for SqliteCandleStore {
    fn ensure_table(&self, instrument: &Instrument, granularity: Granularity) -> Result<String, StoreError> {
        let table = table_name(instrument, granularity)?;
        let mut conn = self.lock()?;

        conn.transaction::<_, StoreError, _>(|conn| {
            sql_query(format!(
                r#"CREATE TABLE IF NOT EXISTS "{table}" (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp TEXT NOT NULL UNIQUE,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume INTEGER NOT NULL,
                    in_session INTEGER NOT NULL
                )"#
            ))
            .execute(conn)?;

            let registered = diesel::insert_or_ignore_into(candle_tables::table)
                .values((
                    candle_tables::name.eq(table.as_str()),
                    candle_tables::instrument.eq(instrument.as_str()),
                    candle_tables::granularity.eq(granularity.code()),
                    candle_tables::created_at.eq(to_rfc3339_millis(Utc::now())),
                ))
                .execute(conn)?;
            if registered > 0 {
                info!(table = %table, "created candle table");
            }
            Ok(())
        })?;

        Ok(table)
    }

    fn insert(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
        series: &CandleSeries,
    ) -> Result<usize, StoreError> {
        let table = table_name(instrument, granularity)?;
        if series.is_empty() {
            return Ok(0);
        }

        let batch_size = self.batch_size.get();
        let batches = series.len().div_ceil(batch_size);
        let mut conn = self.lock()?;

        let inserted = conn.transaction::<_, StoreError, _>(|conn| {
            let mut inserted = 0;
            for (i, batch) in series.as_slice().chunks(batch_size).enumerate() {
                let mut in_batch = 0;
                for rows in batch.chunks(ROWS_PER_STATEMENT) {
                    in_batch += insert_rows(conn, &table, rows)?;
                }
                debug!(table = %table, batch = i + 1, batches, rows = batch.len(), inserted = in_batch, "inserted batch");
                inserted += in_batch;
            }
            Ok(inserted)
        })?;

        info!(
            table = %table,
            candles = series.len(),
            inserted,
            skipped = series.len() - inserted,
            "stored candles"
        );
        Ok(inserted)
    }

    fn row_count(&self, instrument: &Instrument, granularity: Granularity) -> Result<i64, StoreError> {
        let table = table_name(instrument, granularity)?;
        let mut conn = self.lock()?;
        if !table_exists(&mut conn, &table)? {
            return Ok(0);
        }
        let row: CountRow = sql_query(format!(r#"SELECT COUNT(*) AS n FROM "{table}""#)).get_result(&mut *conn)?;
        Ok(row.n)
    }

    fn load_candles(&self, instrument: &Instrument, granularity: Granularity) -> Result<CandleSeries, StoreError> {
        let table = table_name(instrument, granularity)?;
        let mut conn = self.lock()?;
        if !table_exists(&mut conn, &table)? {
            return Ok(CandleSeries::default());
        }

        let rows: Vec<CandleRow> = sql_query(format!(
            r#"SELECT timestamp, open, high, low, close, volume FROM "{table}" ORDER BY timestamp"#
        ))
        .load(&mut *conn)?;

        let candles = rows
            .into_iter()
            .map(Candle::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CandleSeries::from_unsorted(candles))
    }

    fn list_tables(&self) -> Result<Vec<CandleTableInfo>, StoreError> {
        let mut conn = self.lock()?;
        let tables = candle_tables::table
            .select(CandleTableInfo::as_select())
            .order(candle_tables::name.asc())
            .load(&mut *conn)?;
        Ok(tables)
    }
}
