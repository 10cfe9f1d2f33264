#![allow(dead_code)]

use std::{num::NonZeroUsize, path::PathBuf};

use candle_ingestor::models::candle::{Candle, CandleSeries};
use candle_sync::store::SqliteCandleStore;
use chrono::{DateTime, Duration, TimeZone, Utc};
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/candles.db
}

pub fn temp_db() -> TestDb {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("candles.db");
    let path = p.to_string_lossy().to_string();
    TestDb { _dir: dir, path }
}

pub fn open_store(batch_size: usize) -> (TestDb, SqliteCandleStore) {
    let db = temp_db();
    let store = SqliteCandleStore::open(&db.path, NonZeroUsize::new(batch_size).unwrap()).expect("open store");
    (db, store)
}

/// Monday 2023-01-02 00:00 UTC.
pub fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap()
}

pub fn candle(ts: DateTime<Utc>, open: f64) -> Candle {
    Candle {
        timestamp: ts,
        open,
        high: open + 0.5,
        low: open - 0.5,
        close: open + 0.25,
        volume: 10,
    }
}

/// `n` consecutive candles of `step_minutes` starting at `start`.
pub fn series(start: DateTime<Utc>, n: i64, step_minutes: i64) -> CandleSeries {
    CandleSeries::from_unsorted(
        (0..n)
            .map(|i| candle(start + Duration::minutes(i * step_minutes), 1.0 + i as f64 * 0.001))
            .collect(),
    )
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}
