//! SQLite connection helpers.
//!
//! Provides [`connect_sqlite`] that opens a connection and applies the PRAGMAs every
//! store connection needs: WAL journaling, foreign_keys=ON, and a 5000ms busy_timeout.

use diesel::{Connection, RunQueryDsl, SqliteConnection, sql_query};

use crate::store::StoreError;

/// Open a SQLite connection and apply connection-wide PRAGMAs.
///
/// `database_url` is a file path (created if missing) or `:memory:`.
pub fn connect_sqlite(database_url: &str) -> Result<SqliteConnection, StoreError> {
    let mut conn = SqliteConnection::establish(database_url)?;

    // concurrent readers while a sync is writing
    sql_query("PRAGMA journal_mode=WAL;").execute(&mut conn)?;
    sql_query("PRAGMA foreign_keys=ON;").execute(&mut conn)?;
    sql_query("PRAGMA busy_timeout=5000;").execute(&mut conn)?;
    Ok(conn)
}
