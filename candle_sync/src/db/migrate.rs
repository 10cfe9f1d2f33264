//! Embedded migrations for the table registry.

use diesel::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::debug;

use crate::store::StoreError;

/// Embedded Diesel migrations bundled with this crate.
///
/// Only the `candle_tables` registry is migration-managed; candle tables are created
/// on demand by the store.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Applies every pending migration on `conn`.
pub fn run_pending(conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| StoreError::Migration(e.to_string()))?;
    debug!(applied = applied.len(), "migrations up to date");
    Ok(())
}

#[cfg(test)]
mod test {
    use diesel::{Connection, connection::SimpleConnection};

    use super::*;

    #[test]
    fn migrations_apply_twice_on_temp_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let path = temp.path().to_string_lossy().to_string();

        let mut conn = SqliteConnection::establish(&path).unwrap();
        run_pending(&mut conn).expect("first run");
        run_pending(&mut conn).expect("second run is a no-op");

        conn.batch_execute(
            "INSERT INTO candle_tables (name, instrument, granularity, created_at) \
             VALUES ('EUR_USD_M1', 'EUR_USD', 'M1', '2024-01-01T00:00:00.000Z')",
        )
        .unwrap();
    }
}
