//! Pair to table-name mapping.

use candle_ingestor::models::{granularity::Granularity, instrument::Instrument};

use crate::store::StoreError;

/// Derives the table name for a pair: `"{instrument}_{granularity}"`.
///
/// `/`, `-`, `.` and spaces become `_`. Anything else outside `[A-Za-z0-9_]` is
/// rejected, so the name is always safe to splice into a quoted identifier.
///
/// ```
/// use candle_ingestor::models::granularity::Granularity;
/// use candle_sync::store::table_name;
///
/// assert_eq!(table_name(&"EUR/USD".into(), Granularity::H1).unwrap(), "EUR_USD_H1");
/// ```
pub fn table_name(instrument: &Instrument, granularity: Granularity) -> Result<String, StoreError> {
    let raw = instrument.as_str().trim();
    if raw.is_empty() {
        return Err(StoreError::InvalidTableName(format!("_{granularity}")));
    }

    let name: String = format!("{raw}_{granularity}")
        .chars()
        .map(|c| match c {
            '/' | '-' | '.' | ' ' => '_',
            other => other,
        })
        .collect();

    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(StoreError::InvalidTableName(name))
    }
}
